//! Spliced binned-Pareto distribution.
//!
//! A binned (piecewise-constant) body with two independent generalized
//! Pareto tails spliced at fixed percentile thresholds of the body. Each
//! tail carries exactly `percentile` probability mass; the body region in
//! between carries `1 - 2*percentile`.
//!
//! The spliced distribution owns its collaborators explicitly: a body
//! [`BinnedDistribution`] plus per-row lower/upper tail parameters.
//! Queries route to the relevant region based on the lower/upper
//! thresholds, which are recomputed from the body's current quantiles on
//! every query (never cached across parameter updates).

use serde::{Deserialize, Serialize};
use tracing::debug;
use ts_core::{Error, Result};

use crate::binned::{check_lockstep, lockstep_row, BinGeometry, BinnedDistribution, Smoothing};
use crate::generalized_pareto::GeneralizedPareto;
use crate::math::softplus;
use crate::Univariate;

/// Tail shape/scale before any parameter update.
const DEFAULT_TAIL_XI: f64 = 0.5;
const DEFAULT_TAIL_BETA: f64 = 0.5;

/// Per-row generalized Pareto tail parameters, already strictly positive.
#[derive(Debug, Clone, Copy)]
struct TailParams {
    xi: f64,
    beta: f64,
}

impl Default for TailParams {
    fn default() -> Self {
        Self { xi: DEFAULT_TAIL_XI, beta: DEFAULT_TAIL_BETA }
    }
}

/// Declarative configuration for [`SplicedBinnedPareto`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplicedBinnedParetoSpec {
    /// Lower edge of the binned body.
    pub lower_bound: f64,
    /// Upper edge of the binned body.
    pub upper_bound: f64,
    /// Number of equal-width bins (default 100).
    #[serde(default = "default_nbins")]
    pub nbins: usize,
    /// Point-evaluation smoothing mode (default none).
    #[serde(default)]
    pub smoothing: Smoothing,
    /// Probability mass carried by each tail (default 0.05).
    #[serde(default = "default_tail_percentile")]
    pub tail_percentile: f64,
}

fn default_nbins() -> usize {
    100
}

fn default_tail_percentile() -> f64 {
    0.05
}

impl SplicedBinnedParetoSpec {
    /// Construct the distribution this spec describes.
    pub fn build(&self) -> Result<SplicedBinnedPareto> {
        SplicedBinnedPareto::new(
            self.lower_bound,
            self.upper_bound,
            self.nbins,
            self.smoothing,
            self.tail_percentile,
        )
    }
}

/// Univariate distribution with a binned body and generalized Pareto tails.
#[derive(Debug, Clone)]
pub struct SplicedBinnedPareto {
    body: BinnedDistribution,
    percentile: f64,
    ln_percentile: f64,
    ln_body_mass: f64,
    lower: Vec<TailParams>,
    upper: Vec<TailParams>,
}

impl SplicedBinnedPareto {
    /// Create a spliced distribution with uniform initial logits and
    /// default tail parameters.
    ///
    /// `tail_percentile` must lie strictly inside `(0, 0.5)` so the two
    /// tail regions cannot overlap.
    pub fn new(
        lower_bound: f64,
        upper_bound: f64,
        nbins: usize,
        smoothing: Smoothing,
        tail_percentile: f64,
    ) -> Result<Self> {
        if !tail_percentile.is_finite() || tail_percentile <= 0.0 || tail_percentile >= 0.5 {
            return Err(Error::Validation(format!(
                "tail_percentile must lie in (0, 0.5), got {}",
                tail_percentile
            )));
        }
        let geometry = BinGeometry::new(lower_bound, upper_bound, nbins)?;
        let body = BinnedDistribution::new(geometry, smoothing);
        Ok(Self {
            body,
            percentile: tail_percentile,
            ln_percentile: tail_percentile.ln(),
            ln_body_mass: (1.0 - 2.0 * tail_percentile).ln(),
            lower: vec![TailParams::default()],
            upper: vec![TailParams::default()],
        })
    }

    /// The binned body.
    pub fn body(&self) -> &BinnedDistribution {
        &self.body
    }

    /// Probability mass carried by each tail.
    pub fn percentile(&self) -> f64 {
        self.percentile
    }

    /// Number of parameter rows currently installed.
    pub fn rows(&self) -> usize {
        self.body.rows()
    }

    /// Install a single parameter row
    /// `[logits.., lower_xi, lower_beta, upper_xi, upper_beta]`.
    ///
    /// Raw tail scalars pass through softplus, so any real-valued input
    /// yields valid (strictly positive) tail parameters.
    pub fn set_parameters(&mut self, values: &[f64]) -> Result<()> {
        self.set_parameters_batch(values, 1)
    }

    /// Install a row-major `rows x (nbins + 4)` parameter matrix.
    pub fn set_parameters_batch(&mut self, values: &[f64], rows: usize) -> Result<()> {
        let nbins = self.body.geometry().nbins();
        let stride = nbins + 4;
        if rows == 0 || values.len() != rows * stride {
            return Err(Error::Validation(format!(
                "parameter matrix length mismatch: expected {}x{}={}, got {}",
                rows,
                stride,
                rows * stride,
                values.len()
            )));
        }

        let mut logits = Vec::with_capacity(rows * nbins);
        let mut lower = Vec::with_capacity(rows);
        let mut upper = Vec::with_capacity(rows);
        for r in 0..rows {
            let chunk = &values[r * stride..(r + 1) * stride];
            logits.extend_from_slice(&chunk[..nbins]);
            let tail = &chunk[nbins..];
            lower.push(TailParams { xi: softplus(tail[0]), beta: softplus(tail[1]) });
            upper.push(TailParams { xi: softplus(tail[2]), beta: softplus(tail[3]) });
        }
        self.body.set_logits_batch(&logits, rows)?;
        self.lower = lower;
        self.upper = upper;
        Ok(())
    }

    fn tail(&self, params: &[TailParams], row: usize) -> Result<GeneralizedPareto> {
        let p = params.get(row).ok_or_else(|| {
            Error::Validation(format!(
                "row {} out of range for {} tail parameter rows",
                row,
                params.len()
            ))
        })?;
        GeneralizedPareto::new(p.xi, p.beta)
    }

    /// Splice thresholds for `row`, recomputed from the current body.
    fn thresholds(&self, row: usize) -> Result<(f64, f64)> {
        let lower = self.body.icdf_at(self.percentile, row)?;
        let upper = self.body.icdf_at(1.0 - self.percentile, row)?;
        debug!(row, lower, upper, "recomputed splice thresholds");
        Ok((lower, upper))
    }

    fn log_prob_inner(&self, x: f64, row: usize, for_training: bool) -> Result<f64> {
        let (lo, hi) = self.thresholds(row)?;
        if x < lo {
            let gp = self.tail(&self.lower, row)?;
            let tail = gp.log_prob(lo - x) + self.ln_percentile;
            if for_training {
                Ok(tail + self.body.log_prob_at(x, row)? + self.ln_body_mass)
            } else {
                Ok(tail)
            }
        } else if x > hi {
            let gp = self.tail(&self.upper, row)?;
            let tail = gp.log_prob(x - hi) + self.ln_percentile;
            if for_training {
                Ok(tail + self.body.log_prob_at(x, row)? + self.ln_body_mass)
            } else {
                Ok(tail)
            }
        } else {
            Ok(self.body.log_prob_at(x, row)? + self.ln_body_mass)
        }
    }

    /// Log-density at `x` for the given parameter row.
    pub fn log_prob_at(&self, x: f64, row: usize) -> Result<f64> {
        self.log_prob_inner(x, row, false)
    }

    /// Training-time log-density: tail regions additionally include the
    /// rescaled body term so gradients keep flowing through the bin
    /// logits even for tail observations.
    pub fn training_log_prob_at(&self, x: f64, row: usize) -> Result<f64> {
        self.log_prob_inner(x, row, true)
    }

    /// CDF at `x` for the given parameter row.
    ///
    /// Continuous across both thresholds: the lower tail is measured as
    /// survival of the mirrored GPD, the body CDF is used between the
    /// thresholds, and the upper tail adds on top of `1 - percentile`.
    pub fn cdf_at(&self, x: f64, row: usize) -> Result<f64> {
        let (lo, hi) = self.thresholds(row)?;
        if x < lo {
            let gp = self.tail(&self.lower, row)?;
            Ok(self.percentile * (1.0 - gp.cdf(lo - x)))
        } else if x > hi {
            let gp = self.tail(&self.upper, row)?;
            Ok((1.0 - self.percentile) + self.percentile * gp.cdf(x - hi))
        } else {
            self.body.cdf_at(x, row)
        }
    }

    /// Quantile at `q` for the given parameter row.
    ///
    /// Tail quantiles are unbounded: `q <= 0` yields `-inf` and
    /// `q >= 1` yields `+inf`.
    pub fn icdf_at(&self, q: f64, row: usize) -> Result<f64> {
        if q < self.percentile {
            let (lo, _) = self.thresholds(row)?;
            let gp = self.tail(&self.lower, row)?;
            Ok(lo - gp.icdf(1.0 - q / self.percentile))
        } else if q > 1.0 - self.percentile {
            let (_, hi) = self.thresholds(row)?;
            let gp = self.tail(&self.upper, row)?;
            Ok(hi + gp.icdf((q - (1.0 - self.percentile)) / self.percentile))
        } else {
            self.body.icdf_at(q, row)
        }
    }

    /// Elementwise log-density (lockstep row pairing: batched parameters
    /// pair row `i` with `xs[i]`, a single row broadcasts).
    pub fn log_prob(&self, xs: &[f64]) -> Result<Vec<f64>> {
        check_lockstep(self.rows(), xs.len())?;
        xs.iter()
            .enumerate()
            .map(|(i, &x)| self.log_prob_at(x, lockstep_row(self.rows(), i)))
            .collect()
    }

    /// Elementwise training log-density.
    pub fn training_log_prob(&self, xs: &[f64]) -> Result<Vec<f64>> {
        check_lockstep(self.rows(), xs.len())?;
        xs.iter()
            .enumerate()
            .map(|(i, &x)| self.training_log_prob_at(x, lockstep_row(self.rows(), i)))
            .collect()
    }

    /// Elementwise CDF.
    pub fn cdf(&self, xs: &[f64]) -> Result<Vec<f64>> {
        check_lockstep(self.rows(), xs.len())?;
        xs.iter()
            .enumerate()
            .map(|(i, &x)| self.cdf_at(x, lockstep_row(self.rows(), i)))
            .collect()
    }

    /// Elementwise quantiles.
    pub fn icdf(&self, qs: &[f64]) -> Result<Vec<f64>> {
        check_lockstep(self.rows(), qs.len())?;
        qs.iter()
            .enumerate()
            .map(|(i, &q)| self.icdf_at(q, lockstep_row(self.rows(), i)))
            .collect()
    }
}

impl Univariate for SplicedBinnedPareto {
    fn log_prob_batch(&self, xs: &[f64]) -> Result<Vec<f64>> {
        self.log_prob(xs)
    }

    fn cdf_batch(&self, xs: &[f64]) -> Result<Vec<f64>> {
        self.cdf(xs)
    }

    fn icdf_batch(&self, qs: &[f64]) -> Result<Vec<f64>> {
        self.icdf(qs)
    }
}
