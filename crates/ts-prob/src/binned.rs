//! Piecewise-constant binned distribution over a fixed uniform grid.
//!
//! The density is constant within each bin:
//!
//! `p(x) = softmax(logits)[i] / width` for `x` in bin `i`,
//!
//! so the bin masses always integrate to 1 over the binned domain. Logits
//! are the sole mutable state and are typically refreshed once per
//! forward pass from an upstream predictor.

use serde::{Deserialize, Serialize};
use tracing::warn;
use ts_core::{Error, Result};

use crate::math::{log_softmax, log_sum_exp};
use crate::Univariate;

/// Relative padding applied to the requested bounds so that points landing
/// exactly on `lower_bound` / `upper_bound` fall strictly inside the
/// first / last bin.
const EDGE_PADDING: f64 = 1e-9;

/// Fixed 7-tap smoothing kernel centred on the located bin.
const KERNEL_TAPS: [f64; 7] = [0.006, 0.061, 0.242, 0.383, 0.242, 0.061, 0.006];

/// Cheap smoothing taps: located bin 1, immediate neighbours 0.5,
/// next-nearest 0.25.
const CHEAP_TAPS: [f64; 5] = [0.25, 0.5, 1.0, 0.5, 0.25];

/// How point evaluations spread weight onto neighbouring bins.
///
/// Smoothed variants deliberately do NOT renormalize the spread weights;
/// the result is a softened training signal, not a calibrated density.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Smoothing {
    /// Exact one-hot bin lookup.
    #[default]
    None,
    /// Weight 0.5 on immediate neighbours and 0.25 on next-nearest.
    Cheap,
    /// Fixed 7-tap kernel, clipped at the domain edges.
    Kernel,
}

/// Uniform bin geometry: `nbins` equal-width bins covering the padded
/// interval `[lower_bound - eps, upper_bound + eps]`.
///
/// Derived once at construction and immutable thereafter.
#[derive(Debug, Clone)]
pub struct BinGeometry {
    nbins: usize,
    edges: Vec<f64>,
    width: f64,
}

impl BinGeometry {
    /// Build the geometry, validating bounds and bin count.
    pub fn new(lower_bound: f64, upper_bound: f64, nbins: usize) -> Result<Self> {
        if !lower_bound.is_finite() || !upper_bound.is_finite() {
            return Err(Error::Validation(format!(
                "bounds must be finite, got [{}, {}]",
                lower_bound, upper_bound
            )));
        }
        if lower_bound >= upper_bound {
            return Err(Error::Validation(format!(
                "lower_bound must be < upper_bound, got [{}, {}]",
                lower_bound, upper_bound
            )));
        }
        if nbins == 0 {
            return Err(Error::Validation("nbins must be > 0".to_string()));
        }

        let pad = EDGE_PADDING * (upper_bound - lower_bound);
        let lo = lower_bound - pad;
        let hi = upper_bound + pad;
        let width = (hi - lo) / nbins as f64;

        let mut edges: Vec<f64> = (0..=nbins).map(|i| lo + width * i as f64).collect();
        // pin the last edge so the grid covers the padded interval exactly
        edges[nbins] = hi;

        Ok(Self { nbins, edges, width })
    }

    /// Number of bins.
    pub fn nbins(&self) -> usize {
        self.nbins
    }

    /// The `nbins + 1` strictly increasing breakpoints.
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Shared bin width (uniform spacing).
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Bin midpoints.
    pub fn centres(&self) -> Vec<f64> {
        (0..self.nbins).map(|i| 0.5 * (self.edges[i] + self.edges[i + 1])).collect()
    }

    /// Bin containing `x`.
    ///
    /// Out-of-range points clamp to the first / last bin. A point on a
    /// shared edge belongs to the bin to its right, except the final edge
    /// which belongs to the last bin.
    pub fn locate(&self, x: f64) -> usize {
        if x <= self.edges[0] {
            return 0;
        }
        if x >= self.edges[self.nbins] {
            return self.nbins - 1;
        }
        // `k` is the number of edges <= x, so the bin index is k-1.
        let k = self.edges.partition_point(|e| *e <= x);
        k - 1
    }
}

/// Row-major matrix of unnormalized per-bin log-weights.
///
/// A single logits vector is stored as a 1-row matrix; batched inputs keep
/// one row per independent distribution.
#[derive(Debug, Clone)]
pub struct LogitMatrix {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl LogitMatrix {
    /// Wrap a row-major buffer, validating its length.
    pub fn new(data: Vec<f64>, rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(Error::Validation(format!(
                "logit matrix must be non-empty, got {}x{}",
                rows, cols
            )));
        }
        if data.len() != rows * cols {
            return Err(Error::Validation(format!(
                "logit matrix length mismatch: expected {}x{}={}, got {}",
                rows,
                cols,
                rows * cols,
                data.len()
            )));
        }
        Ok(Self { data, rows, cols })
    }

    /// Number of rows (batch size).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (bins).
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Borrow row `r`.
    pub fn row(&self, r: usize) -> Result<&[f64]> {
        if r >= self.rows {
            return Err(Error::Validation(format!(
                "row {} out of range for {} parameter rows",
                r, self.rows
            )));
        }
        Ok(&self.data[r * self.cols..(r + 1) * self.cols])
    }
}

/// Validate the lockstep pairing between batched parameter rows and a
/// vectorized input: single-row parameters broadcast over any input
/// length, batched parameters require one value per row.
pub(crate) fn check_lockstep(rows: usize, n: usize) -> Result<()> {
    if rows > 1 && n != rows {
        return Err(Error::Validation(format!(
            "batched input length mismatch: {} values for {} parameter rows",
            n, rows
        )));
    }
    Ok(())
}

#[inline]
pub(crate) fn lockstep_row(rows: usize, i: usize) -> usize {
    if rows == 1 { 0 } else { i }
}

/// Piecewise-constant probability distribution over `nbins` contiguous
/// bins with learnable per-bin logits.
#[derive(Debug, Clone)]
pub struct BinnedDistribution {
    geometry: BinGeometry,
    smoothing: Smoothing,
    logits: LogitMatrix,
}

impl BinnedDistribution {
    /// Create a distribution with uniform initial logits (single row).
    pub fn new(geometry: BinGeometry, smoothing: Smoothing) -> Self {
        let nbins = geometry.nbins();
        let logits = LogitMatrix { data: vec![0.0; nbins], rows: 1, cols: nbins };
        Self { geometry, smoothing, logits }
    }

    /// Bin geometry.
    pub fn geometry(&self) -> &BinGeometry {
        &self.geometry
    }

    /// Number of parameter rows currently installed.
    pub fn rows(&self) -> usize {
        self.logits.rows()
    }

    /// Replace the current logits with a single row. Sole mutation point,
    /// together with [`Self::set_logits_batch`].
    pub fn set_logits(&mut self, logits: &[f64]) -> Result<()> {
        self.set_logits_batch(logits, 1)
    }

    /// Replace the current logits with a row-major `rows x nbins` matrix.
    pub fn set_logits_batch(&mut self, logits: &[f64], rows: usize) -> Result<()> {
        self.logits = LogitMatrix::new(logits.to_vec(), rows, self.geometry.nbins())?;
        Ok(())
    }

    /// Log piecewise-constant density per bin for `row`:
    /// `log_softmax(logits[row]) - ln(width)`.
    pub fn log_bin_probabilities(&self, row: usize) -> Result<Vec<f64>> {
        let logits = self.logits.row(row)?;
        let ls = log_softmax(logits);
        if ls.iter().any(|v| !v.is_finite()) {
            return Err(Error::Computation(format!(
                "bin logits do not normalize: log_sum_exp = {}",
                log_sum_exp(logits)
            )));
        }
        let log_width = self.geometry.width().ln();
        Ok(ls.into_iter().map(|v| v - log_width).collect())
    }

    /// Per-bin density values (exponentiated log densities).
    pub fn bin_probabilities(&self, row: usize) -> Result<Vec<f64>> {
        Ok(self.log_bin_probabilities(row)?.into_iter().map(f64::exp).collect())
    }

    /// Cumulative bin masses aligned with `edges`: `nbins + 1` values
    /// starting at 0. The terminal value is pinned to exactly 1 to absorb
    /// summation rounding.
    pub fn bin_cdf(&self, row: usize) -> Result<Vec<f64>> {
        let densities = self.bin_probabilities(row)?;
        let width = self.geometry.width();
        let nbins = self.geometry.nbins();

        let mut cum = Vec::with_capacity(nbins + 1);
        cum.push(0.0);
        let mut acc = 0.0;
        for d in densities {
            acc += d * width;
            cum.push(acc);
        }
        if !acc.is_finite() || acc <= 0.0 {
            return Err(Error::Computation(format!(
                "bin mass must accumulate to a positive finite total, got {}",
                acc
            )));
        }
        cum[nbins] = 1.0;
        Ok(cum)
    }

    /// Smoothing weights around `bin`, clipped to `[0, nbins)`.
    fn smoothing_weights(&self, bin: usize) -> Vec<(usize, f64)> {
        let nbins = self.geometry.nbins();
        let taps: &[f64] = match self.smoothing {
            Smoothing::None => return vec![(bin, 1.0)],
            Smoothing::Cheap => &CHEAP_TAPS,
            Smoothing::Kernel => &KERNEL_TAPS,
        };
        let half = (taps.len() / 2) as isize;
        taps.iter()
            .enumerate()
            .filter_map(|(t, &w)| {
                let i = bin as isize + t as isize - half;
                if (0..nbins as isize).contains(&i) { Some((i as usize, w)) } else { None }
            })
            .collect()
    }

    /// Log-density at a single point for the given logits row.
    ///
    /// With smoothing enabled this is the smoothing-weighted sum of
    /// neighbouring log-densities (unnormalized weights), not a calibrated
    /// density.
    pub fn log_prob_at(&self, x: f64, row: usize) -> Result<f64> {
        if !x.is_finite() {
            return Err(Error::Validation(format!("log_prob requires finite x, got {}", x)));
        }
        let log_probs = self.log_bin_probabilities(row)?;
        let bin = self.geometry.locate(x);
        Ok(self
            .smoothing_weights(bin)
            .into_iter()
            .map(|(i, w)| w * log_probs[i])
            .sum())
    }

    /// Elementwise log-density. Batched logits pair row `i` with `xs[i]`.
    pub fn log_prob(&self, xs: &[f64]) -> Result<Vec<f64>> {
        check_lockstep(self.rows(), xs.len())?;
        xs.iter()
            .enumerate()
            .map(|(i, &x)| self.log_prob_at(x, lockstep_row(self.rows(), i)))
            .collect()
    }

    fn cdf_from_cum(&self, cum: &[f64], x: f64) -> Result<f64> {
        if !x.is_finite() {
            return Err(Error::Validation(format!("cdf requires finite x, got {}", x)));
        }
        let edges = self.geometry.edges();
        let nbins = self.geometry.nbins();
        if x <= edges[0] {
            return Ok(0.0);
        }
        if x >= edges[nbins] {
            return Ok(1.0);
        }
        let bin = self.geometry.locate(x);
        let frac = (x - edges[bin]) / self.geometry.width();
        Ok(cum[bin] + frac * (cum[bin + 1] - cum[bin]))
    }

    /// CDF at a single point (stateless, `O(nbins)`).
    pub fn cdf_at(&self, x: f64, row: usize) -> Result<f64> {
        let cum = self.bin_cdf(row)?;
        self.cdf_from_cum(&cum, x)
    }

    /// Elementwise CDF. Input order is arbitrary: each point is resolved
    /// against the per-row cumulative vector, so no pre-sorting is
    /// required.
    pub fn cdf(&self, xs: &[f64]) -> Result<Vec<f64>> {
        check_lockstep(self.rows(), xs.len())?;
        if self.rows() == 1 {
            let cum = self.bin_cdf(0)?;
            return xs.iter().map(|&x| self.cdf_from_cum(&cum, x)).collect();
        }
        xs.iter()
            .enumerate()
            .map(|(i, &x)| self.cdf_at(x, i))
            .collect()
    }

    fn icdf_from_cum(&self, cum: &[f64], q: f64) -> Result<f64> {
        if q.is_nan() {
            return Err(Error::Validation("icdf requires a numeric q, got NaN".to_string()));
        }
        let edges = self.geometry.edges();
        let nbins = self.geometry.nbins();
        if q <= 0.0 {
            return Ok(edges[0]);
        }
        if q >= 1.0 {
            return Ok(edges[nbins]);
        }
        // First index with cum >= q; cum[0] = 0 < q guarantees j >= 1, and
        // cum[nbins] = 1 >= q guarantees j <= nbins.
        let j = cum.partition_point(|c| *c < q);
        let bin = j - 1;
        let mass = cum[bin + 1] - cum[bin];
        if mass <= 0.0 {
            warn!(bin, q, "quantile bracketed a non-positive-mass bin");
            return Ok(edges[bin]);
        }
        Ok(edges[bin] + (q - cum[bin]) / mass * self.geometry.width())
    }

    /// Quantile at `q` within the binned domain. `q <= 0` maps to the
    /// first edge, `q >= 1` to the last.
    pub fn icdf_at(&self, q: f64, row: usize) -> Result<f64> {
        let cum = self.bin_cdf(row)?;
        self.icdf_from_cum(&cum, q)
    }

    /// Elementwise quantiles (lockstep row pairing as for [`Self::log_prob`]).
    pub fn icdf(&self, qs: &[f64]) -> Result<Vec<f64>> {
        check_lockstep(self.rows(), qs.len())?;
        if self.rows() == 1 {
            let cum = self.bin_cdf(0)?;
            return qs.iter().map(|&q| self.icdf_from_cum(&cum, q)).collect();
        }
        qs.iter()
            .enumerate()
            .map(|(i, &q)| self.icdf_at(q, i))
            .collect()
    }
}

impl Univariate for BinnedDistribution {
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
