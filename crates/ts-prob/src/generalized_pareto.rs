//! Generalized Pareto distribution over non-negative support.
//!
//! Used for peaks-over-threshold tail modelling: given a threshold, the
//! excess above it is modelled by a two-parameter GPD with shape `xi`
//! (heaviness) and scale `beta`.

use ts_core::{Error, Result};

use crate::Univariate;

/// Shift added to `xi` in the `1/xi` exponent of the general-branch
/// log-density so it stays bounded when `xi` underflows toward zero.
const XI_EPS: f64 = 1e-8;

/// Generalized Pareto distribution with shape `xi >= 0` and scale `beta > 0`.
///
/// CDF: `F(x) = 1 - (1 + xi*x/beta)^(-1/xi)` for `xi > 0`,
///      `F(x) = 1 - exp(-x/beta)` for `xi = 0` (exponential limit).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneralizedPareto {
    xi: f64,
    beta: f64,
}

impl GeneralizedPareto {
    /// Create a GPD, validating `xi >= 0` and `beta > 0`.
    pub fn new(xi: f64, beta: f64) -> Result<Self> {
        if !xi.is_finite() || xi < 0.0 {
            return Err(Error::Validation(format!("xi must be finite and >= 0, got {}", xi)));
        }
        if !beta.is_finite() || beta <= 0.0 {
            return Err(Error::Validation(format!(
                "beta must be finite and > 0, got {}",
                beta
            )));
        }
        Ok(Self { xi, beta })
    }

    /// Shape parameter.
    pub fn xi(&self) -> f64 {
        self.xi
    }

    /// Scale parameter.
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Mean `beta / (1 - xi)`, defined for `xi < 1` (NaN otherwise).
    pub fn mean(&self) -> f64 {
        if self.xi < 1.0 {
            self.beta / (1.0 - self.xi)
        } else {
            f64::NAN
        }
    }

    /// Variance `beta^2 / ((1-xi)^2 (1-2xi))`, defined for `xi < 0.5` (NaN otherwise).
    pub fn variance(&self) -> f64 {
        if self.xi < 0.5 {
            let om = 1.0 - self.xi;
            self.beta * self.beta / (om * om * (1.0 - 2.0 * self.xi))
        } else {
            f64::NAN
        }
    }

    /// Log-density at `x`. Support is `x >= 0`; returns `-inf` below it.
    pub fn log_prob(&self, x: f64) -> f64 {
        if x < 0.0 {
            return f64::NEG_INFINITY;
        }
        if self.xi == 0.0 {
            // exponential limit
            -self.beta.ln() - x / self.beta
        } else {
            let inv_xi = 1.0 / (self.xi + XI_EPS);
            -self.beta.ln() - (1.0 + inv_xi) * (1.0 + self.xi * x / self.beta).ln()
        }
    }

    /// CDF at `x` (0 below the support).
    pub fn cdf(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return 0.0;
        }
        if self.xi == 0.0 {
            -(-x / self.beta).exp_m1()
        } else {
            1.0 - (1.0 + self.xi * x / self.beta).powf(-1.0 / self.xi)
        }
    }

    /// Quantile at `q`. `q <= 0` maps to 0 and `q >= 1` to `+inf`
    /// (the support is unbounded above).
    pub fn icdf(&self, q: f64) -> f64 {
        if q <= 0.0 {
            return 0.0;
        }
        if q >= 1.0 {
            return f64::INFINITY;
        }
        if self.xi == 0.0 {
            -self.beta * (1.0 - q).ln()
        } else {
            self.beta * ((1.0 - q).powf(-self.xi) - 1.0) / self.xi
        }
    }
}

impl Univariate for GeneralizedPareto {
    fn log_prob_batch(&self, xs: &[f64]) -> Result<Vec<f64>> {
        Ok(xs.iter().map(|&x| self.log_prob(x)).collect())
    }

    fn cdf_batch(&self, xs: &[f64]) -> Result<Vec<f64>> {
        Ok(xs.iter().map(|&x| self.cdf(x)).collect())
    }

    fn icdf_batch(&self, qs: &[f64]) -> Result<Vec<f64>> {
        Ok(qs.iter().map(|&q| self.icdf(q)).collect())
    }
}
