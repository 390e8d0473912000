//! Probability building blocks for TailStat.
//!
//! This crate hosts the univariate distributions used for heavy-tailed
//! targets:
//! - binned (piecewise-constant) bodies with learnable per-bin logits
//! - generalized Pareto tails
//! - the spliced binned-Pareto composition of the two
//!
//! plus small numeric helpers (stable log/exp primitives).

pub mod binned;
pub mod generalized_pareto;
pub mod math;
pub mod spliced;

pub use binned::{BinGeometry, BinnedDistribution, LogitMatrix, Smoothing};
pub use generalized_pareto::GeneralizedPareto;
pub use spliced::{SplicedBinnedPareto, SplicedBinnedParetoSpec};

use ts_core::Result;

/// Common vectorized query surface over univariate distributions.
///
/// Batched implementations pair parameter row `i` with element `i` of the
/// input; single-row parameters broadcast over any input length.
pub trait Univariate {
    /// Log-density at each point.
    fn log_prob_batch(&self, xs: &[f64]) -> Result<Vec<f64>>;

    /// Cumulative distribution function at each point.
    fn cdf_batch(&self, xs: &[f64]) -> Result<Vec<f64>>;

    /// Quantile function at each probability level.
    fn icdf_batch(&self, qs: &[f64]) -> Result<Vec<f64>>;
}
