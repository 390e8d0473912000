//! Small numerically-stable math utilities used across probability code.

/// Stable `log(1 + exp(x))`.
///
/// Branchless: `log(1+exp(x)) = max(x,0) + log(1+exp(-|x|))`.
/// `f64::max` compiles to `maxsd` (no branch), single unconditional `exp(-|x|)`.
#[inline]
pub fn log1pexp(x: f64) -> f64 {
    let abs_x = x.abs();
    let e = (-abs_x).exp(); // always in (0, 1], no overflow
    x.max(0.0) + e.ln_1p()
}

/// Stable softplus: `log(1 + exp(x))`.
#[inline]
pub fn softplus(x: f64) -> f64 {
    log1pexp(x)
}

/// Stable `log(sum(exp(xs)))` over a slice.
///
/// Returns `-inf` for an empty slice or when every element is `-inf`.
pub fn log_sum_exp(xs: &[f64]) -> f64 {
    let m = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !m.is_finite() {
        // all -inf, or a +inf/NaN that must propagate
        return m;
    }
    let s: f64 = xs.iter().map(|&x| (x - m).exp()).sum();
    m + s.ln()
}

/// Log-softmax over a slice: `xs[i] - log_sum_exp(xs)`.
pub fn log_softmax(xs: &[f64]) -> Vec<f64> {
    let lse = log_sum_exp(xs);
    xs.iter().map(|&x| x - lse).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log1pexp_matches_naive_moderate_values() {
        let xs: [f64; 7] = [-10.0, -2.0, -0.1, 0.0, 0.1, 2.0, 10.0];
        for x in xs {
            let naive = (1.0 + x.exp()).ln();
            let stable = log1pexp(x);
            assert!((naive - stable).abs() < 1e-12, "x={}: {} vs {}", x, naive, stable);
        }
    }

    #[test]
    fn test_log1pexp_is_finite_extremes() {
        let xs: [f64; 4] = [-1e6, -100.0, 100.0, 1e6];
        for x in xs {
            let y = log1pexp(x);
            assert!(y.is_finite(), "x={} produced {}", x, y);
        }
        assert!((log1pexp(1e6) - 1e6).abs() < 1e-6);
    }

    #[test]
    fn test_softplus_is_strictly_positive() {
        for x in [-700.0, -50.0, -1.0, 0.0, 1.0, 50.0] {
            assert!(softplus(x) > 0.0, "softplus({}) not positive", x);
        }
    }

    #[test]
    fn test_log_sum_exp_matches_naive() {
        let xs: [f64; 4] = [0.3, -1.2, 2.7, 0.0];
        let naive = xs.iter().map(|x| x.exp()).sum::<f64>().ln();
        assert!((log_sum_exp(&xs) - naive).abs() < 1e-12);
    }

    #[test]
    fn test_log_sum_exp_large_offsets() {
        // Shift invariance: lse(x + c) = lse(x) + c, even when exp would overflow.
        let xs = [1000.0, 1000.5, 999.0];
        let shifted: Vec<f64> = xs.iter().map(|x| x - 1000.0).collect();
        let expected = log_sum_exp(&shifted) + 1000.0;
        assert!((log_sum_exp(&xs) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_log_sum_exp_degenerate() {
        assert_eq!(log_sum_exp(&[]), f64::NEG_INFINITY);
        assert_eq!(log_sum_exp(&[f64::NEG_INFINITY; 3]), f64::NEG_INFINITY);
    }

    #[test]
    fn test_log_softmax_normalizes() {
        let xs = [0.1, -2.0, 3.5, 1.0];
        let ls = log_softmax(&xs);
        let total: f64 = ls.iter().map(|v| v.exp()).sum();
        assert!((total - 1.0).abs() < 1e-12, "softmax sums to {}", total);
    }

    #[test]
    fn test_log_softmax_uniform() {
        let ls = log_softmax(&[0.0; 8]);
        for v in ls {
            assert!((v - (1.0f64 / 8.0).ln()).abs() < 1e-12);
        }
    }
}
