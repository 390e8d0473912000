//! End-to-end checks for the spliced binned-Pareto distribution.

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ts_prob::{Smoothing, SplicedBinnedPareto, SplicedBinnedParetoSpec, Univariate};

fn random_distribution(nbins: usize, rows: usize, seed: u64) -> SplicedBinnedPareto {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut d = SplicedBinnedPareto::new(-5.0, 5.0, nbins, Smoothing::None, 0.05).unwrap();
    let params: Vec<f64> =
        (0..rows * (nbins + 4)).map(|_| rng.gen_range(-2.0..2.0)).collect();
    d.set_parameters_batch(&params, rows).unwrap();
    d
}

#[test]
fn randomized_rows_satisfy_distribution_laws() {
    let nbins = 50;
    let rows = 8;
    let d = random_distribution(nbins, rows, 7);

    for row in 0..rows {
        // body bin masses integrate to one
        let cum = d.body().bin_cdf(row).unwrap();
        assert_eq!(*cum.last().unwrap(), 1.0);

        // cdf is monotone and bounded over a grid straddling both tails
        let mut prev = -1.0;
        for i in 0..=200 {
            let x = -8.0 + i as f64 * 0.08;
            let c = d.cdf_at(x, row).unwrap();
            assert!((0.0..=1.0).contains(&c), "cdf({x})={c} out of bounds");
            assert!(c >= prev - 1e-9, "cdf not monotone at x={x}: {c} < {prev}");
            prev = c;
        }

        // quantile round trip across tail and body regions
        for q in [0.01, 0.05, 0.2, 0.5, 0.8, 0.95, 0.99] {
            let x = d.icdf_at(q, row).unwrap();
            assert_relative_eq!(d.cdf_at(x, row).unwrap(), q, epsilon = 1e-8);
        }
    }
}

#[test]
fn vectorized_queries_match_scalar_queries() {
    let nbins = 30;
    let rows = 6;
    let d = random_distribution(nbins, rows, 41);

    let xs: Vec<f64> = (0..rows).map(|i| -6.0 + 2.1 * i as f64).collect();
    let lps = d.log_prob(&xs).unwrap();
    let cdfs = d.cdf(&xs).unwrap();
    for (i, &x) in xs.iter().enumerate() {
        assert_relative_eq!(lps[i], d.log_prob_at(x, i).unwrap(), epsilon = 1e-15);
        assert_relative_eq!(cdfs[i], d.cdf_at(x, i).unwrap(), epsilon = 1e-15);
    }

    let trained = d.training_log_prob(&xs).unwrap();
    for (i, &x) in xs.iter().enumerate() {
        assert_relative_eq!(
            trained[i],
            d.training_log_prob_at(x, i).unwrap(),
            epsilon = 1e-15
        );
    }
}

#[test]
fn nan_queries_are_validation_errors() {
    let d = random_distribution(20, 1, 11);
    assert!(d.cdf_at(f64::NAN, 0).is_err());
    assert!(d.icdf_at(f64::NAN, 0).is_err());
    assert!(d.cdf(&[f64::NAN]).is_err());
    assert!(d.icdf(&[f64::NAN]).is_err());
}

#[test]
fn trait_object_surface() {
    let d = random_distribution(20, 1, 3);
    let dist: &dyn Univariate = &d;

    let qs = [0.1, 0.5, 0.9];
    let xs = dist.icdf_batch(&qs).unwrap();
    let back = dist.cdf_batch(&xs).unwrap();
    for (&q, &c) in qs.iter().zip(back.iter()) {
        assert_relative_eq!(c, q, epsilon = 1e-9);
    }
    let lps = dist.log_prob_batch(&xs).unwrap();
    assert!(lps.iter().all(|lp| lp.is_finite()));
}

#[test]
fn spec_built_distribution_behaves_like_direct_construction() {
    let spec = SplicedBinnedParetoSpec {
        lower_bound: 0.0,
        upper_bound: 10.0,
        nbins: 10,
        smoothing: Smoothing::Cheap,
        tail_percentile: 0.1,
    };
    let from_spec = spec.build().unwrap();
    let direct = SplicedBinnedPareto::new(0.0, 10.0, 10, Smoothing::Cheap, 0.1).unwrap();

    for x in [0.5, 3.3, 5.0, 9.2] {
        assert_relative_eq!(
            from_spec.log_prob_at(x, 0).unwrap(),
            direct.log_prob_at(x, 0).unwrap(),
            epsilon = 1e-15
        );
    }
}
