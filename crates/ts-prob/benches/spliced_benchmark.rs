use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use ts_prob::{Smoothing, SplicedBinnedPareto};

fn bench_spliced_queries(c: &mut Criterion) {
    let nbins = 100;
    let mut d = SplicedBinnedPareto::new(0.0, 10.0, nbins, Smoothing::None, 0.05).unwrap();
    let params: Vec<f64> = (0..nbins + 4).map(|i| (i as f64 * 0.37).sin()).collect();
    d.set_parameters(&params).unwrap();

    let xs: Vec<f64> = (0..10_000).map(|i| (i as f64) * 0.0012 - 1.0).collect();
    c.bench_function("spliced_log_prob_10k", |b| {
        b.iter(|| black_box(d.log_prob(&xs).unwrap()))
    });

    c.bench_function("spliced_cdf_10k", |b| b.iter(|| black_box(d.cdf(&xs).unwrap())));

    let qs: Vec<f64> = (0..10_000).map(|i| ((i as f64) + 0.5) / 10_000.0).collect();
    c.bench_function("spliced_icdf_10k", |b| b.iter(|| black_box(d.icdf(&qs).unwrap())));
}

fn bench_binned_body(c: &mut Criterion) {
    let geom = ts_prob::BinGeometry::new(0.0, 10.0, 100).unwrap();
    let d = ts_prob::BinnedDistribution::new(geom, Smoothing::Kernel);
    let xs: Vec<f64> = (0..10_000).map(|i| (i as f64) * 0.001).collect();
    c.bench_function("binned_log_prob_kernel_10k", |b| {
        b.iter(|| black_box(d.log_prob(&xs).unwrap()))
    });
}

criterion_group!(benches, bench_spliced_queries, bench_binned_body);
criterion_main!(benches);
