//! Filter Benchmarks
//!
//! Criterion benchmarks for the per-iteration filter paths.

use criterion::{Criterion, criterion_group, criterion_main};
use powerconv_filters::prelude::*;

fn bench_meas_filter(c: &mut Criterion) {
    let mut filter = MeasFilter::new(64, 16);
    if filter.init([32, 16], 16, 100.0, -100.0, 1.0).is_err() {
        return;
    }
    filter.init_history(0.0);
    let mut input = 0.0;

    c.bench_function("meas_filter", |b| {
        b.iter(|| {
            input += 0.001;
            std::hint::black_box(filter.filter(std::hint::black_box(input)));
        })
    });
}

fn bench_meas_rate(c: &mut Criterion) {
    let Ok(mut rate) = MeasRate::new(0.0001, 1) else {
        return;
    };
    let mut input = 0.0;

    c.bench_function("meas_rate", |b| {
        b.iter(|| {
            input += 0.001;
            std::hint::black_box(rate.update(std::hint::black_box(input)));
        })
    });
}

fn bench_sim_meas_chain(c: &mut Criterion) {
    let config = MeasChainConfig {
        delay_iters: 1.3,
        noise_pp: 0.01,
        tone_amp: 0.001,
        tone_half_period_iters: 10,
        quantisation: 0.0001,
    };
    let Ok(mut chain) = SimMeasChain::new(&config, 1) else {
        return;
    };

    c.bench_function("sim_meas_chain", |b| {
        b.iter(|| std::hint::black_box(chain.measure(std::hint::black_box(1.0))))
    });
}

criterion_group!(benches, bench_meas_filter, bench_meas_rate, bench_sim_meas_chain);
criterion_main!(benches);
