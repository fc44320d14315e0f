//! Benchmarks for the per-iteration regulation path.
//!
//! Run with: cargo bench --bench reg_benchmarks

use criterion::{Criterion, criterion_group, criterion_main};
use powerconv_reg::config::{RegConfig, RegMode, RstSource};
use powerconv_reg::mgr::{RegMgr, prepare_rst};
use powerconv_reg::SignalKind;

fn bench_iteration(c: &mut Criterion) {
    for mode in [RegMode::Voltage, RegMode::Current, RegMode::Field] {
        let Ok(mut mgr) = RegMgr::with_config(RegConfig::default()) else {
            return;
        };
        if mgr.simulate_init(mode, 10.0).is_err() {
            continue;
        }

        c.bench_function(&format!("{}_iteration", mode.name().to_lowercase()), |b| {
            b.iter(|| {
                let mut reference = std::hint::black_box(10.0);
                mgr.measurement_intake(RstSource::Operational, true, true);
                std::hint::black_box(mgr.regulate(&mut reference));
                std::hint::black_box(mgr.simulate(0.0));
            });
        });
    }
}

fn bench_rst_init(c: &mut Criterion) {
    let config = RegConfig::default();
    c.bench_function("rst_synthesis", |b| {
        b.iter(|| std::hint::black_box(prepare_rst(&config, SignalKind::Current, RstSource::Operational)));
    });
}

criterion_group!(benches, bench_iteration, bench_rst_init);
criterion_main!(benches);
