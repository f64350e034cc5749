use criterion::{black_box, criterion_group, criterion_main, Criterion};
use loadgen_stats::{defaults::BINS, AgentSnapshot, ConnectionStats, HistogramSampler, Percentile};

fn bench_sample(c: &mut Criterion) {
    let mut sampler = HistogramSampler::new(BINS, 4);
    let mut latency = 1.0;
    c.bench_function("sample", |b| {
        b.iter(|| {
            latency = if latency > 1_000_000.0 { 1.0 } else { latency * 1.37 };
            sampler.sample(black_box(latency), 2);
        })
    });
}

fn bench_quantile(c: &mut Criterion) {
    let mut sampler = HistogramSampler::new(BINS, 1);
    for i in 0..100_000u32 {
        sampler.sample(f64::from(i % 50_000) + 10.0, 0);
    }
    let p999 = Percentile::from_code(999);
    c.bench_function("quantile_p999", |b| {
        b.iter(|| sampler.quantile(black_box(p999), 0))
    });
}

fn bench_merge_snapshot(c: &mut Criterion) {
    let mut agent = ConnectionStats::new(true, 8);
    agent.read_sampler.sample(250.0, 3);
    let snapshot = AgentSnapshot::from_stats(&agent).unwrap();
    let mut coordinator = ConnectionStats::new(true, 8);
    c.bench_function("merge_snapshot", |b| {
        b.iter(|| coordinator.merge_snapshot(black_box(&snapshot)))
    });
}

criterion_group!(benches, bench_sample, bench_quantile, bench_merge_snapshot);
criterion_main!(benches);
