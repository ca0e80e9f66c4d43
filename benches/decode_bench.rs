use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gdubm::report::{self, ReportOptions};
use gdubm::{BenchmarkRecord, Sample};
use std::path::Path;

fn synthetic_record(samples: usize) -> BenchmarkRecord {
    let series = |scale: f64| {
        (0..samples)
            .map(|i| Sample::new(i as f64 * 1e9, scale * (1.0 + (i % 7) as f64 / 10.0)))
            .collect::<Vec<_>>()
    };
    BenchmarkRecord {
        device_size:         2_000_398_934_016,
        timestamp_usec:      1_700_000_000_000_000,
        sample_size:         10 * 1024 * 1024,
        read_samples:        series(5e8),
        write_samples:       series(4e8),
        access_time_samples: series(0.012),
    }
}

fn bench_decode(c: &mut Criterion) {
    let bytes = synthetic_record(1000).to_value().to_bytes().unwrap();

    c.bench_function("decode_1000_samples", |b| {
        b.iter(|| BenchmarkRecord::from_bytes(black_box(&bytes)).unwrap())
    });
}

fn bench_render(c: &mut Criterion) {
    let record = synthetic_record(1000);
    let options = ReportOptions::default();

    c.bench_function("render_verbose_1000_samples", |b| {
        b.iter(|| report::render(Path::new("bench.gvariant"), black_box(&record), &options).unwrap())
    });
}

criterion_group!(benches, bench_decode, bench_render);
criterion_main!(benches);
