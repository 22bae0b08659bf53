//! Benchmarks for the streaming ECG pipeline.
//!
//! Run with: cargo bench -p ecg-core --bench pipeline_bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use ecg_core::prelude::*;
use ecg_core::qrs_filter::QrsFilter;

/// Ten seconds of synthetic 200 Hz ECG at 72 bpm.
fn synthetic_record(seconds: usize) -> Vec<i32> {
    let mut signal = vec![0i32; seconds * 200];
    let mut t = 60usize;
    while t + 10 < signal.len() {
        for (k, v) in [700, 1500, 700, -700, -350].iter().enumerate() {
            signal[t + k] += v;
        }
        t += 166;
    }
    signal
}

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("qrs_filter");
    let record = synthetic_record(10);
    group.throughput(Throughput::Elements(record.len() as u64));

    group.bench_function("filter_10s", |b| {
        let params = ecg_core::params::DetectionParams::new(200);
        b.iter(|| {
            let mut filt = QrsFilter::new(&params);
            let mut acc = 0i64;
            for &s in &record {
                acc += filt.filter(black_box(s)) as i64;
            }
            acc
        })
    });

    group.finish();
}

fn bench_detector(c: &mut Criterion) {
    let mut group = c.benchmark_group("qrs_detector");
    let record = synthetic_record(30);
    group.throughput(Throughput::Elements(record.len() as u64));

    group.bench_function("detect_30s", |b| {
        b.iter(|| {
            let mut det = QrsDetector::new(200).unwrap();
            let mut beats = 0u32;
            for &s in &record {
                if det.detect(black_box(s)) != 0 {
                    beats += 1;
                }
            }
            beats
        })
    });

    group.finish();
}

fn bench_full_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("bdac");
    let record = synthetic_record(30);
    group.throughput(Throughput::Elements(record.len() as u64));

    group.bench_function("classify_30s", |b| {
        b.iter(|| {
            let mut bdac = Bdac::new(200, 100).unwrap();
            let mut beats = 0u32;
            for &s in &record {
                if bdac.process(black_box(s)).is_some() {
                    beats += 1;
                }
            }
            beats
        })
    });

    group.finish();
}

criterion_group!(benches, bench_filter, bench_detector, bench_full_pipeline);
criterion_main!(benches);
