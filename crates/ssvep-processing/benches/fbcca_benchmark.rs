//! FBCCA classification benchmarks
//!
//! One online classification has to finish well inside the 0.5s decision
//! cadence; the filter bank is measured on its own since it dominates.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ssvep_core::{EegBatch, EegWindow};
use ssvep_processing::{ClassifierConfig, FbccaClassifier, FilterBank};
use ssvep_simulation::{EegSimConfig, EegSimulator, GazePattern};

fn window(channels: usize, seconds: f64) -> EegWindow {
    let mut simulator = EegSimulator::new(EegSimConfig {
        channel_count: channels,
        gaze: GazePattern::Fixed { frequency: 9.0 },
        seed: Some(7),
        ..Default::default()
    })
    .unwrap();
    simulator.generate(seconds).unwrap()
}

fn bench_classify_window(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify_window");

    for &channels in &[4, 8, 16] {
        let window = window(channels, 2.0);
        for parallel in [false, true] {
            let classifier = FbccaClassifier::new(ClassifierConfig {
                parallel,
                ..ClassifierConfig::online()
            })
            .unwrap();
            let label = if parallel { "parallel" } else { "sequential" };

            group.bench_with_input(
                BenchmarkId::new(label, format!("{}ch", channels)),
                &window,
                |b, window| b.iter(|| black_box(classifier.classify_window(black_box(window)).unwrap())),
            );
        }
    }

    group.finish();
}

fn bench_filter_bank(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_bank");
    let bank = FilterBank::new(125.0).unwrap();
    let window = window(8, 2.0);

    for idx in [0, 4, 9] {
        group.bench_with_input(BenchmarkId::new("subband", idx), &idx, |b, &idx| {
            b.iter(|| black_box(bank.filter_window(black_box(&window), Some(idx)).unwrap()))
        });
    }

    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let trials: Vec<EegWindow> = (0..40).map(|_| window(8, 2.0)).collect();
    let batch = EegBatch::new(trials).unwrap();
    let classifier = FbccaClassifier::new(ClassifierConfig::offline()).unwrap();

    c.bench_function("classify_batch_40_trials", |b| {
        b.iter(|| black_box(classifier.classify_batch(black_box(&batch)).unwrap()))
    });
}

criterion_group!(benches, bench_classify_window, bench_filter_bank, bench_batch);
criterion_main!(benches);
