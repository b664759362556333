//! Throughput of zero-phase filtering, Morlet TFR and Welch PSD

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use eeg_core::{ChannelInfo, EventId, Recording};
use eeg_processing::{
    tfr_morlet, welch_psd, ButterworthFilter, Epochs, FilterConfig, NCycles, PsdConfig,
    SignalProcessor, TfrConfig,
};
use ndarray::{Array2, Array3};
use std::f64::consts::PI;

const SFREQ: f64 = 250.0;

fn recording(n_channels: usize, seconds: f64) -> Recording {
    let n_times = (seconds * SFREQ) as usize;
    let data = Array2::from_shape_fn((n_channels, n_times), |(ch, i)| {
        let t = i as f64 / SFREQ;
        1e-5 * (2.0 * PI * 10.0 * t + ch as f64).sin() + 2e-6 * (2.0 * PI * 50.0 * t).sin()
    });
    let channels = (0..n_channels).map(|i| ChannelInfo::eeg(&format!("E{}", i))).collect();
    Recording::new(data, channels, SFREQ).unwrap()
}

fn epochs(n_epochs: usize, n_channels: usize) -> Epochs {
    let n_times = 201;
    let data = Array3::from_shape_fn((n_epochs, n_channels, n_times), |(e, ch, i)| {
        let t = -0.2 + i as f64 / SFREQ;
        (2.0 * PI * 10.0 * t + (e + ch) as f64 * 0.3).cos()
    });
    let channels = (0..n_channels).map(|i| ChannelInfo::eeg(&format!("E{}", i))).collect();
    let id = EventId::from_pairs(&[("Face", 1)]).unwrap();
    Epochs::from_array(data, channels, -0.2, SFREQ, vec!["Face".to_string(); n_epochs], id).unwrap()
}

fn bench_bandpass(c: &mut Criterion) {
    let mut group = c.benchmark_group("bandpass_filtfilt");

    for &channels in &[8, 32, 64] {
        let input = recording(channels, 60.0);
        let mut filter = ButterworthFilter::new(FilterConfig::bandpass(1.0, 30.0, 4)).unwrap();

        group.bench_with_input(
            BenchmarkId::new("60s", format!("{}ch", channels)),
            &input,
            |b, input| {
                b.iter(|| black_box(filter.process(black_box(input)).unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_tfr(c: &mut Criterion) {
    let mut group = c.benchmark_group("tfr_morlet");
    let config = TfrConfig::new(TfrConfig::linspace_freqs(4.0, 30.0, 2.0), NCycles::Proportional(2.0));

    for &n_epochs in &[20, 100] {
        let input = epochs(n_epochs, 8);
        group.bench_with_input(BenchmarkId::new("8ch", n_epochs), &input, |b, input| {
            b.iter(|| black_box(tfr_morlet(black_box(input), &config).unwrap()));
        });
    }

    group.finish();
}

fn bench_welch(c: &mut Criterion) {
    let input = recording(32, 120.0);
    let config = PsdConfig::new(1.0, 40.0, 512);
    c.bench_function("welch_psd_32ch_120s", |b| {
        b.iter(|| black_box(welch_psd(black_box(&input), &config).unwrap()));
    });
}

criterion_group!(benches, bench_bandpass, bench_tfr, bench_welch);
criterion_main!(benches);
