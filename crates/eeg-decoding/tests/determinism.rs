use eeg_decoding::{
    ConvNetConfig, Dataset, LogisticRegression, SampleShape, ShallowConvNet, SplitStrategy, Trainer,
    TrainerConfig,
};
use ndarray::Array2;
use std::f64::consts::PI;

/// Two classes that differ in which channel carries a 10 Hz rhythm
fn rhythm_dataset() -> Dataset {
    let shape = SampleShape::new(3, 50);
    let sfreq = 100.0;
    let n = 40;
    let x = Array2::from_shape_fn((n, shape.n_features()), |(i, f)| {
        let (c, t) = (f / shape.times, f % shape.times);
        let carrier = (2.0 * PI * 10.0 * t as f64 / sfreq + i as f64).sin();
        let gain = match (i % 2, c) {
            (0, 0) | (1, 2) => 20e-6,
            _ => 4e-6,
        };
        gain * carrier + 1e-6 * (((i * 97 + f * 31) % 17) as f64 / 17.0 - 0.5)
    });
    let y = (0..n).map(|i| i % 2).collect();
    Dataset::new(x, y, shape, vec!["Face/A".to_string(), "Face/B".to_string()]).unwrap()
}

fn config() -> TrainerConfig {
    TrainerConfig {
        batch_size: 8,
        max_epochs: 6,
        learning_rate: 0.01,
        weight_decay: 1e-4,
        split: SplitStrategy::HoldOut { validation_fraction: 0.25 },
        seed: 1234,
    }
}

#[test]
fn convnet_histories_are_identical_for_a_fixed_seed() {
    let dataset = rhythm_dataset();
    let net_config = ConvNetConfig { n_filters: 4, filter_length: 9, pool_length: 10, pool_stride: 5, seed: 9 };

    let run = || {
        let model = ShallowConvNet::new(dataset.shape(), 2, net_config).unwrap();
        Trainer::new(config()).unwrap().fit(model, &dataset).unwrap().history
    };

    let first = run();
    let second = run();
    assert_eq!(first.len(), 6);
    assert_eq!(first, second);
}

#[test]
fn logistic_histories_are_identical_and_seed_sensitive() {
    let dataset = rhythm_dataset();
    let run = |seed: u64| {
        let model = LogisticRegression::new(dataset.shape(), 2, 1e-2).unwrap();
        let config = TrainerConfig { seed, ..config() };
        Trainer::new(config).unwrap().fit(model, &dataset).unwrap().history
    };

    assert_eq!(run(5), run(5));
    let a = run(5);
    let b = run(6);
    assert_ne!(
        a.records.iter().map(|r| r.train_loss).collect::<Vec<_>>(),
        b.records.iter().map(|r| r.train_loss).collect::<Vec<_>>()
    );
}
