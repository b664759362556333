//! Face-evoked scenario run through every stage

use eeg_core::{find_events, ChannelType};
use eeg_processing::{
    AnalysisConfig, AnalysisPipeline, Epochs, EpochsConfig, ButterworthFilter, FilterConfig,
    SignalProcessor, TfrConfig, NCycles, tfr_morlet,
};
use eeg_simulation::{ErpConfig, ErpSimulator};

fn faces(seed: u64) -> eeg_simulation::ErpDataset {
    ErpSimulator::new(ErpConfig::faces(seed)).unwrap().generate().unwrap()
}

#[test]
fn test_faces_evoked_per_condition() {
    let data = faces(2024);
    assert_eq!(data.events.len(), 1055);

    let mut config = AnalysisConfig::faces_erp().unwrap();
    config.epochs.reject.clear();
    config.decoding = None;
    let pipeline = AnalysisPipeline::new(config).unwrap();

    let filtered = pipeline.preprocess(data.recording.clone()).unwrap();
    assert_eq!(filtered.data().dim(), data.recording.data().dim());

    let epochs = pipeline.epoch(&filtered, &data.events).unwrap();
    assert_eq!(epochs.len(), 1055);

    let evoked = pipeline.evoked(&epochs).unwrap();
    assert_eq!(evoked.len(), 2);
    let (label_a, a) = &evoked[0];
    let (label_b, b) = &evoked[1];
    assert_eq!(label_a, "Face/A");
    assert_eq!(label_b, "Face/B");
    assert_eq!(a.nave, 600);
    assert_eq!(b.nave, 455);

    // 8 EEG channels plus EOG, the stim channel is not data
    for ev in [a, b] {
        assert_eq!(ev.data.nrows(), 9);
        assert_eq!(ev.data.ncols(), 121);
        assert_eq!(ev.times.len(), 121);
    }

    // N170 is larger for Face/A on the occipito-temporal sites
    let peak_a = a.peak("P8", Some((0.12, 0.22))).unwrap();
    let peak_b = b.peak("P8", Some((0.12, 0.22))).unwrap();
    assert!(peak_a.amplitude < 0.0);
    assert!(peak_a.amplitude.abs() > peak_b.amplitude.abs());
}

#[test]
fn test_rejection_bounds_retained_epochs() {
    let data = faces(99);
    let events = find_events(&data.recording, "STI 014").unwrap();
    assert_eq!(events.len(), data.events.len());

    let config = EpochsConfig::new(-0.2, 0.6, data.event_id.clone())
        .with_reject(ChannelType::Eeg, 150e-6)
        .with_reject(ChannelType::Eog, 100e-6);

    let mut filter = ButterworthFilter::new(FilterConfig::bandpass(1.0, 30.0, 4)).unwrap();
    let filtered = filter.process(&data.recording).unwrap();
    let epochs = Epochs::from_recording(&filtered, &events, &config).unwrap();

    assert!(epochs.len() <= events.len());
    let summary = epochs.drop_log_summary();
    assert_eq!(summary.retained + summary.rejected + summary.flat + summary.no_data, summary.total);

    for (e, epoch) in epochs.data().outer_iter().enumerate() {
        for (ch, row) in epochs.channels().iter().zip(epoch.rows()) {
            let limit = config.reject[&ch.kind];
            let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let min = row.iter().cloned().fold(f64::INFINITY, f64::min);
            assert!(max - min <= limit, "epoch {} channel {} exceeds {}", e, ch.name, limit);
        }
    }
}

#[test]
fn test_itc_bounds_on_face_epochs() {
    let data = faces(7);
    let mut config = EpochsConfig::new(-0.2, 0.6, data.event_id.clone());
    config.baseline = None;
    let epochs = Epochs::from_recording(&data.recording, &data.events, &config)
        .unwrap()
        .select("Face/A")
        .unwrap();

    let tfr = tfr_morlet(&epochs, &TfrConfig::new(vec![4.0, 6.0, 8.0, 12.0], NCycles::Fixed(2.0))).unwrap();
    assert!(tfr.itc.iter().all(|&v| (0.0..=1.0).contains(&v)));
    assert_eq!(tfr.nave, 600);
}

#[test]
fn test_faces_decoding_above_chance() {
    let data = faces(31);
    let mut config = AnalysisConfig::faces_erp().unwrap();
    config.epochs.reject.clear();
    config.tfr = None;
    config.topomap = None;

    let pipeline = AnalysisPipeline::new(config).unwrap();
    let report = pipeline.run(data.recording, &data.events).unwrap();
    let decoding = report.decoding.unwrap();

    assert_eq!(decoding.classes, vec!["Face/A", "Face/B"]);
    assert_eq!(decoding.class_counts, vec![600, 455]);
    assert!(decoding.score > 0.6, "validation accuracy {}", decoding.score);
}
