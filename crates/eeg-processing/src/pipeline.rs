//! Analysis pipeline chaining preprocessing, epoching, time-frequency and decoding

use crate::config::{AnalysisConfig, DecodingSection, ModelKind, Representation};
use crate::epochs::{DropLogSummary, Epochs, Evoked};
use crate::features::{band_power_dataset, flatten_epochs, windowed_dataset};
use crate::filters::{AverageReference, ButterworthFilter, FilterBank, FilterConfig, NotchFilter};
use crate::processor::{ProcessingMetrics, ProcessorConfig, SignalProcessor};
use crate::tfr::{tfr_morlet, AverageTfr, TfrMeasure};
use crate::viz::{HeatmapFigure, LineFigure, TopomapFigure};
use eeg_core::{ChannelType, EegError, EegResult, Event, Recording};
use eeg_decoding::{
    cross_validate, Classifier, CrossValidation, Dataset, LogisticRegression, ShallowConvNet,
    Trainer, TrainingHistory,
};
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Grid size of topomap figures
pub const TOPOMAP_RESOLUTION: usize = 64;

/// Outcome of the decoding stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodingReport {
    pub model: String,
    pub classes: Vec<String>,
    pub class_counts: Vec<usize>,
    pub n_samples: usize,
    pub n_features: usize,
    /// Single fit history, absent when cross-validating
    pub history: Option<TrainingHistory>,
    pub cross_validation: Option<CrossValidation>,
    /// Last-epoch validation accuracy, or mean fold accuracy
    pub score: f64,
}

impl DecodingReport {
    /// Loss and accuracy figures of the single fit, or of the first fold
    pub fn training_curves(&self) -> Option<(LineFigure, LineFigure)> {
        self.history
            .as_ref()
            .or_else(|| self.cross_validation.as_ref().and_then(|cv| cv.histories.first()))
            .map(LineFigure::training_curves)
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub name: String,
    pub n_events: usize,
    /// Processor chain applied to the continuous data
    pub preprocessing: Vec<ProcessorConfig>,
    pub drop_log: DropLogSummary,
    pub condition_counts: BTreeMap<String, usize>,
    /// Butterfly plot per condition
    pub evoked: Vec<LineFigure>,
    /// All conditions on the channel with the largest deflection
    pub comparison: Option<LineFigure>,
    pub tfr: Option<HeatmapFigure>,
    pub topomap: Option<TopomapFigure>,
    pub decoding: Option<DecodingReport>,
    pub metrics: Vec<ProcessingMetrics>,
}

impl AnalysisReport {
    pub fn to_json(&self) -> EegResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| EegError::ConfigurationError {
            message: format!("Failed to serialize report: {}", e),
        })
    }
}

/// Stages of an analysis driven by one validated configuration
pub struct AnalysisPipeline {
    config: AnalysisConfig,
}

impl AnalysisPipeline {
    pub fn new(config: AnalysisConfig) -> EegResult<Self> {
        config.validate()?;
        info!(name = %config.name, "analysis pipeline configured");
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Processor chain for the preprocessing section
    pub fn filter_bank(&self) -> EegResult<FilterBank> {
        let pre = &self.config.preprocessing;
        let mut bank = FilterBank::new();
        if let Some(freq) = pre.notch {
            bank.add_filter(Box::new(NotchFilter::new(freq, 30.0)));
        }
        let bandpass = FilterConfig::bandpass(pre.l_freq, pre.h_freq, pre.order);
        bank.add_filter(Box::new(ButterworthFilter::new(bandpass)?));
        if pre.average_reference {
            bank.add_filter(Box::new(AverageReference::new()));
        }
        Ok(bank)
    }

    /// Mark bad channels, filter and optionally re-reference
    pub fn preprocess(&self, mut recording: Recording) -> EegResult<Recording> {
        let pre = &self.config.preprocessing;
        recording.mark_bad(&pre.bad_channels)?;
        let mut bank = self.filter_bank()?;
        debug!(stages = ?bank.names(), "preprocessing");
        bank.process(&recording)
    }

    pub fn epoch(&self, recording: &Recording, events: &[Event]) -> EegResult<Epochs> {
        let epochs = Epochs::from_recording(recording, events, &self.config.epochs)?;
        let summary = epochs.drop_log_summary();
        info!(
            retained = summary.retained,
            total = summary.total,
            dropped_pct = summary.drop_percentage(),
            "epoching done"
        );
        Ok(epochs)
    }

    /// One average per condition label present in the epochs
    pub fn evoked(&self, epochs: &Epochs) -> EegResult<Vec<(String, Evoked)>> {
        if epochs.is_empty() {
            return Err(EegError::EmptyEpochs { reason: "nothing to average".to_string() });
        }
        epochs
            .counts()
            .into_keys()
            .map(|label| {
                let evoked = epochs.select(&label)?.average()?;
                Ok((label, evoked))
            })
            .collect()
    }

    /// Morlet TFR of the epochs matching `tag`, baseline-normalised when configured
    pub fn time_frequency(&self, epochs: &Epochs, tag: &str) -> EegResult<AverageTfr> {
        let section = self
            .config
            .tfr
            .as_ref()
            .ok_or_else(|| EegError::MissingParameter { name: "tfr".to_string() })?;
        let tfr_config = section.tfr_config()?;
        let selected = epochs.select(tag)?;
        let mut tfr = tfr_morlet(&selected, &tfr_config)?;
        if let Some((baseline, mode)) = section.baseline {
            tfr.apply_baseline(baseline, mode)?;
        }
        Ok(tfr)
    }

    /// Scalp map of the configured band and time window
    pub fn topomap(&self, tfr: &AverageTfr) -> EegResult<TopomapFigure> {
        let section = self
            .config
            .topomap
            .as_ref()
            .ok_or_else(|| EegError::MissingParameter { name: "topomap".to_string() })?;
        let w = section.window()?;
        let values = tfr.band_mean(section.measure, w.fmin, w.fmax, w.tmin, w.tmax)?;
        let title = format!(
            "{} {:?} {}-{} Hz, {}-{} s",
            tfr.comment, section.measure, w.fmin, w.fmax, w.tmin, w.tmax
        );
        TopomapFigure::from_values(&title, &tfr.channels, &values, TOPOMAP_RESOLUTION)
    }

    /// Build the configured representation and train the configured model
    pub fn decode(&self, epochs: &Epochs) -> EegResult<DecodingReport> {
        let section = self
            .config
            .decoding
            .as_ref()
            .ok_or_else(|| EegError::MissingParameter { name: "decoding".to_string() })?;
        let dataset = build_dataset(epochs, section)?;
        info!(
            samples = dataset.len(),
            features = dataset.shape().n_features(),
            classes = ?dataset.class_names(),
            "decoding dataset built"
        );

        let shape = dataset.shape();
        let n_classes = dataset.n_classes();
        match &section.model {
            ModelKind::Logistic { l2 } => {
                let l2 = *l2;
                train_model(section, &dataset, |_| LogisticRegression::new(shape, n_classes, l2))
            }
            ModelKind::ShallowConvNet(net) => train_model(section, &dataset, |fold| {
                let mut net = *net;
                net.seed = net.seed.wrapping_add(fold as u64);
                ShallowConvNet::new(shape, n_classes, net)
            }),
        }
    }

    /// Run every configured stage in order.
    ///
    /// A time-frequency, topomap or decoding stage whose parameters are left
    /// unset is skipped and reported as a failed stage; other errors abort.
    pub fn run(&self, recording: Recording, events: &[Event]) -> EegResult<AnalysisReport> {
        let mut metrics = Vec::new();
        let preprocessing = self.filter_bank()?.stages();

        let recording = timed(&mut metrics, "preprocess", || self.preprocess(recording))?;
        let epochs = timed(&mut metrics, "epoch", || self.epoch(&recording, events))?;
        let evoked = timed(&mut metrics, "evoked", || self.evoked(&epochs))?;

        let evoked_figures = evoked
            .iter()
            .map(|(_, ev)| LineFigure::evoked(ev, &[]))
            .collect::<EegResult<Vec<_>>>()?;
        let comparison = match evoked.first().and_then(|(_, ev)| strongest_channel(ev)) {
            Some(channel) => {
                let pairs: Vec<(String, &Evoked)> =
                    evoked.iter().map(|(label, ev)| (label.clone(), ev)).collect();
                Some(LineFigure::compare_evokeds(&pairs, &channel)?)
            }
            None => None,
        };

        let mut tfr_figure = None;
        let mut topomap = None;
        if let Some(section) = &self.config.tfr {
            let tfr = optional(timed(&mut metrics, "time_frequency", || {
                self.time_frequency(&epochs, &section.condition)
            }))?;
            if let Some(tfr) = tfr {
                let measure = self.config.topomap.as_ref().map_or(TfrMeasure::Power, |t| t.measure);
                if let Some(channel) = strongest_tfr_channel(&tfr, measure) {
                    tfr_figure = Some(HeatmapFigure::from_tfr(&tfr, &channel, measure)?);
                }
                if self.config.topomap.is_some() {
                    topomap = optional(timed(&mut metrics, "topomap", || self.topomap(&tfr)))?;
                }
            }
        }

        let decoding = match &self.config.decoding {
            Some(_) => optional(timed(&mut metrics, "decode", || self.decode(&epochs)))?,
            None => None,
        };

        Ok(AnalysisReport {
            name: self.config.name.clone(),
            n_events: events.len(),
            preprocessing,
            drop_log: epochs.drop_log_summary(),
            condition_counts: epochs.counts(),
            evoked: evoked_figures,
            comparison,
            tfr: tfr_figure,
            topomap,
            decoding,
            metrics,
        })
    }
}

fn build_dataset(epochs: &Epochs, section: &DecodingSection) -> EegResult<Dataset> {
    let tags: Vec<&str> = section.classes.iter().map(String::as_str).collect();
    match &section.representation {
        Representation::Flatten => flatten_epochs(epochs, &tags),
        Representation::Windowed { window_samples, stride } => {
            windowed_dataset(epochs, *window_samples, *stride, &tags)
        }
        Representation::BandPower { bands } => band_power_dataset(epochs, bands, &tags),
    }
}

fn train_model<M, F>(section: &DecodingSection, dataset: &Dataset, factory: F) -> EegResult<DecodingReport>
where
    M: Classifier,
    F: Fn(usize) -> EegResult<M>,
{
    let model_name = factory(0)?.name().to_string();
    let (history, cross_validation, score) = if section.cross_validate {
        let cv = cross_validate(factory, dataset, &section.trainer)?;
        info!(mean = cv.mean_score(), std = cv.std_score(), "cross-validation done");
        let score = cv.mean_score();
        (None, Some(cv), score)
    } else {
        let trained = Trainer::new(section.trainer.clone())?.fit(factory(0)?, dataset)?;
        let score = trained.history.last().map_or(0.0, |r| r.valid_accuracy);
        (Some(trained.history), None, score)
    };

    Ok(DecodingReport {
        model: model_name,
        classes: dataset.class_names().to_vec(),
        class_counts: dataset.class_counts(),
        n_samples: dataset.len(),
        n_features: dataset.shape().n_features(),
        history,
        cross_validation,
        score,
    })
}

/// Run a stage and record its timing and outcome
fn timed<T, F>(metrics: &mut Vec<ProcessingMetrics>, stage: &str, f: F) -> EegResult<T>
where
    F: FnOnce() -> EegResult<T>,
{
    let timer = ProcessingMetrics::start_timing(stage);
    match f() {
        Ok(value) => {
            let m = timer.finish();
            debug!(stage, elapsed_us = m.processing_time_us, "stage finished");
            metrics.push(m);
            Ok(value)
        }
        Err(e) => {
            metrics.push(timer.finish_with_error(&e));
            Err(e)
        }
    }
}

/// Turn a missing-parameter failure into a skipped stage
fn optional<T>(result: EegResult<T>) -> EegResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(EegError::MissingParameter { name }) => {
            warn!(parameter = %name, "stage skipped: parameter not set");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn strongest_channel(evoked: &Evoked) -> Option<String> {
    evoked
        .data
        .rows()
        .into_iter()
        .zip(&evoked.channels)
        .filter(|(_, ch)| ch.kind == ChannelType::Eeg)
        .map(|(row, ch)| (row.iter().fold(0.0_f64, |m, v| m.max(v.abs())), ch))
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, ch)| ch.name.clone())
}

fn strongest_tfr_channel(tfr: &AverageTfr, measure: TfrMeasure) -> Option<String> {
    tfr.measure(measure)
        .axis_iter(Axis(0))
        .zip(&tfr.channels)
        .map(|(plane, ch)| {
            let finite: Vec<f64> = plane.iter().filter(|v| v.is_finite()).map(|v| v.abs()).collect();
            let mean = finite.iter().sum::<f64>() / finite.len().max(1) as f64;
            (mean, ch)
        })
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, ch)| ch.name.clone())
}
