//! Configuration for an end-to-end analysis run

use crate::epochs::{Baseline, EpochsConfig};
use crate::features::FrequencyBand;
use crate::tfr::{BaselineMode, NCycles, TfrConfig, TfrMeasure};
use eeg_core::{ChannelType, EegError, EegResult, EventId};
use eeg_decoding::{ConvNetConfig, SplitStrategy, TrainerConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Continuous-data cleaning applied before epoching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Band-pass low cutoff (Hz)
    pub l_freq: f64,
    /// Band-pass high cutoff (Hz)
    pub h_freq: f64,
    #[serde(default = "default_order")]
    pub order: usize,
    /// Line-noise frequency to notch out before band-passing
    #[serde(default)]
    pub notch: Option<f64>,
    /// Channels excluded from analysis
    #[serde(default)]
    pub bad_channels: Vec<String>,
    #[serde(default)]
    pub average_reference: bool,
}

fn default_order() -> usize {
    4
}

impl PreprocessingConfig {
    pub fn validate(&self) -> EegResult<()> {
        if !(self.l_freq > 0.0 && self.l_freq < self.h_freq) {
            return Err(EegError::InvalidFilterBand {
                low_hz: self.l_freq,
                high_hz: self.h_freq,
                nyquist_hz: f64::NAN,
            });
        }
        if self.order == 0 {
            return Err(EegError::ConfigurationError {
                message: "Filter order must be at least 1".to_string(),
            });
        }
        if let Some(freq) = self.notch {
            if !(freq > 0.0) {
                return Err(EegError::ConfigurationError {
                    message: format!("Notch frequency must be positive, got {}", freq),
                });
            }
        }
        Ok(())
    }
}

/// Time-frequency stage. Frequencies have no default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfrSection {
    /// Condition tag selecting the epochs to decompose
    pub condition: String,
    #[serde(default)]
    pub freqs: Option<Vec<f64>>,
    pub n_cycles: NCycles,
    #[serde(default = "default_decim")]
    pub decim: usize,
    /// Baseline interval and normalisation for power
    #[serde(default)]
    pub baseline: Option<(Baseline, BaselineMode)>,
}

fn default_decim() -> usize {
    1
}

impl TfrSection {
    pub fn tfr_config(&self) -> EegResult<TfrConfig> {
        let freqs = self
            .freqs
            .clone()
            .ok_or_else(|| EegError::MissingParameter { name: "tfr.freqs".to_string() })?;
        Ok(TfrConfig { freqs, n_cycles: self.n_cycles.clone(), decim: self.decim })
    }
}

/// Topographic comparison window. Ranges have no default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopomapSection {
    pub measure: TfrMeasure,
    #[serde(default)]
    pub fmin: Option<f64>,
    #[serde(default)]
    pub fmax: Option<f64>,
    #[serde(default)]
    pub tmin: Option<f64>,
    #[serde(default)]
    pub tmax: Option<f64>,
}

/// Resolved topomap window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopomapWindow {
    pub fmin: f64,
    pub fmax: f64,
    pub tmin: f64,
    pub tmax: f64,
}

impl TopomapSection {
    pub fn window(&self) -> EegResult<TopomapWindow> {
        let require = |value: Option<f64>, name: &str| {
            value.ok_or_else(|| EegError::MissingParameter { name: format!("topomap.{}", name) })
        };
        let window = TopomapWindow {
            fmin: require(self.fmin, "fmin")?,
            fmax: require(self.fmax, "fmax")?,
            tmin: require(self.tmin, "tmin")?,
            tmax: require(self.tmax, "tmax")?,
        };
        if window.fmin > window.fmax {
            return Err(EegError::InvalidFilterBand {
                low_hz: window.fmin,
                high_hz: window.fmax,
                nyquist_hz: f64::NAN,
            });
        }
        if window.tmin > window.tmax {
            return Err(EegError::InvalidEpochWindow { tmin: window.tmin, tmax: window.tmax });
        }
        Ok(window)
    }
}

/// How epochs become classifier samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Representation {
    Flatten,
    Windowed { window_samples: usize, stride: usize },
    BandPower { bands: Vec<FrequencyBand> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Logistic { l2: f64 },
    ShallowConvNet(ConvNetConfig),
}

/// Decoding stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodingSection {
    /// Condition tags, one class each
    pub classes: Vec<String>,
    pub representation: Representation,
    pub model: ModelKind,
    pub trainer: TrainerConfig,
    /// Run stratified k-fold instead of a single fit
    #[serde(default)]
    pub cross_validate: bool,
}

impl DecodingSection {
    pub fn validate(&self) -> EegResult<()> {
        if self.classes.len() < 2 {
            return Err(EegError::ConfigurationError {
                message: format!("Decoding needs at least 2 classes, got {:?}", self.classes),
            });
        }
        self.trainer.validate()?;
        if self.cross_validate && matches!(self.trainer.split, SplitStrategy::HoldOut { .. }) {
            return Err(EegError::ConfigurationError {
                message: "Cross-validation requires a stratified k-fold split".to_string(),
            });
        }
        match &self.representation {
            Representation::Windowed { window_samples, stride } if *window_samples == 0 || *stride == 0 => {
                Err(EegError::ConfigurationError {
                    message: "Window length and stride must be positive".to_string(),
                })
            }
            Representation::BandPower { bands } if bands.is_empty() => {
                Err(EegError::MissingParameter { name: "decoding.representation.bands".to_string() })
            }
            _ => Ok(()),
        }
    }
}

/// Full analysis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub name: String,
    /// Trigger channel to read events from when no event file is given
    #[serde(default = "default_stim_channel")]
    pub stim_channel: String,
    pub preprocessing: PreprocessingConfig,
    pub epochs: EpochsConfig,
    #[serde(default)]
    pub tfr: Option<TfrSection>,
    #[serde(default)]
    pub topomap: Option<TopomapSection>,
    #[serde(default)]
    pub decoding: Option<DecodingSection>,
}

fn default_stim_channel() -> String {
    "STI 014".to_string()
}

impl AnalysisConfig {
    /// Face-evoked analysis: 1-30 Hz, -0.2..0.6 s epochs, 150 uV EEG rejection.
    ///
    /// Time-frequency and topomap sections are present but their frequency
    /// and time ranges are left unset.
    pub fn faces_erp() -> EegResult<Self> {
        let event_id = EventId::from_pairs(&[("Face/A", 1), ("Face/B", 2)])?;
        Ok(AnalysisConfig {
            name: "Faces ERP".to_string(),
            stim_channel: default_stim_channel(),
            preprocessing: PreprocessingConfig {
                l_freq: 1.0,
                h_freq: 30.0,
                order: 4,
                notch: None,
                bad_channels: Vec::new(),
                average_reference: false,
            },
            epochs: EpochsConfig::new(-0.2, 0.6, event_id)
                .with_reject(ChannelType::Eeg, 150e-6)
                .with_reject(ChannelType::Eog, 250e-6),
            tfr: Some(TfrSection {
                condition: "Face".to_string(),
                freqs: None,
                n_cycles: NCycles::Proportional(2.0),
                decim: 1,
                baseline: Some(((None, Some(0.0)), BaselineMode::LogRatio)),
            }),
            topomap: Some(TopomapSection {
                measure: TfrMeasure::Power,
                fmin: None,
                fmax: None,
                tmin: None,
                tmax: None,
            }),
            decoding: Some(DecodingSection {
                classes: vec!["Face/A".to_string(), "Face/B".to_string()],
                representation: Representation::Flatten,
                model: ModelKind::Logistic { l2: 1e-2 },
                trainer: TrainerConfig {
                    batch_size: 64,
                    max_epochs: 20,
                    learning_rate: 1e-2,
                    ..TrainerConfig::default()
                },
                cross_validate: false,
            }),
        })
    }

    /// Validate every section.
    ///
    /// Unset TFR frequencies and topomap ranges are not errors here; they
    /// fail with `MissingParameter` when their stage is run.
    pub fn validate(&self) -> EegResult<()> {
        if self.name.is_empty() {
            return Err(EegError::ConfigurationError {
                message: "Configuration name cannot be empty".to_string(),
            });
        }
        self.preprocessing.validate()?;
        self.epochs.validate()?;

        if let Some(tfr) = &self.tfr {
            if tfr.condition.is_empty() {
                return Err(EegError::MissingParameter { name: "tfr.condition".to_string() });
            }
            if tfr.decim == 0 {
                return Err(EegError::ConfigurationError {
                    message: "Decimation factor must be at least 1".to_string(),
                });
            }
            if let Some(freqs) = &tfr.freqs {
                tfr.n_cycles.resolve(freqs)?;
            }
        }
        if let Some(topomap) = &self.topomap {
            if self.tfr.is_none() {
                return Err(EegError::ConfigurationError {
                    message: "Topomap section requires a tfr section".to_string(),
                });
            }
            // Only check ranges that are fully specified
            if topomap.fmin.is_some() && topomap.fmax.is_some() && topomap.tmin.is_some() && topomap.tmax.is_some() {
                topomap.window()?;
            }
        }
        if let Some(decoding) = &self.decoding {
            decoding.validate()?;
        }
        Ok(())
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> EegResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| EegError::ConfigurationError {
            message: format!("Failed to serialize configuration: {}", e),
        })
    }

    /// Import configuration from JSON
    pub fn from_json(json: &str) -> EegResult<Self> {
        serde_json::from_str(json).map_err(|e| EegError::ConfigurationError {
            message: format!("Failed to deserialize configuration: {}", e),
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> EegResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| EegError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json(&text)
    }
}
