//! Event-related EEG simulator with condition-specific scalp sources

use crate::waveforms::{Source, Topography, Waveform};
use eeg_core::{
    ChannelInfo, ChannelType, EegError, EegResult, Event, EventId, Montage, Recording,
};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use tracing::{debug, info};

/// Name of the per-trial continuous metadata column
pub const COHERENCE: &str = "coherence";

/// One experimental condition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionSpec {
    /// Event label, possibly hierarchical (`"Face/A"`)
    pub label: String,
    /// Trigger code written to the stim channel
    pub code: i32,
    /// Number of trials
    pub count: usize,
    /// Sources active after each onset
    pub sources: Vec<Source>,
    /// Per-trial coherence range; source amplitudes are scaled by the drawn value
    pub coherence: Option<(f64, f64)>,
}

/// Noise configuration for realistic EEG simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseConfig {
    /// Gaussian sensor noise standard deviation in volts
    pub gaussian_std: f64,
    /// Slow drift amplitude in volts
    pub drift_amp: f64,
    /// Power line frequency and amplitude
    pub line_noise: Option<(f64, f64)>,
    /// Probability of a blink per trial (0.0 to 1.0)
    pub blink_prob: f64,
    /// Blink amplitude on the EOG channel in volts
    pub blink_amp: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            gaussian_std: 2e-6,
            drift_amp: 10e-6,
            line_noise: Some((50.0, 2e-6)),
            blink_prob: 0.03,
            blink_amp: 250e-6,
        }
    }
}

/// Configuration for event-related simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErpConfig {
    /// Sampling rate in Hz
    pub sfreq: f64,
    /// EEG channel names; positions come from the standard 10-20 montage
    pub channels: Vec<String>,
    /// Add an EOG channel picking up blinks
    pub include_eog: bool,
    /// Name of the trigger channel
    pub stim_channel: String,
    pub conditions: Vec<ConditionSpec>,
    /// Inter-stimulus interval range in seconds
    pub isi: (f64, f64),
    /// Silence before the first and after the last trial, in seconds
    pub padding: f64,
    /// Trigger pulse length in samples
    pub pulse_samples: usize,
    pub noise: NoiseConfig,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

impl Default for ErpConfig {
    fn default() -> Self {
        Self {
            sfreq: 250.0,
            channels: ["Fz", "Cz", "Pz", "Oz"].iter().map(|s| s.to_string()).collect(),
            include_eog: true,
            stim_channel: "STI 014".to_string(),
            conditions: vec![ConditionSpec {
                label: "Target".to_string(),
                code: 1,
                count: 100,
                sources: vec![Source::new(
                    Waveform::Component { latency: 0.3, width: 0.05, amplitude: 5e-6 },
                    Topography::central(),
                )],
                coherence: None,
            }],
            isi: (0.8, 1.2),
            padding: 1.0,
            pulse_samples: 3,
            noise: NoiseConfig::default(),
            seed: None,
        }
    }
}

impl ErpConfig {
    /// Two face conditions with 600 and 455 trials at 150 Hz.
    ///
    /// Both share a P100 and an occipito-temporal N170; the N170 scales with
    /// per-trial coherence and is larger for "Face/A". "Face/A" also carries a
    /// phase-locked theta burst, "Face/B" an induced alpha burst.
    pub fn faces(seed: u64) -> Self {
        let p100 = Source::new(
            Waveform::Component { latency: 0.1, width: 0.02, amplitude: 4e-6 },
            Topography::new([0.0, -0.8], 0.35),
        );
        let n170 = |amplitude: f64| {
            Source::new(
                Waveform::Component { latency: 0.17, width: 0.025, amplitude },
                Topography::occipito_temporal(),
            )
        };

        Self {
            sfreq: 150.0,
            channels: ["Fz", "Cz", "Pz", "O1", "Oz", "O2", "P7", "P8"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            conditions: vec![
                ConditionSpec {
                    label: "Face/A".to_string(),
                    code: 1,
                    count: 600,
                    sources: vec![
                        p100,
                        n170(-8e-6),
                        Source::new(
                            Waveform::Burst {
                                frequency: 6.0,
                                latency: 0.2,
                                n_cycles: 3.0,
                                amplitude: 3e-6,
                                phase_locked: true,
                            },
                            Topography::central(),
                        ),
                    ],
                    coherence: Some((0.2, 1.0)),
                },
                ConditionSpec {
                    label: "Face/B".to_string(),
                    code: 2,
                    count: 455,
                    sources: vec![
                        p100,
                        n170(-4e-6),
                        Source::new(
                            Waveform::Burst {
                                frequency: 10.0,
                                latency: 0.3,
                                n_cycles: 4.0,
                                amplitude: 3e-6,
                                phase_locked: false,
                            },
                            Topography::new([0.0, -0.6], 0.5),
                        ),
                    ],
                    coherence: Some((0.2, 1.0)),
                },
            ],
            seed: Some(seed),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> EegResult<()> {
        Recording::validate_sampling_rate(self.sfreq)?;

        if self.channels.is_empty() {
            return Err(EegError::ConfigurationError {
                message: "At least one EEG channel is required".to_string(),
            });
        }
        if self.conditions.is_empty() || self.conditions.iter().all(|c| c.count == 0) {
            return Err(EegError::ConfigurationError {
                message: "At least one condition with trials is required".to_string(),
            });
        }
        if self.conditions.iter().any(|c| c.code <= 0) {
            return Err(EegError::ConfigurationError {
                message: "Trigger codes must be positive".to_string(),
            });
        }
        for condition in &self.conditions {
            if let Some((lo, hi)) = condition.coherence {
                if !(0.0..=hi).contains(&lo) || !hi.is_finite() {
                    return Err(EegError::ConfigurationError {
                        message: format!(
                            "Invalid coherence range ({}, {}) for '{}'",
                            lo, hi, condition.label
                        ),
                    });
                }
            }
        }

        let (isi_min, isi_max) = self.isi;
        if !(isi_min > 0.0 && isi_min <= isi_max && isi_max.is_finite()) {
            return Err(EegError::ConfigurationError {
                message: format!("Invalid ISI range ({}, {})", isi_min, isi_max),
            });
        }
        if self.pulse_samples == 0 || self.pulse_samples as f64 >= isi_min * self.sfreq {
            return Err(EegError::ConfigurationError {
                message: format!(
                    "Trigger pulse of {} samples must be shorter than the minimum ISI",
                    self.pulse_samples
                ),
            });
        }
        if self.padding < 0.0 || !(0.0..=1.0).contains(&self.noise.blink_prob) {
            return Err(EegError::ConfigurationError {
                message: "Padding must be non-negative and blink probability within [0, 1]"
                    .to_string(),
            });
        }
        Ok(())
    }

    pub fn event_id(&self) -> EegResult<EventId> {
        let mut id = EventId::new();
        for condition in &self.conditions {
            id.insert(&condition.label, condition.code)?;
        }
        Ok(id)
    }
}

/// Output of a simulation run
#[derive(Debug, Clone)]
pub struct ErpDataset {
    /// EEG channels, optional EOG, then the stim channel
    pub recording: Recording,
    /// Events in onset order
    pub events: Vec<Event>,
    pub event_id: EventId,
    /// Per-event continuous metadata, aligned with `events`
    pub metadata: BTreeMap<String, Vec<f64>>,
}

/// Event-related EEG simulator
pub struct ErpSimulator {
    config: ErpConfig,
    rng: StdRng,
    normal_dist: Normal<f64>,
}

impl ErpSimulator {
    /// Create new simulator with configuration
    pub fn new(config: ErpConfig) -> EegResult<Self> {
        config.validate()?;

        let seed = config.seed.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0)
        });

        let rng = StdRng::seed_from_u64(seed);
        let normal_dist = Normal::new(0.0, config.noise.gaussian_std).map_err(|e| {
            EegError::ConfigurationError {
                message: format!("Failed to create normal distribution: {}", e),
            }
        })?;

        Ok(ErpSimulator { config, rng, normal_dist })
    }

    pub fn config(&self) -> &ErpConfig {
        &self.config
    }

    /// Generate a full recording with events
    pub fn generate(&mut self) -> EegResult<ErpDataset> {
        let event_id = self.config.event_id()?;
        let montage = Montage::standard_1020();

        let positions = self
            .config
            .channels
            .iter()
            .map(|name| {
                montage
                    .position(name)
                    .ok_or_else(|| EegError::UnknownChannel { name: name.clone() })
            })
            .collect::<EegResult<Vec<_>>>()?;

        // Shuffled trial order
        let mut trials: Vec<usize> = self
            .config
            .conditions
            .iter()
            .enumerate()
            .flat_map(|(idx, c)| std::iter::repeat(idx).take(c.count))
            .collect();
        trials.shuffle(&mut self.rng);

        let sfreq = self.config.sfreq;
        let padding = (self.config.padding * sfreq).round() as usize;
        let (isi_min, isi_max) = self.config.isi;

        let mut onsets = Vec::with_capacity(trials.len());
        let mut cursor = padding.max(1);
        for _ in &trials {
            onsets.push(cursor);
            let isi = self.rng.gen_range(isi_min..=isi_max);
            cursor += (isi * sfreq).round() as usize;
        }
        let n_times = cursor + padding;

        let n_eeg = self.config.channels.len();
        let eog_row = self.config.include_eog.then_some(n_eeg);
        let stim_row = n_eeg + usize::from(self.config.include_eog);
        let mut data = Array2::<f64>::zeros((stim_row + 1, n_times));

        self.add_background(&mut data, stim_row)?;

        let blink_topo = Topography::frontal();
        let mut events = Vec::with_capacity(trials.len());
        let mut coherence = Vec::with_capacity(trials.len());

        for (&cond_idx, &onset) in trials.iter().zip(&onsets) {
            let condition = &self.config.conditions[cond_idx];

            let scale = match condition.coherence {
                Some((lo, hi)) => self.rng.gen_range(lo..=hi),
                None => 1.0,
            };
            let phase = self.rng.gen_range(0.0..2.0 * PI);

            for source in &condition.sources {
                let (start, end) = source.waveform.support();
                let first = (onset as f64 + start * sfreq).floor().max(0.0) as usize;
                let last = ((onset as f64 + end * sfreq).ceil() as usize).min(n_times - 1);

                for t in first..=last {
                    let rel = (t as f64 - onset as f64) / sfreq;
                    let value = scale * source.waveform.value_at(rel, phase);
                    for (ch, &pos) in positions.iter().enumerate() {
                        data[[ch, t]] += source.topography.weight(pos) * value;
                    }
                }
            }

            if self.rng.gen::<f64>() < self.config.noise.blink_prob {
                let delay = self.rng.gen_range(0.0..isi_min);
                let blink = Waveform::Component {
                    latency: delay,
                    width: 0.05,
                    amplitude: self.config.noise.blink_amp,
                };
                let (start, end) = blink.support();
                let first = (onset as f64 + start * sfreq).floor().max(0.0) as usize;
                let last = ((onset as f64 + end * sfreq).ceil() as usize).min(n_times - 1);

                for t in first..=last {
                    let value = blink.value_at((t as f64 - onset as f64) / sfreq, 0.0);
                    if let Some(row) = eog_row {
                        data[[row, t]] += value;
                    }
                    for (ch, &pos) in positions.iter().enumerate() {
                        data[[ch, t]] += blink_topo.weight(pos) * value;
                    }
                }
            }

            let pulse_end = (onset + self.config.pulse_samples).min(n_times);
            for t in onset..pulse_end {
                data[[stim_row, t]] = condition.code as f64;
            }

            events.push(Event::new(onset, condition.code));
            coherence.push(scale);
        }

        let mut channels: Vec<ChannelInfo> =
            self.config.channels.iter().map(|name| ChannelInfo::eeg(name)).collect();
        if self.config.include_eog {
            channels.push(ChannelInfo::new("EOG", ChannelType::Eog));
        }
        channels.push(ChannelInfo::stim(&self.config.stim_channel));

        let mut recording = Recording::new(data, channels, sfreq)?;
        recording.set_montage(&montage);

        info!(
            trials = events.len(),
            samples = n_times,
            channels = recording.channel_count(),
            "simulated event-related recording"
        );

        let mut metadata = BTreeMap::new();
        metadata.insert(COHERENCE.to_string(), coherence);

        Ok(ErpDataset { recording, events, event_id, metadata })
    }

    /// Sensor noise, slow drift and line noise on every non-stim row
    fn add_background(&mut self, data: &mut Array2<f64>, stim_row: usize) -> EegResult<()> {
        let sfreq = self.config.sfreq;
        let drift_amp = self.config.noise.drift_amp;
        let line = self.config.noise.line_noise;

        for row in 0..stim_row {
            let drift_phase = self.rng.gen_range(0.0..2.0 * PI);
            let drift_freq = self.rng.gen_range(0.05..0.2);
            debug!(row, drift_freq, "background noise");

            for t in 0..data.ncols() {
                let time = t as f64 / sfreq;
                let mut value = self.normal_dist.sample(&mut self.rng);
                value += drift_amp * (2.0 * PI * drift_freq * time + drift_phase).sin();
                if let Some((freq, amp)) = line {
                    value += amp * (2.0 * PI * freq * time).sin();
                }
                data[[row, t]] = value;
            }
        }
        Ok(())
    }
}
