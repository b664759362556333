//! Recording: continuous multichannel time series

use crate::channel::{ChannelInfo, ChannelType, Montage};
use crate::error::{EegError, EegResult};
use ndarray::{s, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};
use uuid::Uuid;

/// Continuous recording, data laid out channel x sample
#[derive(Debug, Clone)]
pub struct Recording {
    /// Unique identifier for this recording
    pub id: Uuid,
    /// Sampling rate in Hz
    sfreq: f64,
    /// Channel descriptions, one per data row
    channels: Vec<ChannelInfo>,
    /// Signal data (channel x sample)
    data: Array2<f64>,
    /// Time of the first sample in seconds
    first_time: f64,
}

impl Recording {
    /// Create new recording from channel-major data
    pub fn new(data: Array2<f64>, channels: Vec<ChannelInfo>, sfreq: f64) -> EegResult<Self> {
        Self::validate_sampling_rate(sfreq)?;

        if data.nrows() != channels.len() {
            return Err(EegError::InvalidSignalData {
                reason: format!(
                    "Data has {} rows but {} channels are described",
                    data.nrows(),
                    channels.len()
                ),
            });
        }

        let mut seen = HashSet::new();
        for ch in &channels {
            if !seen.insert(ch.name.as_str()) {
                return Err(EegError::InvalidSignalData {
                    reason: format!("Duplicate channel name '{}'", ch.name),
                });
            }
        }

        if data.iter().any(|v| !v.is_finite()) {
            return Err(EegError::InvalidSignalData {
                reason: "Data contains NaN or infinite samples".to_string(),
            });
        }

        Ok(Recording {
            id: Uuid::new_v4(),
            sfreq,
            channels,
            data,
            first_time: 0.0,
        })
    }

    /// Validate sampling rate for EEG/MEG recordings
    pub fn validate_sampling_rate(rate: f64) -> EegResult<()> {
        const MIN_RATE: f64 = 1.0;
        const MAX_RATE: f64 = 100_000.0;

        if !rate.is_finite() || rate < MIN_RATE || rate > MAX_RATE {
            Err(EegError::InvalidSamplingRate {
                rate,
                valid_range: format!("{}-{}Hz", MIN_RATE, MAX_RATE),
            })
        } else {
            Ok(())
        }
    }

    pub fn sfreq(&self) -> f64 {
        self.sfreq
    }

    pub fn nyquist(&self) -> f64 {
        self.sfreq / 2.0
    }

    pub fn channels(&self) -> &[ChannelInfo] {
        &self.channels
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// Mutable access for in-place processing; the shape must be preserved
    pub fn data_mut(&mut self) -> &mut Array2<f64> {
        &mut self.data
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of samples per channel
    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.n_times() as f64 / self.sfreq
    }

    pub fn first_time(&self) -> f64 {
        self.first_time
    }

    /// Sample times in seconds
    pub fn times(&self) -> Vec<f64> {
        let dt = 1.0 / self.sfreq;
        (0..self.n_times())
            .map(|i| self.first_time + i as f64 * dt)
            .collect()
    }

    /// Index of a channel by name
    pub fn channel_index(&self, name: &str) -> EegResult<usize> {
        self.channels
            .iter()
            .position(|ch| ch.name == name)
            .ok_or_else(|| EegError::UnknownChannel { name: name.to_string() })
    }

    /// Data of one channel
    pub fn channel_data(&self, channel_index: usize) -> EegResult<ArrayView1<'_, f64>> {
        if channel_index >= self.channel_count() {
            return Err(EegError::InvalidSignalData {
                reason: format!(
                    "Channel index {} out of bounds ({} channels)",
                    channel_index,
                    self.channel_count()
                ),
            });
        }
        Ok(self.data.row(channel_index))
    }

    /// Mark channels as bad, excluding them from subsequent analysis.
    ///
    /// All names are checked before any flag changes.
    pub fn mark_bad<S: AsRef<str>>(&mut self, names: &[S]) -> EegResult<()> {
        let indices = names
            .iter()
            .map(|name| self.channel_index(name.as_ref()))
            .collect::<EegResult<Vec<_>>>()?;

        for idx in indices {
            if !self.channels[idx].bad {
                warn!(channel = %self.channels[idx].name, "marking channel as bad");
            }
            self.channels[idx].bad = true;
        }
        Ok(())
    }

    /// Names of channels currently marked bad
    pub fn bad_channels(&self) -> Vec<&str> {
        self.channels
            .iter()
            .filter(|ch| ch.bad)
            .map(|ch| ch.name.as_str())
            .collect()
    }

    /// Indices of data channels that are not marked bad
    pub fn good_data_indices(&self) -> Vec<usize> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, ch)| ch.is_good_data())
            .map(|(i, _)| i)
            .collect()
    }

    /// Indices of data channels (bad ones included)
    pub fn data_indices(&self) -> Vec<usize> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, ch)| ch.kind.is_data())
            .map(|(i, _)| i)
            .collect()
    }

    /// Indices of good channels of the given types
    pub fn pick_types(&self, types: &[ChannelType]) -> Vec<usize> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, ch)| !ch.bad && types.contains(&ch.kind))
            .map(|(i, _)| i)
            .collect()
    }

    /// New recording restricted to the given channel indices
    pub fn pick(&self, indices: &[usize]) -> EegResult<Recording> {
        if let Some(&bad_idx) = indices.iter().find(|&&i| i >= self.channel_count()) {
            return Err(EegError::InvalidSignalData {
                reason: format!("Channel index {} out of bounds", bad_idx),
            });
        }

        let data = self.data.select(ndarray::Axis(0), indices);
        let channels = indices.iter().map(|&i| self.channels[i].clone()).collect();

        Ok(Recording {
            id: Uuid::new_v4(),
            sfreq: self.sfreq,
            channels,
            data,
            first_time: self.first_time,
        })
    }

    /// Assign sensor positions from a montage; returns channels without a position
    pub fn set_montage(&mut self, montage: &Montage) -> Vec<String> {
        let mut missing = Vec::new();
        for ch in &mut self.channels {
            if ch.kind != ChannelType::Eeg {
                continue;
            }
            match montage.position(&ch.name) {
                Some(pos) => ch.position = Some(pos),
                None => missing.push(ch.name.clone()),
            }
        }
        if !missing.is_empty() {
            debug!(?missing, "channels without montage position");
        }
        missing
    }

    /// Calculate basic statistics for a channel
    pub fn channel_stats(&self, channel_index: usize) -> EegResult<ChannelStats> {
        let data = self.channel_data(channel_index)?;
        Ok(ChannelStats::calculate(data.iter().copied()))
    }

    /// Slice the recording to a time range (seconds relative to the first sample)
    pub fn crop(&self, start_time: f64, end_time: f64) -> EegResult<Recording> {
        if start_time < 0.0 || end_time > self.duration() || start_time >= end_time {
            return Err(EegError::InvalidSignalData {
                reason: format!(
                    "Invalid time range [{:.3}, {:.3}]s for recording duration {:.3}s",
                    start_time, end_time, self.duration()
                ),
            });
        }

        let start_sample = (start_time * self.sfreq).round() as usize;
        let end_sample = ((end_time * self.sfreq).round() as usize).min(self.n_times());

        Ok(Recording {
            id: Uuid::new_v4(),
            sfreq: self.sfreq,
            channels: self.channels.clone(),
            data: self.data.slice(s![.., start_sample..end_sample]).to_owned(),
            first_time: self.first_time + start_sample as f64 / self.sfreq,
        })
    }
}

/// Basic statistics for a signal channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: f64,
    pub rms: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub peak_to_peak: f64,
}

impl ChannelStats {
    pub fn calculate<I: IntoIterator<Item = f64>>(data: I) -> Self {
        let mut n = 0usize;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for x in data {
            n += 1;
            sum += x;
            sum_sq += x * x;
            min = min.min(x);
            max = max.max(x);
        }

        if n == 0 {
            return Self {
                mean: 0.0,
                rms: 0.0,
                std_dev: 0.0,
                min: 0.0,
                max: 0.0,
                peak_to_peak: 0.0,
            };
        }

        let mean = sum / n as f64;
        let rms = (sum_sq / n as f64).sqrt();
        let variance = (sum_sq / n as f64 - mean * mean).max(0.0);

        Self {
            mean,
            rms,
            std_dev: variance.sqrt(),
            min,
            max,
            peak_to_peak: max - min,
        }
    }
}

/// Peak-to-peak amplitude of a slice of samples
pub fn peak_to_peak(data: ArrayView1<'_, f64>) -> f64 {
    let (min, max) = data
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if min.is_finite() { max - min } else { 0.0 }
}
