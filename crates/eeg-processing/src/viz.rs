//! Renderer-independent figure models

use crate::epochs::Evoked;
use crate::psd::Spectrum;
use crate::tfr::{AverageTfr, TfrMeasure};
use eeg_core::{ChannelInfo, ChannelType, EegError, EegResult};
use eeg_decoding::TrainingHistory;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Scale factor and label used to display amplitudes of a channel type
pub fn display_scale(kind: ChannelType) -> (f64, &'static str) {
    match kind {
        ChannelType::Eeg | ChannelType::Eog | ChannelType::Ecg => (1e6, "µV"),
        ChannelType::Mag => (1e15, "fT"),
        ChannelType::Grad => (1e13, "fT/cm"),
        ChannelType::Stim | ChannelType::Misc => (1.0, "AU"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub label: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// One or more curves sharing axes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineFigure {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<Series>,
    /// Vertical reference lines, e.g. stimulus onset
    #[serde(default)]
    pub markers: Vec<f64>,
}

impl LineFigure {
    /// Butterfly plot of the selected channels, all channels when `channels` is empty
    pub fn evoked(evoked: &Evoked, channels: &[&str]) -> EegResult<Self> {
        let picks: Vec<usize> = if channels.is_empty() {
            (0..evoked.channels.len()).collect()
        } else {
            channels
                .iter()
                .map(|name| evoked.channel_index(name))
                .collect::<EegResult<_>>()?
        };
        let kind = picks.first().map_or(ChannelType::Misc, |&i| evoked.channels[i].kind);
        let (scale, unit) = display_scale(kind);

        let series = picks
            .iter()
            .map(|&i| Series {
                label: evoked.channels[i].name.clone(),
                x: evoked.times.clone(),
                y: evoked.data.row(i).iter().map(|v| v * scale).collect(),
            })
            .collect();

        Ok(Self {
            title: format!("{} (N={})", evoked.comment, evoked.nave),
            x_label: "Time (s)".to_string(),
            y_label: unit.to_string(),
            series,
            markers: vec![0.0],
        })
    }

    /// One curve per condition on a single channel
    pub fn compare_evokeds(evokeds: &[(String, &Evoked)], channel: &str) -> EegResult<Self> {
        let mut series = Vec::with_capacity(evokeds.len());
        let mut unit = "AU";
        for (label, evoked) in evokeds {
            let idx = evoked.channel_index(channel)?;
            let (scale, u) = display_scale(evoked.channels[idx].kind);
            unit = u;
            series.push(Series {
                label: format!("{} (N={})", label, evoked.nave),
                x: evoked.times.clone(),
                y: evoked.data.row(idx).iter().map(|v| v * scale).collect(),
            });
        }
        Ok(Self {
            title: channel.to_string(),
            x_label: "Time (s)".to_string(),
            y_label: unit.to_string(),
            series,
            markers: vec![0.0],
        })
    }

    /// Loss and accuracy curves for training and validation
    pub fn training_curves(history: &TrainingHistory) -> (Self, Self) {
        let epochs: Vec<f64> = history.records.iter().map(|r| r.epoch as f64).collect();
        let series = |label: &str, f: fn(&eeg_decoding::EpochRecord) -> f64| Series {
            label: label.to_string(),
            x: epochs.clone(),
            y: history.records.iter().map(f).collect(),
        };

        let loss = Self {
            title: "Loss".to_string(),
            x_label: "Epoch".to_string(),
            y_label: "Cross-entropy".to_string(),
            series: vec![series("train", |r| r.train_loss), series("valid", |r| r.valid_loss)],
            markers: Vec::new(),
        };
        let accuracy = Self {
            title: "Accuracy".to_string(),
            x_label: "Epoch".to_string(),
            y_label: "Accuracy".to_string(),
            series: vec![series("train", |r| r.train_accuracy), series("valid", |r| r.valid_accuracy)],
            markers: Vec::new(),
        };
        (loss, accuracy)
    }

    /// log10 PSD per channel
    pub fn spectrum(spectrum: &Spectrum) -> Self {
        let series = spectrum
            .channels
            .iter()
            .zip(spectrum.psd.rows())
            .map(|(ch, row)| Series {
                label: ch.name.clone(),
                x: spectrum.freqs.clone(),
                y: row.iter().map(|p| p.max(f64::MIN_POSITIVE).log10()).collect(),
            })
            .collect();
        Self {
            title: "Power spectral density".to_string(),
            x_label: "Frequency (Hz)".to_string(),
            y_label: "log10 PSD".to_string(),
            series,
            markers: Vec::new(),
        }
    }

    /// (min, max) over all finite y values
    pub fn y_range(&self) -> Option<(f64, f64)> {
        finite_range(self.series.iter().flat_map(|s| s.y.iter().copied()))
    }
}

fn finite_range<I: Iterator<Item = f64>>(values: I) -> Option<(f64, f64)> {
    values.filter(|v| v.is_finite()).fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Frequency x time image of one channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatmapFigure {
    pub title: String,
    pub times: Vec<f64>,
    pub freqs: Vec<f64>,
    /// freq x time
    pub values: Array2<f64>,
    pub colorbar_label: String,
}

impl HeatmapFigure {
    pub fn from_tfr(tfr: &AverageTfr, channel: &str, measure: TfrMeasure) -> EegResult<Self> {
        let view = tfr.channel_view(channel, measure)?;
        let colorbar_label = match (measure, tfr.baseline_mode) {
            (TfrMeasure::Itc, _) => "ITC".to_string(),
            (TfrMeasure::Power, Some(mode)) => format!("Power ({:?})", mode),
            (TfrMeasure::Power, None) => "Power".to_string(),
        };
        Ok(Self {
            title: format!("{} {}", tfr.comment, channel),
            times: tfr.times.clone(),
            freqs: tfr.freqs.clone(),
            values: view.to_owned(),
            colorbar_label,
        })
    }

    pub fn value_range(&self) -> Option<(f64, f64)> {
        finite_range(self.values.iter().copied())
    }
}

/// Scalp map of per-channel values on a square grid over the unit head circle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopomapFigure {
    pub title: String,
    pub names: Vec<String>,
    pub positions: Vec<[f64; 2]>,
    pub values: Vec<f64>,
    /// resolution x resolution, rows from y = -1 to y = 1; NaN outside the head
    pub grid: Array2<f64>,
}

impl TopomapFigure {
    /// Interpolate values onto the grid by inverse squared distance weighting.
    ///
    /// Channels without a position are left out of the map.
    pub fn from_values(title: &str, channels: &[ChannelInfo], values: &[f64], resolution: usize) -> EegResult<Self> {
        if channels.len() != values.len() {
            return Err(EegError::InvalidSignalData {
                reason: format!("{} channels but {} values", channels.len(), values.len()),
            });
        }
        if resolution < 2 {
            return Err(EegError::ConfigurationError {
                message: format!("Topomap resolution must be at least 2, got {}", resolution),
            });
        }

        let mut names = Vec::new();
        let mut positions = Vec::new();
        let mut kept = Vec::new();
        for (ch, &value) in channels.iter().zip(values) {
            match ch.position {
                Some(pos) => {
                    names.push(ch.name.clone());
                    positions.push(pos);
                    kept.push(value);
                }
                None => warn!(channel = %ch.name, "no sensor position, left out of topomap"),
            }
        }
        if positions.is_empty() {
            return Err(EegError::ConfigurationError {
                message: "No channel has a sensor position; set a montage first".to_string(),
            });
        }

        let step = 2.0 / (resolution - 1) as f64;
        let grid = Array2::from_shape_fn((resolution, resolution), |(row, col)| {
            let (x, y) = (-1.0 + col as f64 * step, -1.0 + row as f64 * step);
            if x * x + y * y > 1.0 {
                return f64::NAN;
            }
            let mut weight_sum = 0.0;
            let mut value_sum = 0.0;
            for (pos, &value) in positions.iter().zip(&kept) {
                let d2 = (x - pos[0]).powi(2) + (y - pos[1]).powi(2);
                if d2 < 1e-12 {
                    return value;
                }
                weight_sum += 1.0 / d2;
                value_sum += value / d2;
            }
            value_sum / weight_sum
        });

        Ok(Self { title: title.to_string(), names, positions, values: kept, grid })
    }

    pub fn resolution(&self) -> usize {
        self.grid.nrows()
    }

    pub fn value_range(&self) -> Option<(f64, f64)> {
        finite_range(self.values.iter().copied())
    }
}
