//! Representations of epochs for decoding

use crate::epochs::Epochs;
use crate::psd::{welch_rows, PsdConfig};
use eeg_core::{label_matches, EegError, EegResult};
use eeg_decoding::{Dataset, SampleShape};
use ndarray::{s, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Frequency band definition for spectral features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub name: String,
    pub low_freq: f64,
    pub high_freq: f64,
}

impl FrequencyBand {
    pub fn new(name: &str, low_freq: f64, high_freq: f64) -> Self {
        Self { name: name.to_string(), low_freq, high_freq }
    }

    /// Classical EEG bands
    pub fn eeg_bands() -> Vec<FrequencyBand> {
        vec![
            FrequencyBand::new("delta", 1.0, 4.0),
            FrequencyBand::new("theta", 4.0, 8.0),
            FrequencyBand::new("alpha", 8.0, 13.0),
            FrequencyBand::new("beta", 13.0, 30.0),
        ]
    }
}

/// Maps epoch labels to class indices through sorted selection tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new<S: AsRef<str>>(tags: &[S]) -> EegResult<Self> {
        let mut classes: Vec<String> = tags.iter().map(|t| t.as_ref().to_string()).collect();
        classes.sort();
        classes.dedup();
        if classes.len() < 2 {
            return Err(EegError::ConfigurationError {
                message: format!("Need at least 2 distinct class tags, got {:?}", classes),
            });
        }
        Ok(Self { classes })
    }

    /// Encoder over the distinct labels present in `epochs`
    pub fn from_epochs(epochs: &Epochs) -> EegResult<Self> {
        Self::new(&epochs.counts().into_keys().collect::<Vec<_>>())
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Class of a label; `Ok(None)` when no tag matches
    pub fn encode(&self, label: &str) -> EegResult<Option<usize>> {
        let matches: Vec<usize> = self
            .classes
            .iter()
            .enumerate()
            .filter(|(_, tag)| label_matches(label, tag))
            .map(|(i, _)| i)
            .collect();
        match matches.as_slice() {
            [] => Ok(None),
            [class] => Ok(Some(*class)),
            _ => Err(EegError::ConfigurationError {
                message: format!("Label '{}' matches several class tags", label),
            }),
        }
    }

    pub fn decode(&self, class: usize) -> Option<&str> {
        self.classes.get(class).map(String::as_str)
    }
}

fn encoder_for(epochs: &Epochs, label_tags: &[&str]) -> EegResult<LabelEncoder> {
    if label_tags.is_empty() {
        LabelEncoder::from_epochs(epochs)
    } else {
        LabelEncoder::new(label_tags)
    }
}

/// Epoch indices with their classes, skipping epochs no tag selects
fn encoded_epochs(epochs: &Epochs, encoder: &LabelEncoder) -> EegResult<Vec<(usize, usize)>> {
    let mut picked = Vec::new();
    for (i, label) in epochs.labels().iter().enumerate() {
        if let Some(class) = encoder.encode(label)? {
            picked.push((i, class));
        }
    }
    if picked.is_empty() {
        return Err(EegError::EmptyEpochs {
            reason: format!("no epoch matches the tags {:?}", encoder.classes()),
        });
    }
    Ok(picked)
}

/// One row per epoch: channel x time values flattened row-major.
///
/// With no `label_tags`, every distinct epoch label is its own class.
pub fn flatten_epochs(epochs: &Epochs, label_tags: &[&str]) -> EegResult<Dataset> {
    let encoder = encoder_for(epochs, label_tags)?;
    let picked = encoded_epochs(epochs, &encoder)?;
    let (_, n_channels, n_times) = epochs.data().dim();
    let shape = SampleShape::new(n_channels, n_times);

    let mut x = Array2::zeros((picked.len(), shape.n_features()));
    for (row, &(i, _)) in picked.iter().enumerate() {
        let epoch = epochs.data().index_axis(Axis(0), i);
        for (dst, &v) in x.row_mut(row).iter_mut().zip(epoch.iter()) {
            *dst = v;
        }
    }
    let y = picked.iter().map(|&(_, class)| class).collect();
    let groups = picked.iter().map(|&(i, _)| i).collect();

    debug!(samples = picked.len(), features = shape.n_features(), "flattened epochs");
    Dataset::with_groups(x, y, shape, encoder.classes().to_vec(), groups)
}

/// Sliding windows cut inside every epoch.
///
/// Window `w` of an epoch covers samples `w * stride .. w * stride + window_samples`;
/// the dataset groups record the source epoch of each window.
pub fn windowed_dataset(
    epochs: &Epochs,
    window_samples: usize,
    stride: usize,
    label_tags: &[&str],
) -> EegResult<Dataset> {
    let n_times = epochs.n_times();
    if window_samples == 0 || stride == 0 || window_samples > n_times {
        return Err(EegError::ConfigurationError {
            message: format!(
                "Window of {} samples with stride {} does not fit epochs of {} samples",
                window_samples, stride, n_times
            ),
        });
    }

    let encoder = encoder_for(epochs, label_tags)?;
    let picked = encoded_epochs(epochs, &encoder)?;
    let n_channels = epochs.channels().len();
    let shape = SampleShape::new(n_channels, window_samples);
    let starts: Vec<usize> = (0..=n_times - window_samples).step_by(stride).collect();

    let n_rows = picked.len() * starts.len();
    let mut x = Array2::zeros((n_rows, shape.n_features()));
    let mut y = Vec::with_capacity(n_rows);
    let mut groups = Vec::with_capacity(n_rows);

    let mut row = 0;
    for &(i, class) in &picked {
        for &start in &starts {
            let window = epochs.data().slice(s![i, .., start..start + window_samples]);
            for (dst, &v) in x.row_mut(row).iter_mut().zip(window.iter()) {
                *dst = v;
            }
            y.push(class);
            groups.push(i);
            row += 1;
        }
    }

    debug!(windows = n_rows, per_epoch = starts.len(), "cut windowed dataset");
    Dataset::with_groups(x, y, shape, encoder.classes().to_vec(), groups)
}

/// log10 band power per channel and band (Hann periodogram of each epoch)
pub fn band_power_dataset(
    epochs: &Epochs,
    bands: &[FrequencyBand],
    label_tags: &[&str],
) -> EegResult<Dataset> {
    if bands.is_empty() {
        return Err(EegError::MissingParameter { name: "features.bands".to_string() });
    }

    let encoder = encoder_for(epochs, label_tags)?;
    let picked = encoded_epochs(epochs, &encoder)?;
    let n_channels = epochs.channels().len();
    let shape = SampleShape::new(n_channels, bands.len());

    let n_fft = epochs.n_times();
    let psd_config = PsdConfig { fmin: 0.0, fmax: epochs.sfreq() / 2.0, n_fft, n_overlap: 0 };
    let df = epochs.sfreq() / n_fft as f64;

    let mut x = Array2::zeros((picked.len(), shape.n_features()));
    for (row, &(i, _)) in picked.iter().enumerate() {
        let (freqs, psd) = welch_rows(epochs.data().index_axis(Axis(0), i), epochs.sfreq(), &psd_config)?;
        for (b, band) in bands.iter().enumerate() {
            let bins: Vec<usize> = freqs
                .iter()
                .enumerate()
                .filter(|(_, &f)| f >= band.low_freq && f <= band.high_freq)
                .map(|(k, _)| k)
                .collect();
            if bins.is_empty() {
                return Err(EegError::ConfigurationError {
                    message: format!(
                        "Band '{}' ({}-{} Hz) contains no frequency bin at {:.2} Hz resolution",
                        band.name, band.low_freq, band.high_freq, df
                    ),
                });
            }
            for c in 0..n_channels {
                let power: f64 = bins.iter().map(|&k| psd[[c, k]]).sum::<f64>() * df;
                x[[row, c * bands.len() + b]] = power.max(f64::MIN_POSITIVE).log10();
            }
        }
    }

    let y = picked.iter().map(|&(_, class)| class).collect();
    let groups = picked.iter().map(|&(i, _)| i).collect();
    Dataset::with_groups(x, y, shape, encoder.classes().to_vec(), groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eeg_core::{ChannelInfo, EventId};
    use ndarray::Array3;
    use std::f64::consts::PI;

    fn labelled_epochs() -> Epochs {
        let event_id = EventId::from_pairs(&[("Face/A", 1), ("Face/B", 2), ("Scrambled", 3)]).unwrap();
        let labels: Vec<String> = ["Face/A", "Face/B", "Scrambled", "Face/A", "Face/B", "Scrambled"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let data = Array3::from_shape_fn((6, 2, 100), |(e, c, t)| {
            let freq = if e % 3 == 0 { 10.0 } else { 20.0 };
            (c as f64 + 1.0) * (2.0 * PI * freq * t as f64 / 100.0).sin() + e as f64 * 1e-3
        });
        Epochs::from_array(
            data,
            vec![ChannelInfo::eeg("Cz"), ChannelInfo::eeg("Oz")],
            0.0,
            100.0,
            labels,
            event_id,
        )
        .unwrap()
    }

    #[test]
    fn test_label_encoder() {
        let encoder = LabelEncoder::new(&["Face/B", "Face/A"]).unwrap();
        assert_eq!(encoder.classes(), &["Face/A".to_string(), "Face/B".to_string()]);
        assert_eq!(encoder.encode("Face/B").unwrap(), Some(1));
        assert_eq!(encoder.encode("Scrambled").unwrap(), None);
        assert_eq!(encoder.decode(0), Some("Face/A"));

        let ambiguous = LabelEncoder::new(&["Face", "A"]).unwrap();
        assert!(ambiguous.encode("Face/A").is_err());
        assert!(LabelEncoder::new(&["Face"]).is_err());
    }

    #[test]
    fn test_flatten_epochs() {
        let epochs = labelled_epochs();
        let ds = flatten_epochs(&epochs, &["Face/A", "Face/B"]).unwrap();
        assert_eq!(ds.len(), 4);
        assert_eq!(ds.shape(), SampleShape::new(2, 100));
        assert_eq!(ds.y(), &[0, 1, 0, 1]);
        assert_eq!(ds.groups(), &[0, 1, 3, 4]);
        // Row-major channel x time
        assert_eq!(ds.x()[[1, 100 + 7]], epochs.data()[[1, 1, 7]]);

        let all = flatten_epochs(&epochs, &[]).unwrap();
        assert_eq!(all.n_classes(), 3);
        assert_eq!(all.len(), 6);

        assert!(matches!(
            flatten_epochs(&epochs, &["Houses", "Cars"]),
            Err(EegError::EmptyEpochs { .. })
        ));
    }

    #[test]
    fn test_windowed_dataset() {
        let epochs = labelled_epochs();
        let ds = windowed_dataset(&epochs, 40, 20, &["Face", "Scrambled"]).unwrap();
        // starts 0, 20, 40, 60 per epoch
        assert_eq!(ds.len(), 6 * 4);
        assert_eq!(ds.shape(), SampleShape::new(2, 40));
        assert_eq!(ds.groups()[4], 1);
        assert_eq!(ds.x()[[1, 3]], epochs.data()[[0, 0, 23]]);
        assert_eq!(ds.x()[[1, 40 + 3]], epochs.data()[[0, 1, 23]]);
        assert_eq!(ds.class_counts(), vec![16, 8]);

        assert!(windowed_dataset(&epochs, 101, 10, &[]).is_err());
        assert!(windowed_dataset(&epochs, 10, 0, &[]).is_err());
    }

    #[test]
    fn test_band_power_dataset() {
        let epochs = labelled_epochs();
        let bands = vec![FrequencyBand::new("alpha", 8.0, 12.0), FrequencyBand::new("beta", 18.0, 22.0)];
        let ds = band_power_dataset(&epochs, &bands, &[]).unwrap();
        assert_eq!(ds.shape(), SampleShape::new(2, 2));

        // Epoch 0 oscillates at 10 Hz, epoch 1 at 20 Hz
        assert!(ds.x()[[0, 0]] > ds.x()[[0, 1]] + 2.0);
        assert!(ds.x()[[1, 1]] > ds.x()[[1, 0]] + 2.0);
        // Channel 1 has twice the amplitude: +log10(4) in power
        assert!((ds.x()[[0, 2]] - ds.x()[[0, 0]] - 4f64.log10()).abs() < 0.05);

        assert!(band_power_dataset(&epochs, &[], &[]).is_err());
        let narrow = vec![FrequencyBand::new("gap", 10.2, 10.8)];
        assert!(band_power_dataset(&epochs, &narrow, &[]).is_err());
    }
}
