//! Power spectral density estimation (Welch's method)

use crate::epochs::Epochs;
use eeg_core::{ChannelInfo, EegError, EegResult, Recording};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Welch parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsdConfig {
    /// Lowest frequency kept (Hz)
    pub fmin: f64,
    /// Highest frequency kept (Hz)
    pub fmax: f64,
    /// Segment length in samples
    pub n_fft: usize,
    /// Overlap between segments in samples
    pub n_overlap: usize,
}

impl PsdConfig {
    pub fn new(fmin: f64, fmax: f64, n_fft: usize) -> Self {
        Self { fmin, fmax, n_fft, n_overlap: n_fft / 2 }
    }

    pub fn validate(&self, sfreq: f64, n_times: usize) -> EegResult<()> {
        if self.n_fft < 2 || self.n_overlap >= self.n_fft {
            return Err(EegError::ConfigurationError {
                message: format!(
                    "Invalid Welch segments: n_fft={} n_overlap={}",
                    self.n_fft, self.n_overlap
                ),
            });
        }
        if self.n_fft > n_times {
            return Err(EegError::ConfigurationError {
                message: format!(
                    "n_fft ({}) is longer than the signal ({} samples)",
                    self.n_fft, n_times
                ),
            });
        }
        if !(self.fmin >= 0.0 && self.fmin < self.fmax && self.fmin <= sfreq / 2.0) {
            return Err(EegError::InvalidFilterBand {
                low_hz: self.fmin,
                high_hz: self.fmax,
                nyquist_hz: sfreq / 2.0,
            });
        }
        Ok(())
    }
}

/// Spectrum per channel (channel x freq)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spectrum {
    pub freqs: Vec<f64>,
    pub psd: Array2<f64>,
    pub channels: Vec<ChannelInfo>,
}

impl Spectrum {
    /// Integrated power in `[fmin, fmax]` per channel
    pub fn band_power(&self, fmin: f64, fmax: f64) -> EegResult<Vec<f64>> {
        let df = match self.freqs.as_slice() {
            [a, b, ..] => b - a,
            _ => 1.0,
        };
        let idx: Vec<usize> = self
            .freqs
            .iter()
            .enumerate()
            .filter(|(_, &f)| f >= fmin && f <= fmax)
            .map(|(i, _)| i)
            .collect();

        if idx.is_empty() {
            return Err(EegError::ConfigurationError {
                message: format!("No frequencies within [{}, {}] Hz", fmin, fmax),
            });
        }

        Ok(self
            .psd
            .rows()
            .into_iter()
            .map(|row| idx.iter().map(|&i| row[i]).sum::<f64>() * df)
            .collect())
    }

    /// Frequency of the maximum PSD value per channel
    pub fn peak_frequencies(&self) -> Vec<f64> {
        self.psd
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .map(|(i, _)| self.freqs[i])
                    .unwrap_or(0.0)
            })
            .collect()
    }
}

/// Reusable Welch estimator for one segment length
struct Welch {
    plan: std::sync::Arc<dyn realfft::RealToComplex<f64>>,
    window: Vec<f64>,
    step: usize,
    scale: f64,
}

impl Welch {
    fn new(config: &PsdConfig, sfreq: f64) -> Self {
        let n = config.n_fft;
        let mut planner = RealFftPlanner::<f64>::new();
        let plan = planner.plan_fft_forward(n);

        // Periodic Hann window
        let window: Vec<f64> = (0..n)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / n as f64).cos()))
            .collect();
        let window_power: f64 = window.iter().map(|w| w * w).sum();

        Self {
            plan,
            window,
            step: config.n_fft - config.n_overlap,
            scale: 1.0 / (sfreq * window_power),
        }
    }

    /// One-sided density averaged over segments
    fn estimate(&self, signal: ArrayView1<'_, f64>) -> EegResult<Vec<f64>> {
        let n = self.window.len();
        let mut input = self.plan.make_input_vec();
        let mut spectrum = self.plan.make_output_vec();
        let mut acc = vec![0.0; spectrum.len()];
        let mut segments = 0usize;

        let mut start = 0;
        while start + n <= signal.len() {
            let segment = signal.slice(ndarray::s![start..start + n]);
            let mean = segment.mean().unwrap_or(0.0);
            for ((dst, &x), &w) in input.iter_mut().zip(segment.iter()).zip(&self.window) {
                *dst = (x - mean) * w;
            }

            self.plan
                .process(&mut input, &mut spectrum)
                .map_err(|e| EegError::ProcessingError { message: e.to_string() })?;

            for (a, c) in acc.iter_mut().zip(&spectrum) {
                *a += c.norm_sqr();
            }
            segments += 1;
            start += self.step;
        }

        let last = acc.len() - 1;
        Ok(acc
            .iter()
            .enumerate()
            .map(|(k, &p)| {
                // Double every bin except DC and (for even n) Nyquist
                let one_sided = if k == 0 || (n % 2 == 0 && k == last) { 1.0 } else { 2.0 };
                one_sided * p * self.scale / segments.max(1) as f64
            })
            .collect())
    }
}

fn freq_picks(config: &PsdConfig, sfreq: f64) -> (Vec<usize>, Vec<f64>) {
    let df = sfreq / config.n_fft as f64;
    (0..=config.n_fft / 2)
        .map(|k| (k, k as f64 * df))
        .filter(|&(_, f)| f >= config.fmin && f <= config.fmax)
        .unzip()
}

/// Welch PSD of every row, restricted to `[fmin, fmax]`
pub(crate) fn welch_rows(
    data: ArrayView2<'_, f64>,
    sfreq: f64,
    config: &PsdConfig,
) -> EegResult<(Vec<f64>, Array2<f64>)> {
    config.validate(sfreq, data.ncols())?;

    let welch = Welch::new(config, sfreq);
    let (bins, freqs) = freq_picks(config, sfreq);
    let mut psd = Array2::zeros((data.nrows(), bins.len()));
    for (row, signal) in data.rows().into_iter().enumerate() {
        let full = welch.estimate(signal)?;
        for (col, &k) in bins.iter().enumerate() {
            psd[[row, col]] = full[k];
        }
    }
    Ok((freqs, psd))
}

/// Welch PSD of the good data channels of a recording
pub fn welch_psd(recording: &Recording, config: &PsdConfig) -> EegResult<Spectrum> {
    let picks = recording.good_data_indices();
    let data = recording.data().select(Axis(0), &picks);
    let (freqs, psd) = welch_rows(data.view(), recording.sfreq(), config)?;

    debug!(channels = picks.len(), bins = freqs.len(), "computed welch psd");
    Ok(Spectrum {
        freqs,
        psd,
        channels: picks.iter().map(|&i| recording.channels()[i].clone()).collect(),
    })
}

/// Welch PSD of each epoch, averaged over epochs
pub fn welch_psd_epochs(epochs: &Epochs, config: &PsdConfig) -> EegResult<Spectrum> {
    let mut freqs = Vec::new();
    let mut total: Option<Array2<f64>> = None;
    for epoch in epochs.data().axis_iter(Axis(0)) {
        let (f, psd) = welch_rows(epoch, epochs.sfreq(), config)?;
        freqs = f;
        total = Some(match total {
            Some(acc) => acc + &psd,
            None => psd,
        });
    }

    let psd = total.ok_or_else(|| EegError::EmptyEpochs {
        reason: "no epochs to estimate a spectrum from".to_string(),
    })?;
    Ok(Spectrum {
        freqs,
        psd: psd / epochs.len() as f64,
        channels: epochs.channels().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(sfreq: f64, n: usize, freq: f64, amp: f64) -> Recording {
        let data = Array2::from_shape_fn((1, n), |(_, t)| amp * (2.0 * PI * freq * t as f64 / sfreq).sin());
        Recording::new(data, vec![ChannelInfo::eeg("Oz")], sfreq).unwrap()
    }

    #[test]
    fn test_sine_peak_and_power() {
        let sfreq = 256.0;
        let rec = sine(sfreq, 4096, 10.0, 2.0);
        let spectrum = welch_psd(&rec, &PsdConfig::new(1.0, 40.0, 256)).unwrap();

        assert!((spectrum.freqs[0] - 1.0).abs() < 1e-12);
        assert!(spectrum.freqs.iter().all(|&f| (1.0..=40.0).contains(&f)));
        assert!((spectrum.peak_frequencies()[0] - 10.0).abs() < 1e-9);

        // Integrated power of a sine is amp^2 / 2
        let power = spectrum.band_power(7.0, 13.0).unwrap()[0];
        assert!((power - 2.0).abs() < 0.05, "band power {}", power);
        assert!(spectrum.band_power(50.0, 60.0).is_err());
    }

    #[test]
    fn test_invalid_config() {
        let rec = sine(100.0, 100, 10.0, 1.0);
        assert!(welch_psd(&rec, &PsdConfig::new(1.0, 40.0, 256)).is_err());
        let mut config = PsdConfig::new(1.0, 40.0, 64);
        config.n_overlap = 64;
        assert!(welch_psd(&rec, &config).is_err());
        assert!(welch_psd(&rec, &PsdConfig::new(40.0, 1.0, 64)).is_err());
    }

    #[test]
    fn test_epoch_average() {
        use eeg_core::EventId;
        use ndarray::Array3;

        let sfreq = 128.0;
        // Half the epochs carry a 12 Hz rhythm, the rest 20 Hz at double amplitude
        let data = Array3::from_shape_fn((4, 1, 256), |(e, _, t)| {
            let (freq, amp) = if e % 2 == 0 { (12.0, 1.0) } else { (20.0, 2.0) };
            amp * (2.0 * PI * freq * t as f64 / sfreq).sin()
        });
        let id = EventId::from_pairs(&[("A", 1)]).unwrap();
        let epochs = Epochs::from_array(data, vec![ChannelInfo::eeg("Cz")], 0.0, sfreq, vec!["A".to_string(); 4], id)
            .unwrap();

        let spectrum = welch_psd_epochs(&epochs, &PsdConfig::new(2.0, 40.0, 128)).unwrap();
        let low = spectrum.band_power(10.0, 14.0).unwrap()[0];
        let high = spectrum.band_power(18.0, 22.0).unwrap()[0];
        // Averaged: 0.5 * 1/2 and 0.5 * 4/2
        assert!((low - 0.25).abs() < 0.02, "low band {}", low);
        assert!((high - 1.0).abs() < 0.05, "high band {}", high);
    }
}
