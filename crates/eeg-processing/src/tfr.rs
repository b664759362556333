//! Time-frequency decomposition with Morlet wavelets
//!
//! Power is the trial average of squared wavelet coefficient magnitudes.
//! Inter-trial coherence (ITC) is the magnitude of the trial average of unit
//! phase vectors, so it lies in [0, 1].

use crate::epochs::{resolve_baseline, Baseline, Epochs};
use eeg_core::{ChannelInfo, EegError, EegResult};
use ndarray::{s, Array3, ArrayView1, ArrayView2, Axis};
use num_complex::Complex64;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{debug, info};

/// Number of wavelet cycles per frequency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NCycles {
    /// Same number of cycles at every frequency
    Fixed(f64),
    /// One value per frequency
    PerFrequency(Vec<f64>),
    /// `freq / divisor` cycles, constant temporal width in seconds
    Proportional(f64),
}

impl NCycles {
    pub fn resolve(&self, freqs: &[f64]) -> EegResult<Vec<f64>> {
        let cycles = match self {
            NCycles::Fixed(n) => vec![*n; freqs.len()],
            NCycles::PerFrequency(values) => {
                if values.len() != freqs.len() {
                    return Err(EegError::ConfigurationError {
                        message: format!(
                            "{} cycle values given for {} frequencies",
                            values.len(),
                            freqs.len()
                        ),
                    });
                }
                values.clone()
            }
            NCycles::Proportional(divisor) => freqs.iter().map(|f| f / divisor).collect(),
        };

        if cycles.iter().any(|&c| !(c > 0.0 && c.is_finite())) {
            return Err(EegError::ConfigurationError {
                message: "Number of cycles must be positive".to_string(),
            });
        }
        Ok(cycles)
    }
}

/// Morlet decomposition parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfrConfig {
    /// Frequencies of interest in Hz
    pub freqs: Vec<f64>,
    pub n_cycles: NCycles,
    /// Keep every `decim`-th time sample of the output
    #[serde(default = "default_decim")]
    pub decim: usize,
}

fn default_decim() -> usize {
    1
}

impl TfrConfig {
    pub fn new(freqs: Vec<f64>, n_cycles: NCycles) -> Self {
        Self { freqs, n_cycles, decim: 1 }
    }

    /// Linearly spaced frequencies `start, start + step, ...` below `stop`
    pub fn linspace_freqs(start: f64, stop: f64, step: f64) -> Vec<f64> {
        if !(step > 0.0) {
            return Vec::new();
        }
        let count = ((stop - start) / step).ceil().max(0.0) as usize;
        (0..count).map(|i| start + i as f64 * step).collect()
    }

    pub fn validate(&self, sfreq: f64) -> EegResult<()> {
        if self.freqs.is_empty() {
            return Err(EegError::MissingParameter { name: "tfr.freqs".to_string() });
        }
        let nyquist = sfreq / 2.0;
        if let Some(&bad) = self.freqs.iter().find(|&&f| !(f > 0.0 && f < nyquist)) {
            return Err(EegError::InvalidFilterBand {
                low_hz: bad,
                high_hz: bad,
                nyquist_hz: nyquist,
            });
        }
        if self.decim == 0 {
            return Err(EegError::ConfigurationError {
                message: "Decimation factor must be at least 1".to_string(),
            });
        }
        self.n_cycles.resolve(&self.freqs).map(|_| ())
    }
}

/// Complex Morlet wavelet with unit energy scaled by sqrt(2)
pub fn morlet(sfreq: f64, freq: f64, n_cycles: f64) -> Vec<Complex64> {
    let sigma = n_cycles / (2.0 * PI * freq);
    let half = ((5.0 * sigma * sfreq).ceil() as usize).max(1);
    let len = 2 * half - 1;

    let mut wavelet: Vec<Complex64> = (0..len)
        .map(|i| {
            let t = (i as f64 - (half - 1) as f64) / sfreq;
            let envelope = (-t * t / (2.0 * sigma * sigma)).exp();
            Complex64::from_polar(envelope, 2.0 * PI * freq * t)
        })
        .collect();

    let norm = wavelet.iter().map(|c| c.norm_sqr()).sum::<f64>().sqrt();
    let scale = std::f64::consts::SQRT_2 / norm;
    wavelet.iter_mut().for_each(|c| *c *= scale);
    wavelet
}

/// Baseline normalisation applied to power
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaselineMode {
    /// Subtract the baseline mean
    Mean,
    /// Divide by the baseline mean
    Ratio,
    /// log10 of the ratio to the baseline mean
    LogRatio,
    /// Relative change from the baseline mean
    Percent,
    /// Subtract baseline mean, divide by baseline standard deviation
    ZScore,
    /// log10 ratio divided by the baseline standard deviation of the log10 ratio
    ZLogRatio,
}

/// Which trial-averaged measure to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TfrMeasure {
    Power,
    Itc,
}

/// Trial-averaged time-frequency representation (channel x freq x time)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AverageTfr {
    pub power: Array3<f64>,
    pub itc: Array3<f64>,
    pub freqs: Vec<f64>,
    pub times: Vec<f64>,
    pub channels: Vec<ChannelInfo>,
    pub nave: usize,
    pub comment: String,
    pub baseline_mode: Option<BaselineMode>,
}

/// Morlet power and inter-trial coherence averaged over epochs
pub fn tfr_morlet(epochs: &Epochs, config: &TfrConfig) -> EegResult<AverageTfr> {
    let sfreq = epochs.sfreq();
    config.validate(sfreq)?;
    let n_cycles = config.n_cycles.resolve(&config.freqs)?;

    let wavelets: Vec<Vec<Complex64>> = config
        .freqs
        .iter()
        .zip(&n_cycles)
        .map(|(&f, &c)| morlet(sfreq, f, c))
        .collect();

    let n = epochs.n_times();
    if let Some((freq, w)) = config.freqs.iter().zip(&wavelets).find(|(_, w)| w.len() > n) {
        return Err(EegError::ProcessingError {
            message: format!(
                "Wavelet at {} Hz spans {} samples but epochs have only {}; use fewer cycles or longer epochs",
                freq,
                w.len(),
                n
            ),
        });
    }

    let max_len = wavelets.iter().map(|w| w.len()).max().unwrap_or(1);
    let nfft = (n + max_len - 1).next_power_of_two();
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(nfft);
    let ifft = planner.plan_fft_inverse(nfft);

    let wavelet_spectra: Vec<Vec<Complex64>> = wavelets
        .iter()
        .map(|w| {
            let mut buf = w.clone();
            buf.resize(nfft, Complex64::new(0.0, 0.0));
            fft.process(&mut buf);
            buf
        })
        .collect();

    let out_idx: Vec<usize> = (0..n).step_by(config.decim).collect();
    let n_channels = epochs.channels().len();
    let n_freqs = config.freqs.len();
    let n_epochs = epochs.len();

    let mut power = Array3::<f64>::zeros((n_channels, n_freqs, out_idx.len()));
    let mut phase_sum = Array3::<Complex64>::zeros((n_channels, n_freqs, out_idx.len()));
    let mut signal = vec![Complex64::new(0.0, 0.0); nfft];
    let mut product = vec![Complex64::new(0.0, 0.0); nfft];
    let scale = 1.0 / nfft as f64;

    for epoch in epochs.data().axis_iter(Axis(0)) {
        for (ch, row) in epoch.rows().into_iter().enumerate() {
            signal.iter_mut().for_each(|c| *c = Complex64::new(0.0, 0.0));
            for (dst, &x) in signal.iter_mut().zip(row.iter()) {
                dst.re = x;
            }
            fft.process(&mut signal);

            for (fi, (spectrum, wavelet)) in wavelet_spectra.iter().zip(&wavelets).enumerate() {
                for ((p, &x), &w) in product.iter_mut().zip(&signal).zip(spectrum) {
                    *p = x * w;
                }
                ifft.process(&mut product);

                // "same" alignment with the input
                let start = (wavelet.len() - 1) / 2;
                for (oi, &t) in out_idx.iter().enumerate() {
                    let coef = product[start + t] * scale;
                    power[[ch, fi, oi]] += coef.norm_sqr();
                    let magnitude = coef.norm();
                    if magnitude > 0.0 {
                        phase_sum[[ch, fi, oi]] += coef / magnitude;
                    }
                }
            }
        }
    }

    power.mapv_inplace(|p| p / n_epochs as f64);
    let itc = phase_sum.mapv(|c| (c.norm() / n_epochs as f64).clamp(0.0, 1.0));
    let times = out_idx.iter().map(|&i| epochs.times()[i]).collect();

    let counts = epochs.counts();
    let comment = counts.keys().cloned().collect::<Vec<_>>().join(" + ");

    info!(
        epochs = n_epochs,
        channels = n_channels,
        freqs = n_freqs,
        times = out_idx.len(),
        "computed morlet tfr"
    );

    Ok(AverageTfr {
        power,
        itc,
        freqs: config.freqs.clone(),
        times,
        channels: epochs.channels().to_vec(),
        nave: n_epochs,
        comment,
        baseline_mode: None,
    })
}

/// Baseline mean and spread of one lane, in the units `mode` divides by
fn baseline_stats(base: ArrayView1<'_, f64>, mode: BaselineMode) -> EegResult<(f64, f64)> {
    let mean = base.mean().unwrap_or(0.0);
    let needs_positive = !matches!(mode, BaselineMode::Mean | BaselineMode::ZScore);
    if needs_positive && !(mean > 0.0) {
        return Err(EegError::ProcessingError {
            message: format!("Baseline mean power {} is not positive", mean),
        });
    }

    let std = match mode {
        BaselineMode::ZScore => base.std(0.0),
        BaselineMode::ZLogRatio => base.mapv(|p| (p / mean).log10()).std(0.0),
        _ => return Ok((mean, 1.0)),
    };
    if !(std > 0.0) {
        return Err(EegError::ProcessingError {
            message: "Baseline has zero variance".to_string(),
        });
    }
    Ok((mean, std))
}

impl AverageTfr {
    pub fn channel_index(&self, name: &str) -> EegResult<usize> {
        self.channels
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| EegError::UnknownChannel { name: name.to_string() })
    }

    /// One channel of the chosen measure (freq x time)
    pub fn channel_view(&self, name: &str, measure: TfrMeasure) -> EegResult<ArrayView2<'_, f64>> {
        let idx = self.channel_index(name)?;
        Ok(self.measure(measure).index_axis(Axis(0), idx))
    }

    pub fn measure(&self, measure: TfrMeasure) -> &Array3<f64> {
        match measure {
            TfrMeasure::Power => &self.power,
            TfrMeasure::Itc => &self.itc,
        }
    }

    /// Normalise power by a baseline interval.
    ///
    /// Every lane's baseline is checked before any value is rewritten, so a
    /// failed call leaves the power untouched.
    pub fn apply_baseline(&mut self, baseline: Baseline, mode: BaselineMode) -> EegResult<()> {
        let (b0, b1) = resolve_baseline(baseline, &self.times)?;
        let stats = self
            .power
            .lanes(Axis(2))
            .into_iter()
            .map(|lane| baseline_stats(lane.slice(s![b0..=b1]), mode))
            .collect::<EegResult<Vec<_>>>()?;

        for (mut lane, (mean, std)) in self.power.lanes_mut(Axis(2)).into_iter().zip(stats) {
            match mode {
                BaselineMode::Mean => lane.mapv_inplace(|p| p - mean),
                BaselineMode::Ratio => lane.mapv_inplace(|p| p / mean),
                BaselineMode::LogRatio => lane.mapv_inplace(|p| (p / mean).log10()),
                BaselineMode::Percent => lane.mapv_inplace(|p| (p - mean) / mean),
                BaselineMode::ZScore => lane.mapv_inplace(|p| (p - mean) / std),
                BaselineMode::ZLogRatio => lane.mapv_inplace(|p| (p / mean).log10() / std),
            }
        }

        debug!(?mode, start = self.times[b0], end = self.times[b1], "tfr baseline applied");
        self.baseline_mode = Some(mode);
        Ok(())
    }

    /// Per-channel mean of a measure over a frequency band and time window
    pub fn band_mean(
        &self,
        measure: TfrMeasure,
        fmin: f64,
        fmax: f64,
        tmin: f64,
        tmax: f64,
    ) -> EegResult<Vec<f64>> {
        let freq_idx: Vec<usize> = self
            .freqs
            .iter()
            .enumerate()
            .filter(|(_, &f)| f >= fmin && f <= fmax)
            .map(|(i, _)| i)
            .collect();
        let time_idx: Vec<usize> = self
            .times
            .iter()
            .enumerate()
            .filter(|(_, &t)| t >= tmin - 1e-9 && t <= tmax + 1e-9)
            .map(|(i, _)| i)
            .collect();

        if freq_idx.is_empty() {
            return Err(EegError::ConfigurationError {
                message: format!("No frequencies within [{}, {}] Hz", fmin, fmax),
            });
        }
        if time_idx.is_empty() {
            return Err(EegError::InvalidEpochWindow { tmin, tmax });
        }

        let data = self.measure(measure);
        let count = (freq_idx.len() * time_idx.len()) as f64;
        Ok((0..self.channels.len())
            .map(|ch| {
                freq_idx
                    .iter()
                    .flat_map(|&f| time_idx.iter().map(move |&t| (f, t)))
                    .map(|(f, t)| data[[ch, f, t]])
                    .sum::<f64>()
                    / count
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eeg_core::EventId;

    const SFREQ: f64 = 200.0;

    /// 10 Hz bursts, phase-locked on channel 0 and phase-scrambled on channel 1
    fn burst_epochs(n_epochs: usize) -> Epochs {
        let n_times = 201;
        let tmin = -0.5;
        let golden = PI * (3.0 - 5f64.sqrt());
        let data = Array3::from_shape_fn((n_epochs, 2, n_times), |(e, ch, i)| {
            let t = tmin + i as f64 / SFREQ;
            let phase = if ch == 0 { 0.0 } else { e as f64 * golden };
            let envelope = if t >= 0.0 { 1.0 } else { 0.0 };
            envelope * (2.0 * PI * 10.0 * t + phase).cos()
        });
        let labels = vec!["Face/A".to_string(); n_epochs];
        let id = EventId::from_pairs(&[("Face/A", 1)]).unwrap();
        Epochs::from_array(
            data,
            vec![ChannelInfo::eeg("Cz"), ChannelInfo::eeg("Pz")],
            tmin,
            SFREQ,
            labels,
            id,
        )
        .unwrap()
    }

    #[test]
    fn test_morlet_normalisation() {
        let w = morlet(SFREQ, 10.0, 5.0);
        assert_eq!(w.len() % 2, 1);
        let energy: f64 = w.iter().map(|c| c.norm_sqr()).sum();
        assert!((energy - 2.0).abs() < 1e-9);

        // Centre sample is real and the envelope is symmetric
        let mid = w.len() / 2;
        assert!(w[mid].im.abs() < 1e-12);
        assert!((w[mid - 3].norm() - w[mid + 3].norm()).abs() < 1e-12);
    }

    #[test]
    fn test_itc_bounds_and_phase_locking() {
        let epochs = burst_epochs(30);
        let config = TfrConfig::new(vec![6.0, 10.0, 14.0], NCycles::Proportional(2.0));
        let tfr = tfr_morlet(&epochs, &config).unwrap();

        assert_eq!(tfr.power.dim(), (2, 3, 201));
        assert!(tfr.itc.iter().all(|&v| (0.0..=1.0).contains(&v)));

        // t = 0.25 s, 10 Hz
        let t = 150;
        assert!(tfr.itc[[0, 1, t]] > 0.95);
        assert!(tfr.itc[[1, 1, t]] < 0.3);
        // Power at the burst frequency dominates neighbouring frequencies
        assert!(tfr.power[[0, 1, t]] > tfr.power[[0, 0, t]]);
        assert!(tfr.power[[1, 1, t]] > 0.5 * tfr.power[[0, 1, t]]);
    }

    #[test]
    fn test_decimation() {
        let epochs = burst_epochs(4);
        let mut config = TfrConfig::new(vec![10.0], NCycles::Fixed(3.0));
        config.decim = 4;
        let tfr = tfr_morlet(&epochs, &config).unwrap();
        assert_eq!(tfr.times.len(), 51);
        assert!((tfr.times[1] - tfr.times[0] - 4.0 / SFREQ).abs() < 1e-12);
    }

    #[test]
    fn test_wavelet_longer_than_epoch() {
        let epochs = burst_epochs(2);
        let config = TfrConfig::new(vec![2.0], NCycles::Fixed(7.0));
        assert!(matches!(tfr_morlet(&epochs, &config), Err(EegError::ProcessingError { .. })));

        let config = TfrConfig::new(Vec::new(), NCycles::Fixed(7.0));
        assert!(matches!(tfr_morlet(&epochs, &config), Err(EegError::MissingParameter { .. })));

        let config = TfrConfig::new(vec![10.0], NCycles::PerFrequency(vec![3.0, 4.0]));
        assert!(tfr_morlet(&epochs, &config).is_err());
    }

    #[test]
    fn test_baseline_modes() {
        let epochs = burst_epochs(10);
        let config = TfrConfig::new(vec![10.0], NCycles::Proportional(2.0));
        let tfr = tfr_morlet(&epochs, &config).unwrap();

        let mut ratio = tfr.clone();
        ratio.apply_baseline((Some(-0.4), Some(-0.2)), BaselineMode::Ratio).unwrap();
        let mut logratio = tfr.clone();
        logratio.apply_baseline((Some(-0.4), Some(-0.2)), BaselineMode::LogRatio).unwrap();
        assert_eq!(logratio.baseline_mode, Some(BaselineMode::LogRatio));

        for t in 0..tfr.times.len() {
            let r = ratio.power[[0, 0, t]];
            assert!((logratio.power[[0, 0, t]] - r.log10()).abs() < 1e-9);
        }

        let mut mean = tfr.clone();
        mean.apply_baseline((None, Some(-0.2)), BaselineMode::Mean).unwrap();
        let (b0, b1) = resolve_baseline((None, Some(-0.2)), &mean.times).unwrap();
        let baseline_mean = mean.power.slice(s![0, 0, b0..=b1]).mean().unwrap();
        assert!(baseline_mean.abs() < 1e-9);

        let mut z = tfr.clone();
        z.apply_baseline((Some(-0.4), Some(-0.2)), BaselineMode::ZScore).unwrap();
        assert!(z.power[[0, 0, 150]] > 3.0);
    }

    /// Cz power [1, 3, 2, 4] at one frequency; Pz power given
    fn lane_tfr(pz: [f64; 4]) -> AverageTfr {
        let cz = [1.0, 3.0, 2.0, 4.0];
        let power = Array3::from_shape_fn((2, 1, 4), |(ch, _, t)| if ch == 0 { cz[t] } else { pz[t] });
        AverageTfr {
            power,
            itc: Array3::zeros((2, 1, 4)),
            freqs: vec![10.0],
            times: vec![-0.2, -0.1, 0.0, 0.1],
            channels: vec![ChannelInfo::eeg("Cz"), ChannelInfo::eeg("Pz")],
            nave: 1,
            comment: "Face/A".to_string(),
            baseline_mode: None,
        }
    }

    #[test]
    fn test_baseline_mode_values() {
        // Baseline samples [1, 3]: mean 2, standard deviation 1
        let baseline = (None, Some(-0.1));
        let log_std = (1.5f64.log10() - 0.5f64.log10()) / 2.0;
        let cases: [(BaselineMode, [f64; 4]); 6] = [
            (BaselineMode::Mean, [-1.0, 1.0, 0.0, 2.0]),
            (BaselineMode::Ratio, [0.5, 1.5, 1.0, 2.0]),
            (BaselineMode::LogRatio, [0.5f64.log10(), 1.5f64.log10(), 0.0, 2.0f64.log10()]),
            (BaselineMode::Percent, [-0.5, 0.5, 0.0, 1.0]),
            (BaselineMode::ZScore, [-1.0, 1.0, 0.0, 2.0]),
            (
                BaselineMode::ZLogRatio,
                [
                    0.5f64.log10() / log_std,
                    1.5f64.log10() / log_std,
                    0.0,
                    2.0f64.log10() / log_std,
                ],
            ),
        ];

        for (mode, expected) in cases {
            let mut tfr = lane_tfr([2.0, 4.0, 3.0, 5.0]);
            tfr.apply_baseline(baseline, mode).unwrap();
            assert_eq!(tfr.baseline_mode, Some(mode));
            for (t, &want) in expected.iter().enumerate() {
                let got = tfr.power[[0, 0, t]];
                assert!((got - want).abs() < 1e-12, "{:?} at {}: {} != {}", mode, t, got, want);
            }
        }
    }

    #[test]
    fn test_failed_baseline_leaves_power_untouched() {
        // Zero power on Pz: no positive mean for ratios, no variance for z-scores
        for mode in [
            BaselineMode::Ratio,
            BaselineMode::LogRatio,
            BaselineMode::Percent,
            BaselineMode::ZScore,
            BaselineMode::ZLogRatio,
        ] {
            let mut tfr = lane_tfr([0.0; 4]);
            let before = tfr.power.clone();
            let result = tfr.apply_baseline((None, Some(-0.1)), mode);
            assert!(matches!(result, Err(EegError::ProcessingError { .. })), "{:?}", mode);
            assert_eq!(tfr.power, before);
            assert_eq!(tfr.baseline_mode, None);
        }

        // Constant but positive baseline fails only the z-scores
        let mut tfr = lane_tfr([5.0, 5.0, 6.0, 7.0]);
        let before = tfr.power.clone();
        assert!(tfr.apply_baseline((None, Some(-0.1)), BaselineMode::ZLogRatio).is_err());
        assert_eq!(tfr.power, before);
        tfr.apply_baseline((None, Some(-0.1)), BaselineMode::Ratio).unwrap();
        assert!((tfr.power[[1, 0, 3]] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_band_mean() {
        let epochs = burst_epochs(10);
        let config = TfrConfig::new(vec![8.0, 10.0, 12.0, 20.0], NCycles::Proportional(2.0));
        let tfr = tfr_morlet(&epochs, &config).unwrap();

        let itc = tfr.band_mean(TfrMeasure::Itc, 8.0, 12.0, 0.2, 0.3).unwrap();
        assert_eq!(itc.len(), 2);
        assert!(itc[0] > itc[1]);

        assert!(tfr.band_mean(TfrMeasure::Power, 30.0, 40.0, 0.0, 0.1).is_err());
        assert!(tfr.band_mean(TfrMeasure::Power, 8.0, 12.0, 2.0, 3.0).is_err());

        let view = tfr.channel_view("Pz", TfrMeasure::Power).unwrap();
        assert_eq!(view.dim(), (4, 201));
        assert!(tfr.channel_view("Oz", TfrMeasure::Power).is_err());
    }
}
