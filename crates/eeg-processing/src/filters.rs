//! Digital filters for EEG/MEG preprocessing
//!
//! All filters here are applied forward and backward (zero phase), so the
//! output has the same length as the input and no group delay.

use crate::processor::{ProcessingMetrics, ProcessorConfig, ProcessorType, SignalProcessor};
use eeg_core::{ChannelType, EegError, EegResult, Recording};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{debug, info};

/// Filter types supported by the framework
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterType {
    /// Butterworth lowpass filter
    ButterworthLowpass,
    /// Butterworth highpass filter
    ButterworthHighpass,
    /// Butterworth highpass cascaded with lowpass
    ButterworthBandpass,
    /// Notch filter for powerline interference
    Notch,
}

/// Filter configuration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Filter type
    pub filter_type: FilterType,
    /// Filter order of each Butterworth stage
    pub order: usize,
    /// Highpass edge for highpass/bandpass (Hz)
    pub low_cutoff: Option<f64>,
    /// Lowpass edge for lowpass/bandpass (Hz)
    pub high_cutoff: Option<f64>,
    /// Notch frequency (Hz), typically 50 or 60
    pub notch_freq: Option<f64>,
    /// Notch quality factor
    pub notch_q: Option<f64>,
}

impl FilterConfig {
    /// Create lowpass filter configuration
    pub fn lowpass(cutoff_freq: f64, order: usize) -> Self {
        Self {
            filter_type: FilterType::ButterworthLowpass,
            order,
            low_cutoff: None,
            high_cutoff: Some(cutoff_freq),
            notch_freq: None,
            notch_q: None,
        }
    }

    /// Create highpass filter configuration
    pub fn highpass(cutoff_freq: f64, order: usize) -> Self {
        Self {
            filter_type: FilterType::ButterworthHighpass,
            order,
            low_cutoff: Some(cutoff_freq),
            high_cutoff: None,
            notch_freq: None,
            notch_q: None,
        }
    }

    /// Create bandpass filter configuration
    pub fn bandpass(low_cutoff: f64, high_cutoff: f64, order: usize) -> Self {
        Self {
            filter_type: FilterType::ButterworthBandpass,
            order,
            low_cutoff: Some(low_cutoff),
            high_cutoff: Some(high_cutoff),
            notch_freq: None,
            notch_q: None,
        }
    }

    /// Create notch filter configuration
    pub fn notch(freq: f64, q: f64) -> Self {
        Self {
            filter_type: FilterType::Notch,
            order: 2,
            low_cutoff: None,
            high_cutoff: None,
            notch_freq: Some(freq),
            notch_q: Some(q),
        }
    }

    /// Check cutoffs against the Nyquist frequency of `sfreq`
    pub fn validate(&self, sfreq: f64) -> EegResult<()> {
        let nyquist = sfreq / 2.0;
        let band_error = |low: f64, high: f64| EegError::InvalidFilterBand {
            low_hz: low,
            high_hz: high,
            nyquist_hz: nyquist,
        };

        if self.order == 0 && self.filter_type != FilterType::Notch {
            return Err(EegError::ConfigurationError {
                message: "Filter order must be at least 1".to_string(),
            });
        }

        match self.filter_type {
            FilterType::ButterworthLowpass => {
                let high = self.required(self.high_cutoff, "high_cutoff")?;
                if !(high > 0.0 && high < nyquist) {
                    return Err(band_error(0.0, high));
                }
            }
            FilterType::ButterworthHighpass => {
                let low = self.required(self.low_cutoff, "low_cutoff")?;
                if !(low > 0.0 && low < nyquist) {
                    return Err(band_error(low, nyquist));
                }
            }
            FilterType::ButterworthBandpass => {
                let low = self.required(self.low_cutoff, "low_cutoff")?;
                let high = self.required(self.high_cutoff, "high_cutoff")?;
                if !(low > 0.0 && low < high && high < nyquist) {
                    return Err(band_error(low, high));
                }
            }
            FilterType::Notch => {
                let freq = self.required(self.notch_freq, "notch_freq")?;
                let q = self.required(self.notch_q, "notch_q")?;
                if !(freq > 0.0 && freq < nyquist) {
                    return Err(band_error(freq, freq));
                }
                if q <= 0.0 {
                    return Err(EegError::ConfigurationError {
                        message: format!("Notch quality factor must be positive, got {}", q),
                    });
                }
            }
        }
        Ok(())
    }

    fn required(&self, value: Option<f64>, name: &str) -> EegResult<f64> {
        value.ok_or_else(|| EegError::MissingParameter { name: format!("filter.{}", name) })
    }
}

/// Second-order section in transposed direct form II
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Biquad {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Biquad {
    /// Gain at DC
    pub fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }

    /// Magnitude response at `freq` for sampling rate `sfreq`
    pub fn magnitude(&self, freq: f64, sfreq: f64) -> f64 {
        let w = 2.0 * PI * freq / sfreq;
        let (c1, s1) = (w.cos(), -w.sin());
        let (c2, s2) = ((2.0 * w).cos(), -(2.0 * w).sin());
        let num = (self.b0 + self.b1 * c1 + self.b2 * c2, self.b1 * s1 + self.b2 * s2);
        let den = (1.0 + self.a1 * c1 + self.a2 * c2, self.a1 * s1 + self.a2 * s2);
        ((num.0 * num.0 + num.1 * num.1) / (den.0 * den.0 + den.1 * den.1)).sqrt()
    }

    /// Filter in place, starting from the steady state for the first sample
    fn run(&self, x: &mut [f64]) {
        let Some(&x0) = x.first() else { return };
        let y0 = self.dc_gain() * x0;
        let mut z2 = self.b2 * x0 - self.a2 * y0;
        let mut z1 = (self.b1 + self.b2) * x0 - (self.a1 + self.a2) * y0;

        for sample in x.iter_mut() {
            let input = *sample;
            let output = self.b0 * input + z1;
            z1 = self.b1 * input - self.a1 * output + z2;
            z2 = self.b2 * input - self.a2 * output;
            *sample = output;
        }
    }

    /// Notch (band-stop) section
    pub fn notch(sfreq: f64, freq: f64, q: f64) -> Self {
        let omega = 2.0 * PI * freq / sfreq;
        let cos_omega = omega.cos();
        let alpha = omega.sin() / (2.0 * q);
        let norm = 1.0 / (1.0 + alpha);

        Self {
            b0: norm,
            b1: -2.0 * cos_omega * norm,
            b2: norm,
            a1: -2.0 * cos_omega * norm,
            a2: (1.0 - alpha) * norm,
        }
    }
}

/// Butterworth lowpass of the given order as second-order sections
pub fn butterworth_lowpass(order: usize, cutoff: f64, sfreq: f64) -> Vec<Biquad> {
    butterworth_sections(order, cutoff, sfreq, false)
}

/// Butterworth highpass of the given order as second-order sections
pub fn butterworth_highpass(order: usize, cutoff: f64, sfreq: f64) -> Vec<Biquad> {
    butterworth_sections(order, cutoff, sfreq, true)
}

fn butterworth_sections(order: usize, cutoff: f64, sfreq: f64, highpass: bool) -> Vec<Biquad> {
    // Pre-warped analog cutoff for the bilinear transform
    let k = (PI * cutoff / sfreq).tan();
    let k2 = k * k;
    let mut sections = Vec::with_capacity((order + 1) / 2);

    // Conjugate pole pairs: s^2 + d*s + 1 with d = 2 sin((2i+1) pi / 2N)
    for i in 0..order / 2 {
        let d = 2.0 * ((2 * i + 1) as f64 * PI / (2 * order) as f64).sin();
        let norm = 1.0 / (1.0 + d * k + k2);
        let a1 = 2.0 * (k2 - 1.0) * norm;
        let a2 = (1.0 - d * k + k2) * norm;

        sections.push(if highpass {
            Biquad { b0: norm, b1: -2.0 * norm, b2: norm, a1, a2 }
        } else {
            Biquad { b0: k2 * norm, b1: 2.0 * k2 * norm, b2: k2 * norm, a1, a2 }
        });
    }

    // Real pole for odd orders
    if order % 2 == 1 {
        let norm = 1.0 / (1.0 + k);
        let a1 = (k - 1.0) * norm;
        sections.push(if highpass {
            Biquad { b0: norm, b1: -norm, b2: 0.0, a1, a2: 0.0 }
        } else {
            Biquad { b0: k * norm, b1: k * norm, b2: 0.0, a1, a2: 0.0 }
        });
    }

    sections
}

/// Zero-phase filtering through a cascade of sections.
///
/// The signal is extended at both ends by odd reflection, filtered forward
/// and backward, and trimmed back to its original length.
pub fn filtfilt(sections: &[Biquad], x: &[f64]) -> Vec<f64> {
    let n = x.len();
    if n < 2 || sections.is_empty() {
        return x.to_vec();
    }

    let pad = (3 * (2 * sections.len() + 1)).min(n - 1);
    let mut ext = Vec::with_capacity(n + 2 * pad);
    ext.extend((1..=pad).rev().map(|i| 2.0 * x[0] - x[i]));
    ext.extend_from_slice(x);
    ext.extend((1..=pad).map(|i| 2.0 * x[n - 1] - x[n - 1 - i]));

    for section in sections {
        section.run(&mut ext);
    }
    ext.reverse();
    for section in sections {
        section.run(&mut ext);
    }
    ext.reverse();

    ext[pad..pad + n].to_vec()
}

/// Apply zero-phase sections to every data channel of a recording
fn filter_data_channels(sections: &[Biquad], input: &Recording) -> Recording {
    let mut output = input.clone();
    let rows = input.data_indices();
    for &row in &rows {
        let source = input.data().row(row).to_vec();
        let filtered = filtfilt(sections, &source);
        output
            .data_mut()
            .row_mut(row)
            .iter_mut()
            .zip(filtered)
            .for_each(|(dst, v)| *dst = v);
    }
    output
}

/// Zero-phase Butterworth filter (lowpass, highpass or bandpass)
pub struct ButterworthFilter {
    config: ProcessorConfig,
    filter_config: FilterConfig,
    sections: Vec<Biquad>,
    sfreq: f64,
}

impl ButterworthFilter {
    pub fn new(filter_config: FilterConfig) -> EegResult<Self> {
        if filter_config.filter_type == FilterType::Notch {
            return Err(EegError::ConfigurationError {
                message: "Use NotchFilter for notch configurations".to_string(),
            });
        }

        let mut config = ProcessorConfig::new("butterworth", ProcessorType::Filter);
        config.set_parameter("order", filter_config.order.into());
        if let Some(low) = filter_config.low_cutoff {
            config.set_parameter("low_cutoff", low.into());
        }
        if let Some(high) = filter_config.high_cutoff {
            config.set_parameter("high_cutoff", high.into());
        }

        Ok(ButterworthFilter {
            config,
            filter_config,
            sections: Vec::new(),
            sfreq: 0.0,
        })
    }

    /// Design sections for the given sampling rate
    pub fn design(filter_config: &FilterConfig, sfreq: f64) -> EegResult<Vec<Biquad>> {
        filter_config.validate(sfreq)?;
        let order = filter_config.order;

        let sections = match filter_config.filter_type {
            FilterType::ButterworthLowpass => {
                butterworth_lowpass(order, filter_config.high_cutoff.unwrap_or_default(), sfreq)
            }
            FilterType::ButterworthHighpass => {
                butterworth_highpass(order, filter_config.low_cutoff.unwrap_or_default(), sfreq)
            }
            FilterType::ButterworthBandpass => {
                let mut sections =
                    butterworth_highpass(order, filter_config.low_cutoff.unwrap_or_default(), sfreq);
                sections.extend(butterworth_lowpass(
                    order,
                    filter_config.high_cutoff.unwrap_or_default(),
                    sfreq,
                ));
                sections
            }
            FilterType::Notch => {
                return Err(EegError::ConfigurationError {
                    message: "Unsupported filter type for Butterworth filter".to_string(),
                })
            }
        };
        Ok(sections)
    }

    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    pub fn filter_config(&self) -> &FilterConfig {
        &self.filter_config
    }
}

impl SignalProcessor for ButterworthFilter {
    fn process(&mut self, input: &Recording) -> EegResult<Recording> {
        let timer = ProcessingMetrics::start_timing("butterworth");

        if self.sections.is_empty() || self.sfreq != input.sfreq() {
            self.sections = Self::design(&self.filter_config, input.sfreq())?;
            self.sfreq = input.sfreq();
        }

        let output = filter_data_channels(&self.sections, input);
        let metrics = timer.finish();

        debug!(
            low = ?self.filter_config.low_cutoff,
            high = ?self.filter_config.high_cutoff,
            order = self.filter_config.order,
            sections = self.sections.len(),
            elapsed_us = metrics.processing_time_us,
            "applied butterworth filter"
        );
        Ok(output)
    }

    fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    fn name(&self) -> &str {
        "Butterworth Filter"
    }

    fn reset(&mut self) {
        self.sections.clear();
    }
}

/// Zero-phase notch filter for line noise
pub struct NotchFilter {
    config: ProcessorConfig,
    filter_config: FilterConfig,
    section: Option<Biquad>,
    sfreq: f64,
}

impl NotchFilter {
    /// Create new notch filter
    pub fn new(notch_freq: f64, q_factor: f64) -> Self {
        let mut config = ProcessorConfig::new("notch", ProcessorType::Filter);
        config.set_parameter("notch_freq", notch_freq.into());
        config.set_parameter("q_factor", q_factor.into());

        NotchFilter {
            config,
            filter_config: FilterConfig::notch(notch_freq, q_factor),
            section: None,
            sfreq: 0.0,
        }
    }
}

impl SignalProcessor for NotchFilter {
    fn process(&mut self, input: &Recording) -> EegResult<Recording> {
        let section = match self.section {
            Some(section) if self.sfreq == input.sfreq() => section,
            _ => {
                self.filter_config.validate(input.sfreq())?;
                let section = Biquad::notch(
                    input.sfreq(),
                    self.filter_config.notch_freq.unwrap_or_default(),
                    self.filter_config.notch_q.unwrap_or_default(),
                );
                self.section = Some(section);
                self.sfreq = input.sfreq();
                section
            }
        };

        debug!(freq = ?self.filter_config.notch_freq, "applied notch filter");
        Ok(filter_data_channels(&[section], input))
    }

    fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    fn name(&self) -> &str {
        "Notch Filter"
    }

    fn reset(&mut self) {
        self.section = None;
    }
}

/// Re-reference good EEG channels to their common average
pub struct AverageReference {
    config: ProcessorConfig,
}

impl AverageReference {
    pub fn new() -> Self {
        Self {
            config: ProcessorConfig::new("average_reference", ProcessorType::Reference),
        }
    }
}

impl Default for AverageReference {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalProcessor for AverageReference {
    fn process(&mut self, input: &Recording) -> EegResult<Recording> {
        let rows = input.pick_types(&[ChannelType::Eeg]);
        if rows.is_empty() {
            return Err(EegError::ProcessingError {
                message: "Average reference requires at least one good EEG channel".to_string(),
            });
        }

        let mut output = input.clone();
        let data = output.data_mut();
        for t in 0..input.n_times() {
            let mean = rows.iter().map(|&r| data[[r, t]]).sum::<f64>() / rows.len() as f64;
            for &r in &rows {
                data[[r, t]] -= mean;
            }
        }

        debug!(channels = rows.len(), "applied average reference");
        Ok(output)
    }

    fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    fn name(&self) -> &str {
        "Average Reference"
    }
}

/// Ordered chain of processors
pub struct FilterBank {
    config: ProcessorConfig,
    filters: Vec<Box<dyn SignalProcessor>>,
}

impl FilterBank {
    /// Create new filter bank
    pub fn new() -> Self {
        FilterBank {
            config: ProcessorConfig::new("filter_bank", ProcessorType::Chain),
            filters: Vec::new(),
        }
    }

    /// Add a filter to the bank
    pub fn add_filter(&mut self, filter: Box<dyn SignalProcessor>) {
        self.filters.push(filter);
    }

    /// Typical ERP preprocessing: optional notch, then a bandpass
    pub fn erp_preprocessing(low: f64, high: f64, notch: Option<f64>) -> EegResult<Self> {
        let mut bank = FilterBank::new();

        if let Some(freq) = notch {
            bank.add_filter(Box::new(NotchFilter::new(freq, 30.0)));
        }

        let bandpass = ButterworthFilter::new(FilterConfig::bandpass(low, high, 4))?;
        bank.add_filter(Box::new(bandpass));

        Ok(bank)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Configuration of every stage, in application order
    pub fn stages(&self) -> Vec<ProcessorConfig> {
        self.filters.iter().map(|f| f.config().clone()).collect()
    }
}

impl Default for FilterBank {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalProcessor for FilterBank {
    fn process(&mut self, input: &Recording) -> EegResult<Recording> {
        let timer = ProcessingMetrics::start_timing("filter_bank");
        let mut current = input.clone();

        // Apply filters sequentially
        for filter in &mut self.filters {
            if filter.config().enabled {
                current = filter.process(&current)?;
            }
        }

        let metrics = timer.finish();
        info!(
            stages = self.filters.len(),
            channels = current.channel_count(),
            elapsed_us = metrics.processing_time_us,
            "preprocessing complete"
        );
        Ok(current)
    }

    fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    fn name(&self) -> &str {
        "Filter Bank"
    }

    fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eeg_core::ChannelInfo;
    use ndarray::Array2;

    fn sine_recording(sfreq: f64, n: usize, freqs: &[(f64, f64)]) -> Recording {
        let mut data = Array2::zeros((2, n));
        for t in 0..n {
            let time = t as f64 / sfreq;
            data[[0, t]] = freqs
                .iter()
                .map(|&(f, a)| a * (2.0 * PI * f * time).sin())
                .sum::<f64>();
            data[[1, t]] = if t == 10 { 5.0 } else { 0.0 };
        }
        Recording::new(data, vec![ChannelInfo::eeg("Cz"), ChannelInfo::stim("STI")], sfreq).unwrap()
    }

    fn rms(x: &[f64]) -> f64 {
        (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
    }

    #[test]
    fn test_butterworth_response() {
        let sfreq = 250.0;
        let lp = butterworth_lowpass(4, 30.0, sfreq);
        assert_eq!(lp.len(), 2);
        let gain = |f: f64| lp.iter().map(|s| s.magnitude(f, sfreq)).product::<f64>();
        assert!((gain(0.0) - 1.0).abs() < 1e-9);
        assert!((gain(30.0) - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!(gain(80.0) < 0.01);

        let hp = butterworth_highpass(3, 1.0, sfreq);
        assert_eq!(hp.len(), 2);
        let gain = |f: f64| hp.iter().map(|s| s.magnitude(f, sfreq)).product::<f64>();
        assert!(gain(0.0) < 1e-9);
        assert!((gain(1.0) - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!((gain(40.0) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_filtfilt_constant_and_length() {
        let lp = butterworth_lowpass(4, 20.0, 200.0);
        let x = vec![3.0; 100];
        let y = filtfilt(&lp, &x);
        assert_eq!(y.len(), x.len());
        assert!(y.iter().all(|v| (v - 3.0).abs() < 1e-9));

        let short = filtfilt(&lp, &[1.0]);
        assert_eq!(short, vec![1.0]);
    }

    #[test]
    fn test_bandpass_preserves_shape_and_attenuates() {
        let sfreq = 250.0;
        let input = sine_recording(sfreq, 5000, &[(10.0, 1.0), (0.1, 2.0), (60.0, 1.0)]);
        let mut filter = ButterworthFilter::new(FilterConfig::bandpass(1.0, 30.0, 4)).unwrap();
        let output = filter.process(&input).unwrap();

        assert_eq!(output.channel_count(), input.channel_count());
        assert_eq!(output.n_times(), input.n_times());

        // Stim channel untouched
        assert_eq!(output.data().row(1), input.data().row(1));

        // Middle of the record: only the 10 Hz component should remain
        let sig = output.data().row(0).to_vec();
        let middle = &sig[1250..3750];
        let expected: Vec<f64> = (1250..3750)
            .map(|t| (2.0 * PI * 10.0 * t as f64 / sfreq).sin())
            .collect();
        let err: Vec<f64> = middle.iter().zip(&expected).map(|(a, b)| a - b).collect();
        assert!(rms(&err) < 0.05, "residual rms {}", rms(&err));
    }

    #[test]
    fn test_invalid_bands() {
        let input = sine_recording(150.0, 300, &[(10.0, 1.0)]);

        let mut filter = ButterworthFilter::new(FilterConfig::bandpass(30.0, 1.0, 4)).unwrap();
        let err = filter.process(&input).err().unwrap();
        assert_eq!(
            err,
            EegError::InvalidFilterBand { low_hz: 30.0, high_hz: 1.0, nyquist_hz: 75.0 }
        );

        let mut filter = ButterworthFilter::new(FilterConfig::lowpass(80.0, 4)).unwrap();
        assert!(matches!(filter.process(&input), Err(EegError::InvalidFilterBand { .. })));

        let mut filter = ButterworthFilter::new(FilterConfig::highpass(0.0, 4)).unwrap();
        assert!(filter.process(&input).is_err());

        let mut filter = ButterworthFilter::new(FilterConfig::bandpass(1.0, 30.0, 0)).unwrap();
        assert!(matches!(filter.process(&input), Err(EegError::ConfigurationError { .. })));

        assert!(ButterworthFilter::new(FilterConfig::notch(50.0, 30.0)).is_err());
    }

    #[test]
    fn test_notch_filter() {
        let sfreq = 500.0;
        let input = sine_recording(sfreq, 5000, &[(10.0, 1.0), (50.0, 0.5)]);
        let mut filter = NotchFilter::new(50.0, 30.0);
        let output = filter.process(&input).unwrap();

        let sig = output.data().row(0).to_vec();
        let expected: Vec<f64> = (1000..4000)
            .map(|t| (2.0 * PI * 10.0 * t as f64 / sfreq).sin())
            .collect();
        let err: Vec<f64> = sig[1000..4000].iter().zip(&expected).map(|(a, b)| a - b).collect();
        assert!(rms(&err) < 0.05);

        let mut bad = NotchFilter::new(300.0, 30.0);
        assert!(bad.process(&input).is_err());
    }

    #[test]
    fn test_average_reference() {
        let data = Array2::from_shape_vec((3, 2), vec![1.0, 2.0, 3.0, 4.0, 100.0, 100.0]).unwrap();
        let mut channels = vec![ChannelInfo::eeg("A"), ChannelInfo::eeg("B"), ChannelInfo::eeg("C")];
        channels[2].bad = true;
        let input = Recording::new(data, channels, 100.0).unwrap();

        let output = AverageReference::new().process(&input).unwrap();
        assert_eq!(output.data()[[0, 0]], -1.0);
        assert_eq!(output.data()[[1, 0]], 1.0);
        // Bad channel neither contributes nor is changed
        assert_eq!(output.data()[[2, 0]], 100.0);
    }

    #[test]
    fn test_filter_bank() {
        let input = sine_recording(250.0, 1000, &[(10.0, 1.0)]);
        let mut bank = FilterBank::erp_preprocessing(1.0, 30.0, Some(50.0)).unwrap();
        assert_eq!(bank.len(), 2);
        assert_eq!(bank.names(), vec!["Notch Filter", "Butterworth Filter"]);

        let output = bank.process(&input).unwrap();
        assert_eq!(output.n_times(), 1000);
        assert_eq!(output.channel_count(), 2);
    }
}
