//! Epoching: fixed windows around events, rejection and averaging

use eeg_core::{
    label_matches, peak_to_peak, ChannelInfo, ChannelType, EegError, EegResult, Event, EventId,
    Recording,
};
use ndarray::{s, Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Baseline interval; `None` on either side means the epoch edge
pub type Baseline = (Option<f64>, Option<f64>);

/// Epoching parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochsConfig {
    /// Window start relative to the event, seconds
    pub tmin: f64,
    /// Window end relative to the event (inclusive), seconds
    pub tmax: f64,
    /// Baseline correction interval
    #[serde(default)]
    pub baseline: Option<Baseline>,
    /// Maximum peak-to-peak amplitude per channel type
    #[serde(default)]
    pub reject: BTreeMap<ChannelType, f64>,
    /// Minimum peak-to-peak amplitude per channel type
    #[serde(default)]
    pub flat: BTreeMap<ChannelType, f64>,
    /// Conditions to epoch
    pub event_id: EventId,
}

impl EpochsConfig {
    pub fn new(tmin: f64, tmax: f64, event_id: EventId) -> Self {
        Self {
            tmin,
            tmax,
            baseline: Some((None, Some(0.0))),
            reject: BTreeMap::new(),
            flat: BTreeMap::new(),
            event_id,
        }
    }

    pub fn with_reject(mut self, kind: ChannelType, threshold: f64) -> Self {
        self.reject.insert(kind, threshold);
        self
    }

    pub fn with_flat(mut self, kind: ChannelType, threshold: f64) -> Self {
        self.flat.insert(kind, threshold);
        self
    }

    pub fn with_baseline(mut self, baseline: Option<Baseline>) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn validate(&self) -> EegResult<()> {
        if !(self.tmin.is_finite() && self.tmax.is_finite() && self.tmin < self.tmax) {
            return Err(EegError::InvalidEpochWindow { tmin: self.tmin, tmax: self.tmax });
        }
        if self.event_id.is_empty() {
            return Err(EegError::MissingParameter { name: "epochs.event_id".to_string() });
        }
        self.event_id.validate()?;
        if let Some((start, end)) = self.baseline {
            let start = start.unwrap_or(self.tmin);
            let end = end.unwrap_or(self.tmax);
            if start > end || start < self.tmin - 1e-9 || end > self.tmax + 1e-9 {
                return Err(EegError::ConfigurationError {
                    message: format!(
                        "Baseline ({}, {}) must lie within the epoch window ({}, {})",
                        start, end, self.tmin, self.tmax
                    ),
                });
            }
        }
        for (kind, &threshold) in self.reject.iter().chain(self.flat.iter()) {
            if !(threshold > 0.0) {
                return Err(EegError::ConfigurationError {
                    message: format!("Threshold for {:?} channels must be positive", kind),
                });
            }
        }
        Ok(())
    }
}

/// Why an event did not become an epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DropReason {
    /// Window extends past the recording
    NoData,
    /// Peak-to-peak above the reject threshold on these channels
    Rejected { channels: Vec<String> },
    /// Peak-to-peak below the flat threshold on these channels
    Flat { channels: Vec<String> },
    /// Removed to balance condition counts
    Equalized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropRecord {
    /// Index of the event in the list passed to epoching
    pub event_index: usize,
    pub event: Event,
    pub label: String,
    pub reason: DropReason,
}

/// Summary of the drop log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropLogSummary {
    /// Events eligible for epoching (code in the event id)
    pub total: usize,
    pub retained: usize,
    pub no_data: usize,
    pub rejected: usize,
    pub flat: usize,
    pub equalized: usize,
    /// How often each channel caused a rejection
    pub by_channel: BTreeMap<String, usize>,
}

impl DropLogSummary {
    /// Percentage of eligible events that were dropped
    pub fn drop_percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 * (self.total - self.retained) as f64 / self.total as f64
        }
    }
}

/// Collection of equally shaped epochs (epoch x channel x time)
#[derive(Debug, Clone)]
pub struct Epochs {
    data: Array3<f64>,
    channels: Vec<ChannelInfo>,
    times: Vec<f64>,
    sfreq: f64,
    events: Vec<Event>,
    labels: Vec<String>,
    /// Index of each epoch's event in the list passed to epoching
    selection: Vec<usize>,
    event_id: EventId,
    metadata: BTreeMap<String, Vec<f64>>,
    drop_log: Vec<DropRecord>,
    n_eligible: usize,
    baseline: Option<(f64, f64)>,
}

impl Epochs {
    /// Cut epochs from a continuous recording.
    ///
    /// Only events whose code appears in `config.event_id` are considered.
    /// Only good data channels are kept.
    pub fn from_recording(
        recording: &Recording,
        events: &[Event],
        config: &EpochsConfig,
    ) -> EegResult<Self> {
        config.validate()?;

        let picks = recording.good_data_indices();
        if picks.is_empty() {
            return Err(EegError::InvalidSignalData {
                reason: "Recording has no good data channels".to_string(),
            });
        }
        let channels: Vec<ChannelInfo> =
            picks.iter().map(|&i| recording.channels()[i].clone()).collect();

        let sfreq = recording.sfreq();
        let start_offset = (config.tmin * sfreq).round() as i64;
        let n_times = ((config.tmax - config.tmin) * sfreq).round() as usize + 1;
        let times: Vec<f64> = (0..n_times)
            .map(|i| (start_offset + i as i64) as f64 / sfreq)
            .collect();

        let baseline = config
            .baseline
            .map(|b| resolve_baseline(b, &times))
            .transpose()?;

        let mut kept: Vec<f64> = Vec::new();
        let mut kept_events = Vec::new();
        let mut labels = Vec::new();
        let mut selection = Vec::new();
        let mut drop_log = Vec::new();
        let mut n_eligible = 0;

        for (event_index, event) in events.iter().enumerate() {
            let Some(label) = config.event_id.label(event.code) else {
                continue;
            };
            n_eligible += 1;

            let record = |reason| DropRecord {
                event_index,
                event: *event,
                label: label.to_string(),
                reason,
            };

            let start = event.sample as i64 + start_offset;
            if start < 0 || start as usize + n_times > recording.n_times() {
                debug!(sample = event.sample, label, "epoch window outside recording");
                drop_log.push(record(DropReason::NoData));
                continue;
            }
            let start = start as usize;

            let mut window = recording
                .data()
                .slice(s![.., start..start + n_times])
                .select(Axis(0), &picks);
            if let Some((b0, b1)) = baseline {
                subtract_baseline(&mut window, b0, b1);
            }

            let (rejected, flat) = check_thresholds(window.view(), &channels, config);
            if !rejected.is_empty() {
                debug!(sample = event.sample, label, ?rejected, "epoch rejected");
                drop_log.push(record(DropReason::Rejected { channels: rejected }));
                continue;
            }
            if !flat.is_empty() {
                debug!(sample = event.sample, label, ?flat, "epoch flat");
                drop_log.push(record(DropReason::Flat { channels: flat }));
                continue;
            }

            kept.extend(window.iter());
            kept_events.push(*event);
            labels.push(label.to_string());
            selection.push(event_index);
        }

        if labels.is_empty() {
            return Err(EegError::EmptyEpochs {
                reason: format!("all {} eligible events were dropped", n_eligible),
            });
        }

        let data = Array3::from_shape_vec((labels.len(), channels.len(), n_times), kept)
            .map_err(|e| EegError::ProcessingError { message: e.to_string() })?;

        if !drop_log.is_empty() {
            warn!(
                dropped = drop_log.len(),
                eligible = n_eligible,
                "dropped {} of {} epochs",
                drop_log.len(),
                n_eligible
            );
        }
        info!(
            epochs = labels.len(),
            channels = channels.len(),
            samples = n_times,
            "created epochs"
        );

        Ok(Epochs {
            data,
            channels,
            sfreq,
            events: kept_events,
            labels,
            selection,
            event_id: config.event_id.clone(),
            metadata: BTreeMap::new(),
            drop_log,
            n_eligible,
            baseline: baseline.map(|(b0, b1)| (times[b0], times[b1])),
            times,
        })
    }

    /// Build epochs directly from data, e.g. loaded from another tool
    pub fn from_array(
        data: Array3<f64>,
        channels: Vec<ChannelInfo>,
        tmin: f64,
        sfreq: f64,
        labels: Vec<String>,
        event_id: EventId,
    ) -> EegResult<Self> {
        Recording::validate_sampling_rate(sfreq)?;
        let (n_epochs, n_channels, n_times) = data.dim();
        if n_channels != channels.len() || n_epochs != labels.len() {
            return Err(EegError::InvalidSignalData {
                reason: format!(
                    "Data shape {:?} does not match {} channels and {} labels",
                    data.dim(),
                    channels.len(),
                    labels.len()
                ),
            });
        }
        if n_epochs == 0 {
            return Err(EegError::EmptyEpochs { reason: "no epochs supplied".to_string() });
        }
        if let Some(unknown) = labels.iter().find(|l| event_id.code(l).is_none()) {
            return Err(EegError::ConfigurationError {
                message: format!("Label '{}' missing from event id", unknown),
            });
        }

        let start_offset = (tmin * sfreq).round() as i64;
        let times = (0..n_times).map(|i| (start_offset + i as i64) as f64 / sfreq).collect();
        let events = labels
            .iter()
            .enumerate()
            .map(|(i, l)| Event::new(i, event_id.code(l).unwrap_or_default()))
            .collect();

        Ok(Epochs {
            data,
            channels,
            times,
            sfreq,
            events,
            selection: (0..n_epochs).collect(),
            labels,
            event_id,
            metadata: BTreeMap::new(),
            drop_log: Vec::new(),
            n_eligible: n_epochs,
            baseline: None,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    /// One epoch (channel x time)
    pub fn epoch(&self, index: usize) -> Option<ArrayView2<'_, f64>> {
        (index < self.len()).then(|| self.data.index_axis(Axis(0), index))
    }

    pub fn channels(&self) -> &[ChannelInfo] {
        &self.channels
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn channel_index(&self, name: &str) -> EegResult<usize> {
        self.channels
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| EegError::UnknownChannel { name: name.to_string() })
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn n_times(&self) -> usize {
        self.times.len()
    }

    pub fn sfreq(&self) -> f64 {
        self.sfreq
    }

    pub fn tmin(&self) -> f64 {
        self.times.first().copied().unwrap_or(0.0)
    }

    pub fn tmax(&self) -> f64 {
        self.times.last().copied().unwrap_or(0.0)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn selection(&self) -> &[usize] {
        &self.selection
    }

    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }

    pub fn baseline(&self) -> Option<(f64, f64)> {
        self.baseline
    }

    pub fn drop_log(&self) -> &[DropRecord] {
        &self.drop_log
    }

    pub fn metadata(&self, name: &str) -> Option<&[f64]> {
        self.metadata.get(name).map(|v| v.as_slice())
    }

    pub fn metadata_names(&self) -> impl Iterator<Item = &str> {
        self.metadata.keys().map(|k| k.as_str())
    }

    /// Number of epochs per label
    pub fn counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(label.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Epochs whose label matches `tag` (see [`label_matches`])
    pub fn select(&self, tag: &str) -> EegResult<Epochs> {
        let indices: Vec<usize> = self
            .labels
            .iter()
            .enumerate()
            .filter(|(_, label)| label_matches(label, tag))
            .map(|(i, _)| i)
            .collect();

        if indices.is_empty() {
            return Err(EegError::EmptyEpochs {
                reason: format!("no epochs match '{}'", tag),
            });
        }
        Ok(self.subset(&indices))
    }

    /// Attach a metadata column aligned with the current epochs
    pub fn set_metadata(&mut self, name: &str, values: Vec<f64>) -> EegResult<()> {
        if values.len() != self.len() {
            return Err(EegError::InvalidSignalData {
                reason: format!("{} metadata values for {} epochs", values.len(), self.len()),
            });
        }
        self.metadata.insert(name.to_string(), values);
        Ok(())
    }

    /// Attach a metadata column aligned with the original event list
    pub fn set_event_metadata(&mut self, name: &str, per_event: &[f64]) -> EegResult<()> {
        let values = self
            .selection
            .iter()
            .map(|&i| per_event.get(i).copied())
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| EegError::ConfigurationError {
                message: format!(
                    "Metadata '{}' has {} values, fewer than the events epoched",
                    name,
                    per_event.len()
                ),
            })?;
        self.set_metadata(name, values)
    }

    /// Epochs whose metadata value satisfies `predicate`
    pub fn filter_by_metadata<F>(&self, name: &str, predicate: F) -> EegResult<Epochs>
    where
        F: Fn(f64) -> bool,
    {
        let column = self.metadata.get(name).ok_or_else(|| EegError::ConfigurationError {
            message: format!("Unknown metadata column '{}'", name),
        })?;
        let indices: Vec<usize> = column
            .iter()
            .enumerate()
            .filter(|(_, &v)| predicate(v))
            .map(|(i, _)| i)
            .collect();

        if indices.is_empty() {
            return Err(EegError::EmptyEpochs {
                reason: format!("no epochs satisfy the '{}' filter", name),
            });
        }
        Ok(self.subset(&indices))
    }

    /// Average across epochs
    pub fn average(&self) -> EegResult<Evoked> {
        let data = self.data.mean_axis(Axis(0)).ok_or_else(|| EegError::EmptyEpochs {
            reason: "cannot average an empty collection".to_string(),
        })?;

        let comment = match self.labels.first() {
            Some(first) if self.labels.iter().all(|l| l == first) => first.clone(),
            _ => self.counts().keys().cloned().collect::<Vec<_>>().join(" + "),
        };

        Ok(Evoked {
            data,
            channels: self.channels.clone(),
            times: self.times.clone(),
            nave: self.len(),
            comment,
        })
    }

    /// Restrict to the samples within `[tmin, tmax]`
    pub fn crop(&self, tmin: f64, tmax: f64) -> EegResult<Epochs> {
        let tol = 0.5 / self.sfreq;
        let idx: Vec<usize> = self
            .times
            .iter()
            .enumerate()
            .filter(|(_, &t)| t >= tmin - tol && t <= tmax + tol)
            .map(|(i, _)| i)
            .collect();

        let (Some(&first), Some(&last)) = (idx.first(), idx.last()) else {
            return Err(EegError::InvalidEpochWindow { tmin, tmax });
        };
        if tmin > tmax {
            return Err(EegError::InvalidEpochWindow { tmin, tmax });
        }

        let mut cropped = self.clone();
        cropped.data = self.data.slice(s![.., .., first..=last]).to_owned();
        cropped.times = self.times[first..=last].to_vec();

        // The correction stays applied, but its interval is no longer on the time axis
        if let Some((start, end)) = self.baseline {
            let tol = 1e-9;
            if start < self.times[first] - tol || end > self.times[last] + tol {
                warn!(start, end, tmin, tmax, "cropping removed the baseline interval");
                cropped.baseline = None;
            }
        }
        Ok(cropped)
    }

    /// Subtract per-epoch, per-channel mean over the interval
    pub fn apply_baseline(&mut self, baseline: Baseline) -> EegResult<()> {
        let (b0, b1) = resolve_baseline(baseline, &self.times)?;
        for mut lane in self.data.lanes_mut(Axis(2)) {
            let mean = lane.slice(s![b0..=b1]).mean().unwrap_or(0.0);
            lane -= mean;
        }
        self.baseline = Some((self.times[b0], self.times[b1]));
        Ok(())
    }

    /// Drop epochs so every listed tag has the same count.
    ///
    /// Epochs matching none of the tags are kept. The earliest epochs of
    /// each tag are retained.
    pub fn equalize_counts(&self, tags: &[&str]) -> EegResult<Epochs> {
        let groups: Vec<Vec<usize>> = tags
            .iter()
            .map(|tag| {
                self.labels
                    .iter()
                    .enumerate()
                    .filter(|(_, l)| label_matches(l, tag))
                    .map(|(i, _)| i)
                    .collect()
            })
            .collect();

        let target = groups.iter().map(|g| g.len()).min().unwrap_or(0);
        if target == 0 {
            return Err(EegError::EmptyEpochs {
                reason: format!("cannot equalize counts of {:?}: a condition has no epochs", tags),
            });
        }

        let mut drop = vec![false; self.len()];
        for group in &groups {
            for &i in &group[target..] {
                drop[i] = true;
            }
        }

        let keep: Vec<usize> = (0..self.len()).filter(|&i| !drop[i]).collect();
        let mut equalized = self.subset(&keep);
        for (i, dropped) in drop.iter().enumerate() {
            if *dropped {
                equalized.drop_log.push(DropRecord {
                    event_index: self.selection[i],
                    event: self.events[i],
                    label: self.labels[i].clone(),
                    reason: DropReason::Equalized,
                });
            }
        }

        info!(per_condition = target, kept = keep.len(), "equalized epoch counts");
        Ok(equalized)
    }

    pub fn drop_log_summary(&self) -> DropLogSummary {
        let mut summary = DropLogSummary {
            total: self.n_eligible,
            retained: self.len(),
            no_data: 0,
            rejected: 0,
            flat: 0,
            equalized: 0,
            by_channel: BTreeMap::new(),
        };

        for record in &self.drop_log {
            match &record.reason {
                DropReason::NoData => summary.no_data += 1,
                DropReason::Equalized => summary.equalized += 1,
                DropReason::Rejected { channels } | DropReason::Flat { channels } => {
                    if matches!(record.reason, DropReason::Rejected { .. }) {
                        summary.rejected += 1;
                    } else {
                        summary.flat += 1;
                    }
                    for ch in channels {
                        *summary.by_channel.entry(ch.clone()).or_insert(0) += 1;
                    }
                }
            }
        }
        summary
    }

    fn subset(&self, indices: &[usize]) -> Epochs {
        let pick = |v: &[f64]| indices.iter().map(|&i| v[i]).collect::<Vec<_>>();
        Epochs {
            data: self.data.select(Axis(0), indices),
            channels: self.channels.clone(),
            times: self.times.clone(),
            sfreq: self.sfreq,
            events: indices.iter().map(|&i| self.events[i]).collect(),
            labels: indices.iter().map(|&i| self.labels[i].clone()).collect(),
            selection: indices.iter().map(|&i| self.selection[i]).collect(),
            event_id: self.event_id.clone(),
            metadata: self.metadata.iter().map(|(k, v)| (k.clone(), pick(v))).collect(),
            drop_log: self.drop_log.clone(),
            n_eligible: self.n_eligible,
            baseline: self.baseline,
        }
    }
}

/// Sample bounds (inclusive) of a baseline interval on a time axis
pub(crate) fn resolve_baseline(baseline: Baseline, times: &[f64]) -> EegResult<(usize, usize)> {
    let first = times.first().copied().unwrap_or(0.0);
    let last = times.last().copied().unwrap_or(0.0);
    let start = baseline.0.unwrap_or(first);
    let end = baseline.1.unwrap_or(last);

    let idx: Vec<usize> = times
        .iter()
        .enumerate()
        .filter(|(_, &t)| t >= start - 1e-9 && t <= end + 1e-9)
        .map(|(i, _)| i)
        .collect();

    match (idx.first(), idx.last()) {
        (Some(&b0), Some(&b1)) if start <= end => Ok((b0, b1)),
        _ => Err(EegError::ConfigurationError {
            message: format!("Baseline ({}, {}) contains no samples", start, end),
        }),
    }
}

fn subtract_baseline(window: &mut Array2<f64>, b0: usize, b1: usize) {
    for mut row in window.rows_mut() {
        let mean = row.slice(s![b0..=b1]).mean().unwrap_or(0.0);
        row -= mean;
    }
}

/// Channels violating reject and flat thresholds
fn check_thresholds(
    window: ArrayView2<'_, f64>,
    channels: &[ChannelInfo],
    config: &EpochsConfig,
) -> (Vec<String>, Vec<String>) {
    let mut rejected = Vec::new();
    let mut flat = Vec::new();

    for (row, ch) in window.rows().into_iter().zip(channels) {
        let ptp = peak_to_peak(row);
        if let Some(&limit) = config.reject.get(&ch.kind) {
            if ptp > limit {
                rejected.push(ch.name.clone());
            }
        }
        if let Some(&limit) = config.flat.get(&ch.kind) {
            if ptp < limit {
                flat.push(ch.name.clone());
            }
        }
    }
    (rejected, flat)
}

/// Location and value of the largest absolute deflection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub channel: String,
    pub latency: f64,
    pub amplitude: f64,
}

/// Average of epochs (channel x time)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evoked {
    pub data: Array2<f64>,
    pub channels: Vec<ChannelInfo>,
    pub times: Vec<f64>,
    /// Number of averaged epochs
    pub nave: usize,
    pub comment: String,
}

impl Evoked {
    pub fn channel_index(&self, name: &str) -> EegResult<usize> {
        self.channels
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| EegError::UnknownChannel { name: name.to_string() })
    }

    /// Peak of one channel, optionally within `[tmin, tmax]`
    pub fn peak(&self, channel: &str, window: Option<(f64, f64)>) -> EegResult<Peak> {
        let idx = self.channel_index(channel)?;
        let (tmin, tmax) = window.unwrap_or((f64::NEG_INFINITY, f64::INFINITY));

        self.data
            .row(idx)
            .iter()
            .zip(&self.times)
            .filter(|(_, &t)| t >= tmin && t <= tmax)
            .max_by(|a, b| a.0.abs().total_cmp(&b.0.abs()))
            .map(|(&amplitude, &latency)| Peak {
                channel: channel.to_string(),
                latency,
                amplitude,
            })
            .ok_or(EegError::InvalidEpochWindow { tmin, tmax })
    }

    /// Weighted sum of evoked responses, e.g. `[(1.0, &a), (-1.0, &b)]`
    pub fn combine(terms: &[(f64, &Evoked)]) -> EegResult<Evoked> {
        let Some(&(_, first)) = terms.first() else {
            return Err(EegError::EmptyEpochs { reason: "nothing to combine".to_string() });
        };

        let mut data = Array2::<f64>::zeros(first.data.dim());
        let mut inv_nave = 0.0;
        let mut parts = Vec::with_capacity(terms.len());

        for &(weight, evoked) in terms {
            if evoked.data.dim() != first.data.dim() || evoked.channel_names() != first.channel_names() {
                return Err(EegError::ShapeMismatch {
                    expected: first.data.dim(),
                    actual: evoked.data.dim(),
                });
            }
            data.scaled_add(weight, &evoked.data);
            inv_nave += weight * weight / evoked.nave.max(1) as f64;
            parts.push(format!("{} * {}", weight, evoked.comment));
        }

        Ok(Evoked {
            data,
            channels: first.channels.clone(),
            times: first.times.clone(),
            nave: if inv_nave > 0.0 { (1.0 / inv_nave).round() as usize } else { 0 },
            comment: parts.join(" + "),
        })
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two EEG channels, one EOG and a stim channel; events every 100 samples
    fn recording_with_events() -> (Recording, Vec<Event>, EventId) {
        let sfreq = 100.0;
        let n = 1000;
        let mut data = Array2::zeros((4, n));
        let mut events = Vec::new();

        for (k, onset) in (50..n).step_by(100).enumerate() {
            let code = if k % 2 == 0 { 1 } else { 2 };
            events.push(Event::new(onset, code));
            for t in (onset + 1)..(onset + 31).min(n) {
                data[[0, t]] = code as f64;
                data[[1, t]] = -(code as f64);
            }
            data[[3, onset]] = code as f64;
        }
        // Large artifact on the EOG channel around the third event
        data[[2, 260]] = 500.0;

        let channels = vec![
            ChannelInfo::eeg("Cz"),
            ChannelInfo::eeg("Pz"),
            ChannelInfo::new("EOG", ChannelType::Eog),
            ChannelInfo::stim("STI"),
        ];
        let rec = Recording::new(data, channels, sfreq).unwrap();
        let id = EventId::from_pairs(&[("Face/A", 1), ("Face/B", 2)]).unwrap();
        (rec, events, id)
    }

    #[test]
    fn test_window_shape() {
        let (rec, events, id) = recording_with_events();
        let config = EpochsConfig::new(-0.2, 0.5, id);
        let epochs = Epochs::from_recording(&rec, &events, &config).unwrap();

        assert_eq!(epochs.n_times(), 71);
        assert_eq!(epochs.channels().len(), 3);
        assert!((epochs.times()[0] + 0.2).abs() < 1e-12);
        assert!((epochs.times()[70] - 0.5).abs() < 1e-12);
        assert_eq!(epochs.data().dim(), (epochs.len(), 3, 71));
        // Last event at 950 needs samples up to 1000
        assert_eq!(epochs.len(), 9);
        assert_eq!(epochs.drop_log()[0].reason, DropReason::NoData);
    }

    #[test]
    fn test_invalid_window() {
        let (rec, events, id) = recording_with_events();
        let config = EpochsConfig::new(0.5, -0.2, id);
        assert_eq!(
            Epochs::from_recording(&rec, &events, &config).err(),
            Some(EegError::InvalidEpochWindow { tmin: 0.5, tmax: -0.2 })
        );
    }

    #[test]
    fn test_baseline_and_average() {
        let (rec, events, id) = recording_with_events();
        let config = EpochsConfig::new(-0.2, 0.5, id);
        let epochs = Epochs::from_recording(&rec, &events, &config).unwrap();

        let a = epochs.select("Face/A").unwrap();
        let evoked = a.average().unwrap();
        assert_eq!(evoked.nave, a.len());
        assert_eq!(evoked.comment, "Face/A");

        let cz = evoked.channel_index("Cz").unwrap();
        // Pre-stimulus mean removed, response of 1.0 after onset
        assert!(evoked.data[[cz, 0]].abs() < 1e-12);
        assert!((evoked.data[[cz, 25]] - 1.0).abs() < 1e-12);

        let peak = evoked.peak("Pz", None).unwrap();
        assert!((peak.amplitude + 1.0).abs() < 1e-12);
        assert!(peak.latency > 0.0 && peak.latency <= 0.31);
    }

    #[test]
    fn test_apply_baseline() {
        let (rec, events, id) = recording_with_events();
        let config = EpochsConfig::new(-0.2, 0.5, id).with_baseline(None);
        let mut epochs = Epochs::from_recording(&rec, &events, &config).unwrap();
        assert_eq!(epochs.baseline(), None);

        epochs.apply_baseline((Some(0.1), Some(0.3))).unwrap();
        let (b0, b1) = resolve_baseline((Some(0.1), Some(0.3)), epochs.times()).unwrap();
        assert_eq!((b0, b1), (30, 50));
        for lane in epochs.data().lanes(Axis(2)) {
            assert!(lane.slice(s![b0..=b1]).mean().unwrap().abs() < 1e-12);
        }

        // Response of `code` after onset becomes a pre-stimulus level of -code
        let cz = epochs.channel_names().iter().position(|&n| n == "Cz").unwrap();
        let labels = epochs.labels().to_vec();
        for (e, label) in labels.iter().enumerate() {
            let code = if label == "Face/A" { 1.0 } else { 2.0 };
            assert!((epochs.data()[[e, cz, 0]] + code).abs() < 1e-12);
        }

        let b = epochs.baseline().unwrap();
        assert!((b.0 - 0.1).abs() < 1e-12 && (b.1 - 0.3).abs() < 1e-12);
        assert!(epochs.apply_baseline((Some(0.6), Some(0.7))).is_err());
    }

    #[test]
    fn test_rejection() {
        let (rec, events, id) = recording_with_events();
        let config = EpochsConfig::new(-0.2, 0.5, id)
            .with_reject(ChannelType::Eog, 100.0)
            .with_reject(ChannelType::Eeg, 10.0);
        let epochs = Epochs::from_recording(&rec, &events, &config).unwrap();

        assert_eq!(epochs.len(), 8);
        let summary = epochs.drop_log_summary();
        assert_eq!(summary.total, 10);
        assert_eq!(summary.retained, 8);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.no_data, 1);
        assert_eq!(summary.by_channel["EOG"], 1);
        assert!((summary.drop_percentage() - 20.0).abs() < 1e-12);

        // Every retained epoch honors the thresholds
        for e in 0..epochs.len() {
            let epoch = epochs.epoch(e).unwrap();
            for (row, ch) in epoch.rows().into_iter().zip(epochs.channels()) {
                let limit = config.reject[&ch.kind];
                assert!(peak_to_peak(row) <= limit);
            }
        }
    }

    #[test]
    fn test_everything_rejected() {
        let (rec, events, id) = recording_with_events();
        let config = EpochsConfig::new(-0.2, 0.5, id).with_reject(ChannelType::Eeg, 0.5);
        let result = Epochs::from_recording(&rec, &events, &config);
        assert!(matches!(result, Err(EegError::EmptyEpochs { .. })));
    }

    #[test]
    fn test_flat_rejection() {
        let (rec, events, id) = recording_with_events();
        let config = EpochsConfig::new(-0.2, 0.5, id).with_flat(ChannelType::Eog, 1.0);
        let epochs = Epochs::from_recording(&rec, &events, &config).unwrap();
        // Only the epoch containing the EOG spike is not flat
        assert_eq!(epochs.len(), 1);
        assert_eq!(epochs.drop_log_summary().flat, 8);
    }

    #[test]
    fn test_bad_channels_excluded() {
        let (mut rec, events, id) = recording_with_events();
        rec.mark_bad(&["Pz"]).unwrap();
        let epochs = Epochs::from_recording(&rec, &events, &EpochsConfig::new(-0.1, 0.3, id)).unwrap();
        assert_eq!(epochs.channel_names(), vec!["Cz", "EOG"]);
    }

    #[test]
    fn test_select_counts_and_equalize() {
        let (rec, events, id) = recording_with_events();
        let epochs = Epochs::from_recording(&rec, &events, &EpochsConfig::new(-0.2, 0.5, id)).unwrap();

        let counts = epochs.counts();
        assert_eq!(counts["Face/A"], 5);
        assert_eq!(counts["Face/B"], 4);
        assert_eq!(epochs.select("Face").unwrap().len(), 9);
        assert!(epochs.select("House").is_err());

        let eq = epochs.equalize_counts(&["Face/A", "Face/B"]).unwrap();
        assert_eq!(eq.counts()["Face/A"], 4);
        assert_eq!(eq.counts()["Face/B"], 4);
        assert_eq!(eq.drop_log_summary().equalized, 1);
    }

    #[test]
    fn test_metadata() {
        let (rec, events, id) = recording_with_events();
        let mut epochs =
            Epochs::from_recording(&rec, &events, &EpochsConfig::new(-0.2, 0.5, id)).unwrap();

        let per_event: Vec<f64> = (0..events.len()).map(|i| i as f64 / 10.0).collect();
        epochs.set_event_metadata("coherence", &per_event).unwrap();
        // The last event was dropped for lack of data
        assert_eq!(epochs.metadata("coherence").unwrap()[0], 0.0);
        assert_eq!(epochs.metadata("coherence").unwrap()[8], 0.8);

        let high = epochs.filter_by_metadata("coherence", |c| c >= 0.5).unwrap();
        assert_eq!(high.len(), 4);
        assert!(high.metadata("coherence").unwrap().iter().all(|&c| c >= 0.5));

        assert!(epochs.set_metadata("x", vec![1.0]).is_err());
        assert!(epochs.filter_by_metadata("missing", |_| true).is_err());
        assert!(epochs.filter_by_metadata("coherence", |c| c > 10.0).is_err());
    }

    #[test]
    fn test_crop_and_combine() {
        let (rec, events, id) = recording_with_events();
        let epochs = Epochs::from_recording(&rec, &events, &EpochsConfig::new(-0.2, 0.5, id)).unwrap();

        let cropped = epochs.crop(0.0, 0.2).unwrap();
        assert_eq!(cropped.n_times(), 21);
        assert!(cropped.tmin().abs() < 1e-12);
        assert!(epochs.crop(2.0, 3.0).is_err());

        // Baseline (-0.2, 0.0) survives a crop that keeps it, not one that cuts it
        assert_eq!(epochs.baseline(), Some((-0.2, 0.0)));
        assert_eq!(cropped.baseline(), None);
        assert_eq!(epochs.crop(-0.2, 0.3).unwrap().baseline(), Some((-0.2, 0.0)));

        let a = epochs.select("Face/A").unwrap().average().unwrap();
        let b = epochs.select("Face/B").unwrap().average().unwrap();
        let diff = Evoked::combine(&[(1.0, &a), (-1.0, &b)]).unwrap();
        let cz = diff.channel_index("Cz").unwrap();
        assert!((diff.data[[cz, 25]] + 1.0).abs() < 1e-12);
        assert_eq!(diff.nave, 2);

        let short = cropped.select("Face/A").unwrap().average().unwrap();
        assert!(Evoked::combine(&[(1.0, &a), (1.0, &short)]).is_err());
    }
}
