//! Loading and saving recordings and event tables
//!
//! Recordings are stored as JSON documents:
//!
//! ```json
//! { "sfreq": 250.0,
//!   "channels": [{ "name": "Cz", "kind": "eeg" }, { "name": "STI", "kind": "stim" }],
//!   "data": [[...], [...]] }
//! ```
//!
//! Event tables are whitespace separated text with either `sample code` or
//! `sample previous code` columns per line.

use crate::channel::ChannelInfo;
use crate::error::{EegError, EegResult};
use crate::events::Event;
use crate::format_error;
use crate::recording::Recording;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// On-disk layout of a recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingFile {
    pub sfreq: f64,
    pub channels: Vec<ChannelInfo>,
    /// One row of samples per channel
    pub data: Vec<Vec<f64>>,
}

impl RecordingFile {
    pub fn from_recording(recording: &Recording) -> Self {
        Self {
            sfreq: recording.sfreq(),
            channels: recording.channels().to_vec(),
            data: recording.data().rows().into_iter().map(|row| row.to_vec()).collect(),
        }
    }

    pub fn into_recording(self) -> EegResult<Recording> {
        let n_channels = self.data.len();
        let n_times = self.data.first().map(|row| row.len()).unwrap_or(0);

        if let Some((idx, row)) = self.data.iter().enumerate().find(|(_, row)| row.len() != n_times) {
            return Err(EegError::InvalidSignalData {
                reason: format!(
                    "Channel row {} has {} samples, expected {}",
                    idx,
                    row.len(),
                    n_times
                ),
            });
        }

        let flat: Vec<f64> = self.data.into_iter().flatten().collect();
        let data = Array2::from_shape_vec((n_channels, n_times), flat).map_err(|e| {
            EegError::InvalidSignalData { reason: e.to_string() }
        })?;

        Recording::new(data, self.channels, self.sfreq)
    }
}

fn io_error(path: &Path, err: impl std::fmt::Display) -> EegError {
    EegError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

/// Read a recording from a JSON file
pub fn load_recording<P: AsRef<Path>>(path: P) -> EegResult<Recording> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    let file: RecordingFile = serde_json::from_str(&text)
        .map_err(|e| format_error!("{}: {}", path.display(), e))?;
    let recording = file.into_recording()?;

    info!(
        path = %path.display(),
        channels = recording.channel_count(),
        samples = recording.n_times(),
        sfreq = recording.sfreq(),
        "loaded recording"
    );
    Ok(recording)
}

/// Write a recording to a JSON file
pub fn save_recording<P: AsRef<Path>>(recording: &Recording, path: P) -> EegResult<()> {
    let path = path.as_ref();
    let json = serde_json::to_string(&RecordingFile::from_recording(recording))
        .map_err(|e| format_error!("failed to serialize recording: {}", e))?;
    fs::write(path, json).map_err(|e| io_error(path, e))
}

/// Parse an event table
pub fn parse_events(text: &str) -> EegResult<Vec<Event>> {
    let mut events = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        let (sample, code) = match fields.as_slice() {
            [sample, code] => (*sample, *code),
            [sample, _previous, code] => (*sample, *code),
            _ => {
                return Err(format_error!(
                    "line {}: expected 2 or 3 columns, found {}",
                    line_no + 1,
                    fields.len()
                ))
            }
        };

        let sample = sample
            .parse::<usize>()
            .map_err(|e| format_error!("line {}: invalid sample '{}': {}", line_no + 1, sample, e))?;
        let code = code
            .parse::<i32>()
            .map_err(|e| format_error!("line {}: invalid code '{}': {}", line_no + 1, code, e))?;

        events.push(Event::new(sample, code));
    }

    Ok(events)
}

/// Read an event table from disk
pub fn read_events<P: AsRef<Path>>(path: P) -> EegResult<Vec<Event>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    let events = parse_events(&text)?;
    info!(path = %path.display(), count = events.len(), "read events");
    Ok(events)
}

/// Write events as `sample 0 code` lines
pub fn write_events<P: AsRef<Path>>(events: &[Event], path: P) -> EegResult<()> {
    let path = path.as_ref();
    let mut text = String::with_capacity(events.len() * 16);
    for event in events {
        text.push_str(&format!("{} 0 {}\n", event.sample, event.code));
    }
    fs::write(path, text).map_err(|e| io_error(path, e))
}
