//! Events and condition labels

use crate::error::{EegError, EegResult};
use crate::recording::Recording;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stimulus or response onset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    /// Sample index relative to the first recording sample
    pub sample: usize,
    /// Trigger code
    pub code: i32,
}

impl Event {
    pub fn new(sample: usize, code: i32) -> Self {
        Self { sample, code }
    }
}

/// Mapping from condition label to trigger code.
///
/// Labels may be hierarchical (`"Face/A"`); tags are the `/`-separated parts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, i32>", into = "BTreeMap<String, i32>")]
pub struct EventId(BTreeMap<String, i32>);

impl TryFrom<BTreeMap<String, i32>> for EventId {
    type Error = EegError;

    fn try_from(map: BTreeMap<String, i32>) -> EegResult<Self> {
        let id = Self(map);
        id.validate()?;
        Ok(id)
    }
}

impl From<EventId> for BTreeMap<String, i32> {
    fn from(id: EventId) -> Self {
        id.0
    }
}

impl EventId {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: &str, code: i32) -> EegResult<()> {
        if label.is_empty() {
            return Err(EegError::ConfigurationError {
                message: "Event label cannot be empty".to_string(),
            });
        }
        if let Some((existing, _)) = self.0.iter().find(|&(l, &c)| c == code && l.as_str() != label) {
            return Err(EegError::ConfigurationError {
                message: format!("Event code {} already used by '{}'", code, existing),
            });
        }
        self.0.insert(label.to_string(), code);
        Ok(())
    }

    /// Labels must be non-empty and codes unique
    pub fn validate(&self) -> EegResult<()> {
        let mut seen: BTreeMap<i32, &str> = BTreeMap::new();
        for (label, &code) in &self.0 {
            if label.is_empty() {
                return Err(EegError::ConfigurationError {
                    message: "Event label cannot be empty".to_string(),
                });
            }
            if let Some(existing) = seen.insert(code, label.as_str()) {
                return Err(EegError::ConfigurationError {
                    message: format!("Event code {} used by both '{}' and '{}'", code, existing, label),
                });
            }
        }
        Ok(())
    }

    pub fn from_pairs(pairs: &[(&str, i32)]) -> EegResult<Self> {
        let mut id = Self::new();
        for &(label, code) in pairs {
            id.insert(label, code)?;
        }
        Ok(id)
    }

    pub fn code(&self, label: &str) -> Option<i32> {
        self.0.get(label).copied()
    }

    /// Label for a trigger code
    pub fn label(&self, code: i32) -> Option<&str> {
        self.0
            .iter()
            .find(|&(_, &c)| c == code)
            .map(|(l, _)| l.as_str())
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.0.iter().map(|(l, &c)| (l.as_str(), c))
    }
}

/// Whether a label matches a selection tag.
///
/// `"Face"` matches `"Face/A"` and `"A/Face"`; `"Face/A"` matches only labels
/// containing both tags.
pub fn label_matches(label: &str, tag: &str) -> bool {
    if label == tag {
        return true;
    }
    let parts: Vec<&str> = label.split('/').collect();
    tag.split('/').all(|t| parts.contains(&t))
}

/// Extract event onsets from a trigger channel.
///
/// An event is reported wherever the trigger value steps up to a non-zero
/// value. A non-zero value already present at the first sample is ignored.
pub fn find_events(recording: &Recording, stim_channel: &str) -> EegResult<Vec<Event>> {
    let idx = recording.channel_index(stim_channel)?;
    let stim = recording.channel_data(idx)?;

    let mut events = Vec::new();
    let mut previous = stim.first().map(|v| v.round() as i32).unwrap_or(0);

    for (sample, value) in stim.iter().enumerate().skip(1) {
        let current = value.round() as i32;
        if current != 0 && current > previous {
            events.push(Event::new(sample, current));
        }
        previous = current;
    }

    tracing::info!(count = events.len(), channel = stim_channel, "found events");
    Ok(events)
}

/// Number of events per code
pub fn count_events(events: &[Event]) -> BTreeMap<i32, usize> {
    let mut counts = BTreeMap::new();
    for event in events {
        *counts.entry(event.code).or_insert(0) += 1;
    }
    counts
}
