//! Core signal processor trait and types

use eeg_core::{EegError, EegResult, Recording};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

/// Core trait for all recording processors
pub trait SignalProcessor: Send + Sync {
    /// Process a recording and return the processed copy.
    ///
    /// Implementations preserve channel count, sample count and channel order.
    fn process(&mut self, input: &Recording) -> EegResult<Recording>;

    /// Get processor configuration
    fn config(&self) -> &ProcessorConfig;

    /// Get processor name/identifier
    fn name(&self) -> &str;

    /// Reset processor internal state
    fn reset(&mut self) {}

    /// Get processor type for pipeline organization
    fn processor_type(&self) -> ProcessorType {
        self.config().processor_type
    }
}

/// Types of signal processors for pipeline organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessorType {
    /// Frequency-selective filters (bandpass, notch, etc.)
    Filter,
    /// Spatial re-referencing
    Reference,
    /// Chains of other processors
    Chain,
}

/// Generic processor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Processor name
    pub name: String,
    /// Processor type
    pub processor_type: ProcessorType,
    /// Enabled/disabled state
    pub enabled: bool,
    /// Processing parameters, for reporting
    pub parameters: BTreeMap<String, ParameterValue>,
}

/// Numeric processor parameter, serialized as a plain number
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Integer(i64),
    Float(f64),
}

impl ProcessorConfig {
    /// Create new processor configuration
    pub fn new(name: &str, processor_type: ProcessorType) -> Self {
        Self {
            name: name.to_string(),
            processor_type,
            enabled: true,
            parameters: BTreeMap::new(),
        }
    }

    /// Set a parameter value
    pub fn set_parameter(&mut self, key: &str, value: ParameterValue) {
        self.parameters.insert(key.to_string(), value);
    }

    /// Get a parameter value
    pub fn get_parameter(&self, key: &str) -> Option<&ParameterValue> {
        self.parameters.get(key)
    }

    /// Get numeric parameter with default
    pub fn get_float(&self, key: &str, default: f64) -> f64 {
        self.get_parameter(key).map_or(default, ParameterValue::as_f64)
    }
}

impl ParameterValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            ParameterValue::Float(v) => v,
            ParameterValue::Integer(v) => v as f64,
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Float(value)
    }
}

impl From<usize> for ParameterValue {
    fn from(value: usize) -> Self {
        ParameterValue::Integer(value as i64)
    }
}

/// Performance metrics for processing operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingMetrics {
    /// Stage name
    pub stage: String,
    /// Actual processing time in microseconds
    pub processing_time_us: u64,
    /// Success/failure status
    pub success: bool,
    /// Error message if processing failed
    pub error_message: Option<String>,
}

impl ProcessingMetrics {
    /// Start timing a processing operation
    pub fn start_timing(stage: &str) -> ProcessingTimer {
        ProcessingTimer {
            start_time: Instant::now(),
            stage: stage.to_string(),
        }
    }
}

/// Helper for timing processing operations
pub struct ProcessingTimer {
    start_time: Instant,
    stage: String,
}

impl ProcessingTimer {
    /// Finish timing and return metrics
    pub fn finish(self) -> ProcessingMetrics {
        ProcessingMetrics {
            processing_time_us: self.start_time.elapsed().as_micros() as u64,
            stage: self.stage,
            success: true,
            error_message: None,
        }
    }

    /// Finish with error
    pub fn finish_with_error(self, error: &EegError) -> ProcessingMetrics {
        ProcessingMetrics {
            processing_time_us: self.start_time.elapsed().as_micros() as u64,
            stage: self.stage,
            success: false,
            error_message: Some(error.to_string()),
        }
    }
}
