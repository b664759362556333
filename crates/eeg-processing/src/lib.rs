//! EEG-Processing: Analysis pipeline for epoched EEG/MEG
//!
//! Zero-phase filtering, epoching, Morlet time-frequency, Welch spectra,
//! decoding representations and renderer-independent figures.

pub mod processor;
pub mod filters;
pub mod epochs;
pub mod tfr;
pub mod psd;
pub mod features;
pub mod config;
pub mod pipeline;
pub mod viz;

pub use pipeline::*;
pub use processor::{SignalProcessor, ProcessorConfig, ProcessorType, ProcessingMetrics};
pub use filters::{
    FilterType, ButterworthFilter, NotchFilter, AverageReference,
    FilterConfig, FilterBank, filtfilt
};
pub use epochs::{
    Baseline, EpochsConfig, Epochs, Evoked, Peak, DropReason, DropRecord, DropLogSummary
};
pub use tfr::{tfr_morlet, AverageTfr, BaselineMode, NCycles, TfrConfig, TfrMeasure};
pub use psd::{welch_psd, welch_psd_epochs, PsdConfig, Spectrum};
pub use features::{
    band_power_dataset, flatten_epochs, windowed_dataset, FrequencyBand, LabelEncoder
};
pub use config::{
    AnalysisConfig, DecodingSection, ModelKind, PreprocessingConfig, Representation,
    TfrSection, TopomapSection, TopomapWindow
};
pub use viz::{HeatmapFigure, LineFigure, Series, TopomapFigure};
