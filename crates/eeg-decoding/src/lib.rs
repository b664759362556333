//! EEG-Decoding: Classifiers for epoched EEG/MEG data
//!
//! Datasets, stratified splits, a logistic-regression baseline, a shallow
//! convolutional network and a deterministic mini-batch trainer.

pub mod dataset;
pub mod split;
pub mod scaler;
pub mod optim;
pub mod classifier;
pub mod logistic;
pub mod convnet;
pub mod trainer;

pub use dataset::{Dataset, SampleShape};
pub use split::{stratified_holdout, Fold, SplitStrategy, StratifiedKFold};
pub use scaler::StandardScaler;
pub use optim::{Adam, AdamConfig};
pub use classifier::{accuracy, Classifier};
pub use logistic::LogisticRegression;
pub use convnet::{ConvNetConfig, ShallowConvNet};
pub use trainer::{
    cross_validate, evaluate, CrossValidation, EpochRecord, TrainedModel, Trainer, TrainerConfig,
    TrainingHistory,
};
