//! Mini-batch training loop, evaluation and cross-validation

use crate::classifier::{accuracy, cross_entropy, Classifier};
use crate::dataset::Dataset;
use crate::optim::{Adam, AdamConfig};
use crate::split::{stratified_holdout, Fold, SplitStrategy, StratifiedKFold};
use eeg_core::{EegError, EegResult};
use ndarray::Axis;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub batch_size: usize,
    pub max_epochs: usize,
    pub learning_rate: f64,
    /// Decoupled weight decay passed to Adam
    pub weight_decay: f64,
    pub split: SplitStrategy,
    /// Seed for splitting and batch shuffling
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            max_epochs: 30,
            learning_rate: 1e-2,
            weight_decay: 0.0,
            split: SplitStrategy::HoldOut { validation_fraction: 0.2 },
            seed: 42,
        }
    }
}

impl TrainerConfig {
    pub fn validate(&self) -> EegResult<()> {
        if self.batch_size == 0 || self.max_epochs == 0 {
            return Err(EegError::ConfigurationError {
                message: format!(
                    "Batch size and epoch count must be positive (got {} and {})",
                    self.batch_size, self.max_epochs
                ),
            });
        }
        if !(self.learning_rate > 0.0) || !(self.weight_decay >= 0.0) {
            return Err(EegError::ConfigurationError {
                message: format!(
                    "Invalid optimiser settings: learning_rate={} weight_decay={}",
                    self.learning_rate, self.weight_decay
                ),
            });
        }
        self.split.validate()
    }
}

/// Metrics after one pass over the training split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub valid_loss: f64,
    pub valid_accuracy: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub records: Vec<EpochRecord>,
}

impl TrainingHistory {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&EpochRecord> {
        self.records.last()
    }

    pub fn best_valid_accuracy(&self) -> Option<&EpochRecord> {
        self.records
            .iter()
            .max_by(|a, b| a.valid_accuracy.total_cmp(&b.valid_accuracy).then(b.epoch.cmp(&a.epoch)))
    }
}

/// A fitted model and how it got there
#[derive(Debug, Clone)]
pub struct TrainedModel<M> {
    pub model: M,
    pub history: TrainingHistory,
}

/// Loss and accuracy of a model on some rows of a dataset
pub fn evaluate<M: Classifier>(model: &M, dataset: &Dataset, indices: &[usize]) -> EegResult<(f64, f64)> {
    if indices.is_empty() {
        return Ok((0.0, 0.0));
    }
    let x = dataset.x().select(Axis(0), indices);
    let y: Vec<usize> = indices.iter().map(|&i| dataset.y()[i]).collect();
    let proba = model.predict_proba(x.view())?;
    let predicted = crate::classifier::argmax_rows(&proba);
    Ok((cross_entropy(&proba, &y), accuracy(&predicted, &y)))
}

pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> EegResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    fn check_compatible<M: Classifier>(model: &M, dataset: &Dataset) -> EegResult<()> {
        if model.sample_shape() != dataset.shape() {
            return Err(EegError::ShapeMismatch {
                expected: model.sample_shape().as_tuple(),
                actual: dataset.shape().as_tuple(),
            });
        }
        if let Some(&bad) = dataset.y().iter().find(|&&label| label >= model.n_classes()) {
            return Err(EegError::TrainingError {
                message: format!(
                    "Label {} out of range for a {}-class {}",
                    bad,
                    model.n_classes(),
                    model.name()
                ),
            });
        }
        Ok(())
    }

    /// Split according to the configured strategy and train
    pub fn fit<M: Classifier>(&self, model: M, dataset: &Dataset) -> EegResult<TrainedModel<M>> {
        Self::check_compatible(&model, dataset)?;
        let fold = match self.config.split {
            SplitStrategy::HoldOut { validation_fraction } => {
                stratified_holdout(dataset.y(), validation_fraction, self.config.seed)?
            }
            SplitStrategy::StratifiedKFold { n_splits } => StratifiedKFold::new(n_splits)?
                .with_shuffle(self.config.seed)
                .split(dataset.y())?
                .into_iter()
                .next()
                .ok_or_else(|| EegError::TrainingError { message: "No folds produced".to_string() })?,
        };
        self.fit_fold(model, dataset, &fold)
    }

    /// Train on `fold.train`, report on `fold.valid` after every epoch
    pub fn fit_fold<M: Classifier>(&self, mut model: M, dataset: &Dataset, fold: &Fold) -> EegResult<TrainedModel<M>> {
        Self::check_compatible(&model, dataset)?;
        if fold.train.is_empty() {
            return Err(EegError::TrainingError {
                message: "Training split is empty".to_string(),
            });
        }

        let train_set = dataset.subset(&fold.train);
        model.prepare(&train_set)?;

        let mut optimizer = Adam::new(AdamConfig {
            learning_rate: self.config.learning_rate,
            weight_decay: self.config.weight_decay,
            ..AdamConfig::default()
        });
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut order: Vec<usize> = (0..train_set.len()).collect();
        let mut history = TrainingHistory::default();
        let all_train: Vec<usize> = (0..train_set.len()).collect();

        info!(
            model = model.name(),
            train = fold.train.len(),
            valid = fold.valid.len(),
            epochs = self.config.max_epochs,
            "training started"
        );

        for epoch in 0..self.config.max_epochs {
            order.shuffle(&mut rng);
            for batch in order.chunks(self.config.batch_size) {
                let x = train_set.x().select(Axis(0), batch);
                let y: Vec<usize> = batch.iter().map(|&i| train_set.y()[i]).collect();
                model.train_batch(x.view(), &y, &mut optimizer)?;
            }

            let (train_loss, train_accuracy) = evaluate(&model, &train_set, &all_train)?;
            let (valid_loss, valid_accuracy) = evaluate(&model, dataset, &fold.valid)?;
            if !train_loss.is_finite() {
                return Err(EegError::TrainingError {
                    message: format!("Training diverged at epoch {}", epoch),
                });
            }
            debug!(epoch, train_loss, train_accuracy, valid_loss, valid_accuracy, "epoch finished");
            history.records.push(EpochRecord {
                epoch,
                train_loss,
                train_accuracy,
                valid_loss,
                valid_accuracy,
            });
        }

        if let Some(last) = history.last() {
            info!(
                model = model.name(),
                train_accuracy = last.train_accuracy,
                valid_accuracy = last.valid_accuracy,
                "training finished"
            );
        }
        Ok(TrainedModel { model, history })
    }
}

/// Per-fold outcome of cross-validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossValidation {
    pub fold_scores: Vec<f64>,
    pub histories: Vec<TrainingHistory>,
}

impl CrossValidation {
    pub fn mean_score(&self) -> f64 {
        if self.fold_scores.is_empty() {
            return 0.0;
        }
        self.fold_scores.iter().sum::<f64>() / self.fold_scores.len() as f64
    }

    pub fn std_score(&self) -> f64 {
        if self.fold_scores.is_empty() {
            return 0.0;
        }
        let mean = self.mean_score();
        let var = self.fold_scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / self.fold_scores.len() as f64;
        var.sqrt()
    }
}

/// Stratified k-fold cross-validation with a fresh model per fold.
///
/// `n_splits` comes from `config.split` when it is a k-fold strategy, else 5.
/// The score of a fold is validation accuracy after the last epoch.
pub fn cross_validate<M, F>(factory: F, dataset: &Dataset, config: &TrainerConfig) -> EegResult<CrossValidation>
where
    M: Classifier,
    F: Fn(usize) -> EegResult<M>,
{
    let n_splits = match config.split {
        SplitStrategy::StratifiedKFold { n_splits } => n_splits,
        SplitStrategy::HoldOut { .. } => 5,
    };
    let trainer = Trainer::new(config.clone())?;
    let folds = StratifiedKFold::new(n_splits)?.with_shuffle(config.seed).split(dataset.y())?;

    let mut result = CrossValidation { fold_scores: Vec::new(), histories: Vec::new() };
    for (k, fold) in folds.iter().enumerate() {
        let trained = trainer.fit_fold(factory(k)?, dataset, fold)?;
        let score = trained.history.last().map_or(0.0, |r| r.valid_accuracy);
        info!(fold = k, score, "fold finished");
        result.fold_scores.push(score);
        result.histories.push(trained.history);
    }
    Ok(result)
}
