//! Stratified train/validation splits

use eeg_core::{EegError, EegResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// How a trainer partitions its dataset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    /// One stratified hold-out validation set
    HoldOut { validation_fraction: f64 },
    /// Stratified k-fold; `fit` trains on the first fold only
    StratifiedKFold { n_splits: usize },
}

impl SplitStrategy {
    pub fn validate(&self) -> EegResult<()> {
        match *self {
            SplitStrategy::HoldOut { validation_fraction } => {
                if !(validation_fraction > 0.0 && validation_fraction < 1.0) {
                    return Err(EegError::ConfigurationError {
                        message: format!(
                            "Validation fraction must be in (0, 1), got {}",
                            validation_fraction
                        ),
                    });
                }
            }
            SplitStrategy::StratifiedKFold { n_splits } => {
                if n_splits < 2 {
                    return Err(EegError::ConfigurationError {
                        message: format!("Need at least 2 folds, got {}", n_splits),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Index sets of one split, both sorted ascending
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    pub train: Vec<usize>,
    pub valid: Vec<usize>,
}

fn indices_by_class(y: &[usize]) -> Vec<Vec<usize>> {
    let n_classes = y.iter().max().map_or(0, |&m| m + 1);
    let mut by_class = vec![Vec::new(); n_classes];
    for (i, &label) in y.iter().enumerate() {
        by_class[label].push(i);
    }
    by_class
}

/// K folds that keep class proportions
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    n_splits: usize,
    seed: Option<u64>,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> EegResult<Self> {
        SplitStrategy::StratifiedKFold { n_splits }.validate()?;
        Ok(Self { n_splits, seed: None })
    }

    /// Shuffle members of each class before dealing them to folds
    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    pub fn split(&self, y: &[usize]) -> EegResult<Vec<Fold>> {
        let mut by_class = indices_by_class(y);
        for (label, members) in by_class.iter().enumerate() {
            if !members.is_empty() && members.len() < self.n_splits {
                return Err(EegError::TrainingError {
                    message: format!(
                        "Class {} has {} members, fewer than {} folds",
                        label,
                        members.len(),
                        self.n_splits
                    ),
                });
            }
        }

        if let Some(seed) = self.seed {
            let mut rng = StdRng::seed_from_u64(seed);
            for members in &mut by_class {
                members.shuffle(&mut rng);
            }
        }

        let mut fold_of = vec![0; y.len()];
        for members in &by_class {
            for (rank, &i) in members.iter().enumerate() {
                fold_of[i] = rank % self.n_splits;
            }
        }

        Ok((0..self.n_splits)
            .map(|k| {
                let (valid, train): (Vec<usize>, Vec<usize>) =
                    (0..y.len()).partition(|&i| fold_of[i] == k);
                Fold { train, valid }
            })
            .collect())
    }
}

/// Stratified hold-out split.
///
/// Every class with at least two members contributes at least one sample to
/// each side; singleton classes stay in the training set.
pub fn stratified_holdout(y: &[usize], validation_fraction: f64, seed: u64) -> EegResult<Fold> {
    SplitStrategy::HoldOut { validation_fraction }.validate()?;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut valid = Vec::new();

    for mut members in indices_by_class(y) {
        members.shuffle(&mut rng);
        let n = members.len();
        let n_valid = if n < 2 {
            0
        } else {
            ((n as f64 * validation_fraction).round() as usize).clamp(1, n - 1)
        };
        valid.extend_from_slice(&members[..n_valid]);
        train.extend_from_slice(&members[n_valid..]);
    }

    train.sort_unstable();
    valid.sort_unstable();
    Ok(Fold { train, valid })
}
