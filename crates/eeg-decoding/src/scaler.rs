//! Per-feature standardisation

use eeg_core::{EegError, EegResult};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Zero-mean, unit-variance scaling fitted on training rows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Option<Array1<f64>>,
    scale: Option<Array1<f64>>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        self.mean.is_some()
    }

    pub fn fit(&mut self, x: ArrayView2<'_, f64>) -> EegResult<()> {
        if x.nrows() == 0 {
            return Err(EegError::TrainingError {
                message: "Cannot fit scaler on zero samples".to_string(),
            });
        }
        let mean = x.mean_axis(Axis(0)).ok_or_else(|| EegError::TrainingError {
            message: "Cannot fit scaler on zero samples".to_string(),
        })?;
        // Constant features keep unit scale
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f64::EPSILON { s } else { 1.0 });

        self.mean = Some(mean);
        self.scale = Some(scale);
        Ok(())
    }

    pub fn transform(&self, x: ArrayView2<'_, f64>) -> EegResult<Array2<f64>> {
        let (mean, scale) = match (&self.mean, &self.scale) {
            (Some(m), Some(s)) => (m, s),
            _ => {
                return Err(EegError::TrainingError {
                    message: "Scaler used before fit".to_string(),
                })
            }
        };
        if x.ncols() != mean.len() {
            return Err(EegError::FeatureMismatch {
                expected: mean.len(),
                actual: x.ncols(),
            });
        }
        Ok((&x - mean) / scale)
    }

    pub fn fit_transform(&mut self, x: ArrayView2<'_, f64>) -> EegResult<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}
