//! Multinomial logistic regression on standardised features

use crate::classifier::{check_features, cross_entropy, softmax_grad, softmax_rows, Classifier};
use crate::dataset::{Dataset, SampleShape};
use crate::optim::Adam;
use crate::scaler::StandardScaler;
use eeg_core::{EegError, EegResult};
use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Softmax regression with an L2 penalty and a built-in scaler
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    shape: SampleShape,
    n_classes: usize,
    l2: f64,
    /// features x classes
    weights: Array2<f64>,
    bias: Array1<f64>,
    scaler: StandardScaler,
}

impl LogisticRegression {
    pub fn new(shape: SampleShape, n_classes: usize, l2: f64) -> EegResult<Self> {
        if n_classes < 2 {
            return Err(EegError::ConfigurationError {
                message: format!("Need at least 2 classes, got {}", n_classes),
            });
        }
        if shape.n_features() == 0 {
            return Err(EegError::ConfigurationError {
                message: "Sample shape has no features".to_string(),
            });
        }
        if !(l2 >= 0.0) {
            return Err(EegError::ConfigurationError {
                message: format!("L2 penalty must be non-negative, got {}", l2),
            });
        }

        Ok(Self {
            shape,
            n_classes,
            l2,
            weights: Array2::zeros((shape.n_features(), n_classes)),
            bias: Array1::zeros(n_classes),
            scaler: StandardScaler::new(),
        })
    }

    /// Weights in standardised feature space (features x classes)
    pub fn coefficients(&self) -> &Array2<f64> {
        &self.weights
    }

    fn probabilities(&self, z: &Array2<f64>) -> Array2<f64> {
        let mut logits = z.dot(&self.weights) + &self.bias;
        softmax_rows(&mut logits);
        logits
    }
}

impl Classifier for LogisticRegression {
    fn name(&self) -> &str {
        "logistic_regression"
    }

    fn sample_shape(&self) -> SampleShape {
        self.shape
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn prepare(&mut self, train: &Dataset) -> EegResult<()> {
        self.scaler.fit(train.x().view())
    }

    fn train_batch(&mut self, x: ArrayView2<'_, f64>, y: &[usize], optimizer: &mut Adam) -> EegResult<f64> {
        check_features(self.shape, &x)?;
        if let Some(&bad) = y.iter().find(|&&label| label >= self.n_classes) {
            return Err(EegError::TrainingError {
                message: format!("Label {} outside {} classes", bad, self.n_classes),
            });
        }

        let z = self.scaler.transform(x)?;
        let proba = self.probabilities(&z);
        let penalty = 0.5 * self.l2 * self.weights.mapv(|w| w * w).sum();
        let loss = cross_entropy(&proba, y) + penalty;

        let grad_logits = softmax_grad(&proba, y);
        let grad_w = z.t().dot(&grad_logits) + &(self.l2 * &self.weights);
        let grad_b = grad_logits.sum_axis(Axis(0));

        optimizer.begin_step();
        optimizer.update(0, &mut self.weights, &grad_w, false)?;
        optimizer.update(1, &mut self.bias, &grad_b, false)?;
        Ok(loss)
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> EegResult<Array2<f64>> {
        check_features(self.shape, &x)?;
        let z = self.scaler.transform(x)?;
        Ok(self.probabilities(&z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optim::AdamConfig;
    use ndarray::array;

    fn separable() -> Dataset {
        // Class given by the sign of feature 0 minus feature 1
        let x = Array2::from_shape_fn((40, 2), |(i, j)| {
            let class = (i % 2) as f64;
            let jitter = (i as f64 * 0.37).sin() * 0.3;
            if j == 0 { class * 2.0 - 1.0 + jitter } else { jitter * 0.5 }
        });
        let y = (0..40).map(|i| i % 2).collect();
        Dataset::new(x, y, SampleShape::new(1, 2), vec!["a".into(), "b".into()]).unwrap()
    }

    #[test]
    fn test_learns_separable_problem() {
        let ds = separable();
        let mut model = LogisticRegression::new(ds.shape(), 2, 1e-3).unwrap();
        model.prepare(&ds).unwrap();
        let mut adam = Adam::new(AdamConfig { learning_rate: 0.1, ..Default::default() });

        let first = model.train_batch(ds.x().view(), ds.y(), &mut adam).unwrap();
        let mut last = first;
        for _ in 0..100 {
            last = model.train_batch(ds.x().view(), ds.y(), &mut adam).unwrap();
        }
        assert!((first - 2f64.ln()).abs() < 1e-9);
        assert!(last < 0.2 * first);
        assert_eq!(model.predict(ds.x().view()).unwrap(), ds.y().to_vec());

        // Feature 0 carries the class, so its weights separate the classes most
        let w = model.coefficients();
        assert_eq!(w.dim(), (2, 2));
        assert!(w[[0, 1]] - w[[0, 0]] > (w[[1, 1]] - w[[1, 0]]).abs());
    }

    #[test]
    fn test_errors() {
        assert!(LogisticRegression::new(SampleShape::new(1, 2), 1, 0.0).is_err());
        assert!(LogisticRegression::new(SampleShape::new(1, 2), 2, -1.0).is_err());

        let model = LogisticRegression::new(SampleShape::new(1, 2), 2, 0.0).unwrap();
        // Not prepared yet
        assert!(model.predict_proba(array![[1.0, 2.0]].view()).is_err());
        assert!(matches!(
            model.predict_proba(array![[1.0, 2.0, 3.0]].view()),
            Err(EegError::FeatureMismatch { expected: 2, actual: 3 })
        ));
    }
}
