//! Classifier trait and shared softmax helpers

use crate::dataset::{Dataset, SampleShape};
use crate::optim::Adam;
use eeg_core::{EegError, EegResult};
use ndarray::{Array2, ArrayView2, Axis};

/// A trainable multi-class model over flattened channel x time samples
pub trait Classifier {
    fn name(&self) -> &str;

    /// Sample layout the model was built for
    fn sample_shape(&self) -> SampleShape;

    fn n_classes(&self) -> usize;

    /// Fit data-dependent state (scalers) on the training split
    fn prepare(&mut self, _train: &Dataset) -> EegResult<()> {
        Ok(())
    }

    /// One optimisation step on a batch; returns the mean batch loss
    fn train_batch(&mut self, x: ArrayView2<'_, f64>, y: &[usize], optimizer: &mut Adam) -> EegResult<f64>;

    /// Class probabilities, one row per sample
    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> EegResult<Array2<f64>>;

    fn predict(&self, x: ArrayView2<'_, f64>) -> EegResult<Vec<usize>> {
        Ok(argmax_rows(&self.predict_proba(x)?))
    }
}

pub(crate) fn check_features(shape: SampleShape, x: &ArrayView2<'_, f64>) -> EegResult<()> {
    if x.ncols() != shape.n_features() {
        return Err(EegError::FeatureMismatch {
            expected: shape.n_features(),
            actual: x.ncols(),
        });
    }
    Ok(())
}

/// Numerically stable row-wise softmax, in place
pub fn softmax_rows(logits: &mut Array2<f64>) {
    for mut row in logits.axis_iter_mut(Axis(0)) {
        let max = row.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
}

/// Mean negative log-likelihood of the true classes
pub fn cross_entropy(proba: &Array2<f64>, y: &[usize]) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    let total: f64 = y
        .iter()
        .enumerate()
        .map(|(i, &label)| -proba[[i, label]].max(1e-12).ln())
        .sum();
    total / y.len() as f64
}

pub fn argmax_rows(proba: &Array2<f64>) -> Vec<usize> {
    proba
        .rows()
        .into_iter()
        .map(|row| {
            // First maximum wins on ties
            row.iter()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |best, (i, &p)| if p > best.1 { (i, p) } else { best })
                .0
        })
        .collect()
}

pub fn accuracy(predicted: &[usize], y: &[usize]) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    let correct = predicted.iter().zip(y).filter(|(p, t)| p == t).count();
    correct as f64 / y.len() as f64
}

/// Gradient of mean cross-entropy w.r.t. the logits: (p - onehot) / n
pub(crate) fn softmax_grad(proba: &Array2<f64>, y: &[usize]) -> Array2<f64> {
    let n = y.len().max(1) as f64;
    let mut grad = proba.clone();
    for (i, &label) in y.iter().enumerate() {
        grad[[i, label]] -= 1.0;
    }
    grad.mapv_inplace(|g| g / n);
    grad
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_softmax_and_loss() {
        let mut logits = array![[1000.0, 1000.0], [0.0, (3.0f64).ln()]];
        softmax_rows(&mut logits);
        assert!((logits[[0, 0]] - 0.5).abs() < 1e-12);
        assert!((logits[[1, 1]] - 0.75).abs() < 1e-12);

        let loss = cross_entropy(&logits, &[0, 1]);
        assert!((loss - (-(0.5f64.ln()) - 0.75f64.ln()) / 2.0).abs() < 1e-12);

        assert_eq!(argmax_rows(&logits), vec![0, 1]);
        assert_eq!(accuracy(&[0, 1, 1], &[0, 0, 1]), 2.0 / 3.0);

        let grad = softmax_grad(&logits, &[0, 1]);
        assert!((grad[[1, 1]] - (-0.25 / 2.0)).abs() < 1e-12);
        assert!(grad.rows().into_iter().all(|r| r.sum().abs() < 1e-12));
    }
}
