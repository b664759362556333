//! Labelled sample matrices for classifiers

use eeg_core::{EegError, EegResult};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Layout of one flattened sample (row-major channel x time)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleShape {
    pub channels: usize,
    pub times: usize,
}

impl SampleShape {
    pub fn new(channels: usize, times: usize) -> Self {
        Self { channels, times }
    }

    pub fn n_features(&self) -> usize {
        self.channels * self.times
    }

    pub fn as_tuple(&self) -> (usize, usize) {
        (self.channels, self.times)
    }
}

/// Samples, integer class labels and class names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    x: Array2<f64>,
    y: Vec<usize>,
    shape: SampleShape,
    class_names: Vec<String>,
    /// Source trial of every sample
    groups: Vec<usize>,
}

impl Dataset {
    pub fn new(
        x: Array2<f64>,
        y: Vec<usize>,
        shape: SampleShape,
        class_names: Vec<String>,
    ) -> EegResult<Self> {
        let groups = (0..x.nrows()).collect();
        Self::with_groups(x, y, shape, class_names, groups)
    }

    /// Dataset whose samples are tagged with the trial they were cut from
    pub fn with_groups(
        x: Array2<f64>,
        y: Vec<usize>,
        shape: SampleShape,
        class_names: Vec<String>,
        groups: Vec<usize>,
    ) -> EegResult<Self> {
        if x.ncols() != shape.n_features() {
            return Err(EegError::FeatureMismatch {
                expected: shape.n_features(),
                actual: x.ncols(),
            });
        }
        if y.len() != x.nrows() || groups.len() != x.nrows() {
            return Err(EegError::InvalidSignalData {
                reason: format!(
                    "{} samples but {} labels and {} groups",
                    x.nrows(),
                    y.len(),
                    groups.len()
                ),
            });
        }
        if class_names.is_empty() {
            return Err(EegError::MissingParameter { name: "dataset.class_names".to_string() });
        }
        if let Some(&bad) = y.iter().find(|&&label| label >= class_names.len()) {
            return Err(EegError::TrainingError {
                message: format!("Label {} outside {} classes", bad, class_names.len()),
            });
        }

        Ok(Self { x, y, shape, class_names, groups })
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn x(&self) -> &Array2<f64> {
        &self.x
    }

    pub fn y(&self) -> &[usize] {
        &self.y
    }

    pub fn shape(&self) -> SampleShape {
        self.shape
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn n_classes(&self) -> usize {
        self.class_names.len()
    }

    pub fn groups(&self) -> &[usize] {
        &self.groups
    }

    /// One flattened sample
    pub fn sample(&self, index: usize) -> ArrayView1<'_, f64> {
        self.x.row(index)
    }

    /// One sample reshaped to channel x time
    pub fn sample_2d(&self, index: usize) -> EegResult<ArrayView2<'_, f64>> {
        self.x
            .row(index)
            .into_shape_with_order((self.shape.channels, self.shape.times))
            .map_err(|e| EegError::ProcessingError { message: e.to_string() })
    }

    /// Samples per class, indexed like `class_names`
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes()];
        for &label in &self.y {
            counts[label] += 1;
        }
        counts
    }

    /// New dataset holding the given rows, in order
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            x: self.x.select(Axis(0), indices),
            y: indices.iter().map(|&i| self.y[i]).collect(),
            shape: self.shape,
            class_names: self.class_names.clone(),
            groups: indices.iter().map(|&i| self.groups[i]).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["A".to_string(), "B".to_string()]
    }

    #[test]
    fn test_dataset_validation() {
        let shape = SampleShape::new(2, 3);
        let x = Array2::zeros((4, 6));
        let ds = Dataset::new(x.clone(), vec![0, 1, 1, 0], shape, names()).unwrap();
        assert_eq!(ds.len(), 4);
        assert_eq!(ds.class_counts(), vec![2, 2]);
        assert_eq!(ds.groups(), &[0, 1, 2, 3]);

        assert!(matches!(
            Dataset::new(Array2::zeros((4, 5)), vec![0; 4], shape, names()),
            Err(EegError::FeatureMismatch { expected: 6, actual: 5 })
        ));
        assert!(Dataset::new(x.clone(), vec![0; 3], shape, names()).is_err());
        assert!(matches!(
            Dataset::new(x, vec![0, 1, 2, 0], shape, names()),
            Err(EegError::TrainingError { .. })
        ));
    }

    #[test]
    fn test_subset_and_reshape() {
        let shape = SampleShape::new(2, 2);
        let x = Array2::from_shape_fn((3, 4), |(i, j)| (i * 10 + j) as f64);
        let ds = Dataset::new(x, vec![0, 1, 0], shape, names()).unwrap();

        let sub = ds.subset(&[2, 0]);
        assert_eq!(sub.y(), &[0, 0]);
        assert_eq!(sub.sample(0)[0], 20.0);
        assert_eq!(sub.groups(), &[2, 0]);

        let sample = ds.sample_2d(1).unwrap();
        assert_eq!(sample[[1, 0]], 12.0);
    }
}
