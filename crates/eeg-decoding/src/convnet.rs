//! Shallow convolutional network for band-power style decoding
//!
//! Temporal convolution, per-filter spatial projection, squaring, mean pooling
//! and a log non-linearity feed a dense softmax layer. Gradients are derived
//! by hand; everything runs single-threaded so a fixed seed reproduces a run.

use crate::classifier::{check_features, cross_entropy, softmax_grad, Classifier};
use crate::dataset::{Dataset, SampleShape};
use crate::optim::Adam;
use eeg_core::{EegError, EegResult};
use ndarray::{s, Array1, Array2, Array3, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::debug;

const LOG_FLOOR: f64 = 1e-6;

/// Architecture and initialisation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvNetConfig {
    pub n_filters: usize,
    /// Temporal kernel length in samples
    pub filter_length: usize,
    /// Pooling window in samples
    pub pool_length: usize,
    pub pool_stride: usize,
    pub seed: u64,
}

impl Default for ConvNetConfig {
    fn default() -> Self {
        Self {
            n_filters: 8,
            filter_length: 11,
            pool_length: 15,
            pool_stride: 5,
            seed: 42,
        }
    }
}

impl ConvNetConfig {
    pub fn validate(&self, shape: SampleShape) -> EegResult<()> {
        if self.n_filters == 0 || self.filter_length == 0 || self.pool_length == 0 || self.pool_stride == 0 {
            return Err(EegError::ConfigurationError {
                message: "Filter count, filter length, pool length and stride must be positive".to_string(),
            });
        }
        if shape.channels == 0 || self.filter_length > shape.times {
            return Err(EegError::ConfigurationError {
                message: format!(
                    "Filter length {} does not fit samples of {} time points",
                    self.filter_length, shape.times
                ),
            });
        }
        if self.pool_length > shape.times - self.filter_length + 1 {
            return Err(EegError::ConfigurationError {
                message: format!(
                    "Pool length {} exceeds convolution output of {} samples",
                    self.pool_length,
                    shape.times - self.filter_length + 1
                ),
            });
        }
        Ok(())
    }
}

/// Activations kept for the backward pass of one sample
struct Forward {
    /// scaled input, channels x times
    input: Array2<f64>,
    /// temporal convolution, filters x channels x conv_len
    temporal_out: Array3<f64>,
    /// spatial projection, filters x conv_len
    spatial_out: Array2<f64>,
    /// filters x n_pools
    pooled: Array2<f64>,
    features: Array1<f64>,
    logits: Array1<f64>,
}

struct Gradients {
    temporal: Array2<f64>,
    spatial: Array2<f64>,
    spatial_bias: Array1<f64>,
    dense: Array2<f64>,
    dense_bias: Array1<f64>,
}

#[derive(Debug, Clone)]
pub struct ShallowConvNet {
    config: ConvNetConfig,
    shape: SampleShape,
    n_classes: usize,
    conv_len: usize,
    n_pools: usize,
    /// filters x filter_length
    temporal: Array2<f64>,
    /// filters x channels
    spatial: Array2<f64>,
    spatial_bias: Array1<f64>,
    /// classes x (filters * n_pools)
    dense: Array2<f64>,
    dense_bias: Array1<f64>,
    input_scale: f64,
}

fn xavier(rng: &mut StdRng, rows: usize, cols: usize, fan_in: usize, fan_out: usize) -> EegResult<Array2<f64>> {
    let std = (2.0 / (fan_in + fan_out) as f64).sqrt();
    let normal = Normal::new(0.0, std).map_err(|e| EegError::ConfigurationError {
        message: format!("Invalid initialisation scale: {}", e),
    })?;
    Ok(Array2::from_shape_simple_fn((rows, cols), || normal.sample(&mut *rng)))
}

impl ShallowConvNet {
    pub fn new(shape: SampleShape, n_classes: usize, config: ConvNetConfig) -> EegResult<Self> {
        config.validate(shape)?;
        if n_classes < 2 {
            return Err(EegError::ConfigurationError {
                message: format!("Need at least 2 classes, got {}", n_classes),
            });
        }

        let conv_len = shape.times - config.filter_length + 1;
        let n_pools = (conv_len - config.pool_length) / config.pool_stride + 1;
        let n_features = config.n_filters * n_pools;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let temporal = xavier(&mut rng, config.n_filters, config.filter_length, config.filter_length, config.n_filters)?;
        let spatial = xavier(&mut rng, config.n_filters, shape.channels, shape.channels, 1)?;
        let dense = xavier(&mut rng, n_classes, n_features, n_features, n_classes)?;

        debug!(conv_len, n_pools, n_features, "built shallow convnet");
        Ok(Self {
            config,
            shape,
            n_classes,
            conv_len,
            n_pools,
            temporal,
            spatial,
            spatial_bias: Array1::zeros(config.n_filters),
            dense,
            dense_bias: Array1::zeros(n_classes),
            input_scale: 1.0,
        })
    }

    pub fn config(&self) -> &ConvNetConfig {
        &self.config
    }

    pub fn n_parameters(&self) -> usize {
        self.temporal.len() + self.spatial.len() + self.spatial_bias.len() + self.dense.len() + self.dense_bias.len()
    }

    fn forward(&self, sample: ArrayView2<'_, f64>) -> Forward {
        let n_filters = self.config.n_filters;
        let input = sample.mapv(|v| v * self.input_scale);

        let mut temporal_out = Array3::<f64>::zeros((n_filters, self.shape.channels, self.conv_len));
        for f in 0..n_filters {
            for (k, &w) in self.temporal.row(f).iter().enumerate() {
                let shifted = input.slice(s![.., k..k + self.conv_len]);
                temporal_out
                    .slice_mut(s![f, .., ..])
                    .scaled_add(w, &shifted);
            }
        }

        let mut spatial_out = Array2::<f64>::zeros((n_filters, self.conv_len));
        for f in 0..n_filters {
            let projected = self.spatial.row(f).dot(&temporal_out.slice(s![f, .., ..]));
            spatial_out
                .row_mut(f)
                .assign(&projected.mapv(|v| v + self.spatial_bias[f]));
        }

        let mut pooled = Array2::<f64>::zeros((n_filters, self.n_pools));
        for f in 0..n_filters {
            for j in 0..self.n_pools {
                let start = j * self.config.pool_stride;
                let window = spatial_out.slice(s![f, start..start + self.config.pool_length]);
                pooled[[f, j]] = window.mapv(|v| v * v).mean().unwrap_or(0.0);
            }
        }

        let features = pooled.iter().map(|&p| (p + LOG_FLOOR).ln()).collect::<Array1<f64>>();
        let logits = self.dense.dot(&features) + &self.dense_bias;

        Forward { input, temporal_out, spatial_out, pooled, features, logits }
    }

    fn loss_and_gradients(&self, x: ArrayView2<'_, f64>, y: &[usize]) -> EegResult<(f64, Gradients)> {
        let n_filters = self.config.n_filters;
        let pool_length = self.config.pool_length;

        let mut passes = Vec::with_capacity(x.nrows());
        let mut proba = Array2::<f64>::zeros((x.nrows(), self.n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            let sample = row
                .into_shape_with_order((self.shape.channels, self.shape.times))
                .map_err(|e| EegError::ProcessingError { message: e.to_string() })?;
            let pass = self.forward(sample);
            proba.row_mut(i).assign(&pass.logits);
            passes.push(pass);
        }
        crate::classifier::softmax_rows(&mut proba);
        let loss = cross_entropy(&proba, y);
        let grad_logits = softmax_grad(&proba, y);

        let mut grads = Gradients {
            temporal: Array2::zeros(self.temporal.raw_dim()),
            spatial: Array2::zeros(self.spatial.raw_dim()),
            spatial_bias: Array1::zeros(n_filters),
            dense: Array2::zeros(self.dense.raw_dim()),
            dense_bias: Array1::zeros(self.n_classes),
        };

        for (pass, d_logits) in passes.iter().zip(grad_logits.rows()) {
            // Dense layer
            for (k, &dl) in d_logits.iter().enumerate() {
                grads.dense.row_mut(k).scaled_add(dl, &pass.features);
            }
            grads.dense_bias += &d_logits;
            let d_features = self.dense.t().dot(&d_logits);

            // log, mean pooling and squaring
            let mut d_spatial = Array2::<f64>::zeros((n_filters, self.conv_len));
            for f in 0..n_filters {
                for j in 0..self.n_pools {
                    let idx = f * self.n_pools + j;
                    let d_pool = d_features[idx] / (pass.pooled[[f, j]] + LOG_FLOOR);
                    let start = j * self.config.pool_stride;
                    for t in start..start + pool_length {
                        d_spatial[[f, t]] += d_pool * 2.0 * pass.spatial_out[[f, t]] / pool_length as f64;
                    }
                }
            }

            for f in 0..n_filters {
                let d_row = d_spatial.row(f);
                grads.spatial_bias[f] += d_row.sum();

                let temporal_f = pass.temporal_out.slice(s![f, .., ..]);
                let d_spatial_w = temporal_f.dot(&d_row);
                grads.spatial.row_mut(f).scaled_add(1.0, &d_spatial_w);

                // d temporal[f, k] = sum_t d_row[t] * sum_c spatial[f, c] * input[c, t + k]
                let mixed = self.spatial.row(f).dot(&pass.input);
                for k in 0..self.config.filter_length {
                    grads.temporal[[f, k]] += d_row.dot(&mixed.slice(s![k..k + self.conv_len]));
                }
            }
        }

        Ok((loss, grads))
    }
}

impl Classifier for ShallowConvNet {
    fn name(&self) -> &str {
        "shallow_convnet"
    }

    fn sample_shape(&self) -> SampleShape {
        self.shape
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Rescale inputs to unit global standard deviation
    fn prepare(&mut self, train: &Dataset) -> EegResult<()> {
        let std = train.x().std(0.0);
        self.input_scale = if std > f64::EPSILON { 1.0 / std } else { 1.0 };
        Ok(())
    }

    fn train_batch(&mut self, x: ArrayView2<'_, f64>, y: &[usize], optimizer: &mut Adam) -> EegResult<f64> {
        check_features(self.shape, &x)?;
        if let Some(&bad) = y.iter().find(|&&label| label >= self.n_classes) {
            return Err(EegError::TrainingError {
                message: format!("Label {} outside {} classes", bad, self.n_classes),
            });
        }

        let (loss, grads) = self.loss_and_gradients(x, y)?;
        optimizer.begin_step();
        optimizer.update(0, &mut self.temporal, &grads.temporal, true)?;
        optimizer.update(1, &mut self.spatial, &grads.spatial, true)?;
        optimizer.update(2, &mut self.spatial_bias, &grads.spatial_bias, false)?;
        optimizer.update(3, &mut self.dense, &grads.dense, true)?;
        optimizer.update(4, &mut self.dense_bias, &grads.dense_bias, false)?;
        Ok(loss)
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> EegResult<Array2<f64>> {
        check_features(self.shape, &x)?;
        let mut proba = Array2::<f64>::zeros((x.nrows(), self.n_classes));
        for (row, mut out) in x.axis_iter(Axis(0)).zip(proba.rows_mut()) {
            let sample = row
                .into_shape_with_order((self.shape.channels, self.shape.times))
                .map_err(|e| EegError::ProcessingError { message: e.to_string() })?;
            out.assign(&self.forward(sample).logits);
        }
        crate::classifier::softmax_rows(&mut proba);
        Ok(proba)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optim::AdamConfig;
    use std::f64::consts::PI;

    fn small_config() -> ConvNetConfig {
        ConvNetConfig { n_filters: 3, filter_length: 5, pool_length: 8, pool_stride: 4, seed: 7 }
    }

    /// Class 0 oscillates on channel 0, class 1 on channel 1
    fn oscillation_dataset(n: usize) -> Dataset {
        let shape = SampleShape::new(2, 40);
        let x = Array2::from_shape_fn((n, shape.n_features()), |(i, f)| {
            let (c, t) = (f / shape.times, f % shape.times);
            let active = i % 2 == c;
            let phase = i as f64 * 0.7;
            let amp = if active { 1.0 } else { 0.2 };
            amp * (2.0 * PI * t as f64 / 8.0 + phase).sin() + 0.05 * ((i * 31 + f * 17) % 13) as f64 / 13.0
        });
        let y = (0..n).map(|i| i % 2).collect();
        Dataset::new(x, y, shape, vec!["left".into(), "right".into()]).unwrap()
    }

    #[test]
    fn test_config_validation() {
        let shape = SampleShape::new(2, 20);
        assert!(ShallowConvNet::new(shape, 2, ConvNetConfig { filter_length: 21, ..small_config() }).is_err());
        assert!(ShallowConvNet::new(shape, 2, ConvNetConfig { pool_length: 17, ..small_config() }).is_err());
        assert!(ShallowConvNet::new(shape, 2, ConvNetConfig { pool_stride: 0, ..small_config() }).is_err());
        assert!(ShallowConvNet::new(shape, 1, small_config()).is_err());

        let net = ShallowConvNet::new(shape, 2, small_config()).unwrap();
        assert_eq!(net.conv_len, 16);
        assert_eq!(net.n_pools, 3);
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let ds = oscillation_dataset(4);
        let mut net = ShallowConvNet::new(ds.shape(), 2, small_config()).unwrap();
        net.prepare(&ds).unwrap();
        let (_, grads) = net.loss_and_gradients(ds.x().view(), ds.y()).unwrap();

        let h = 1e-6;
        let numeric = |net: &ShallowConvNet| net.loss_and_gradients(ds.x().view(), ds.y()).unwrap().0;

        let mut probe = net.clone();
        probe.temporal[[1, 2]] += h;
        let up = numeric(&probe);
        probe.temporal[[1, 2]] -= 2.0 * h;
        let down = numeric(&probe);
        let fd = (up - down) / (2.0 * h);
        assert!((fd - grads.temporal[[1, 2]]).abs() < 1e-5 * (1.0 + fd.abs()), "temporal {} vs {}", fd, grads.temporal[[1, 2]]);

        let mut probe = net.clone();
        probe.spatial[[0, 1]] += h;
        let up = numeric(&probe);
        probe.spatial[[0, 1]] -= 2.0 * h;
        let down = numeric(&probe);
        let fd = (up - down) / (2.0 * h);
        assert!((fd - grads.spatial[[0, 1]]).abs() < 1e-5 * (1.0 + fd.abs()), "spatial {} vs {}", fd, grads.spatial[[0, 1]]);

        let mut probe = net.clone();
        probe.spatial_bias[2] += h;
        let up = numeric(&probe);
        probe.spatial_bias[2] -= 2.0 * h;
        let down = numeric(&probe);
        let fd = (up - down) / (2.0 * h);
        assert!((fd - grads.spatial_bias[2]).abs() < 1e-5 * (1.0 + fd.abs()));

        let mut probe = net.clone();
        probe.dense[[1, 3]] += h;
        let up = numeric(&probe);
        probe.dense[[1, 3]] -= 2.0 * h;
        let down = numeric(&probe);
        let fd = (up - down) / (2.0 * h);
        assert!((fd - grads.dense[[1, 3]]).abs() < 1e-5 * (1.0 + fd.abs()));
    }

    #[test]
    fn test_training_reduces_loss() {
        let ds = oscillation_dataset(20);
        let mut net = ShallowConvNet::new(ds.shape(), 2, small_config()).unwrap();
        net.prepare(&ds).unwrap();
        let mut adam = Adam::new(AdamConfig { learning_rate: 0.02, ..Default::default() });

        let first = net.train_batch(ds.x().view(), ds.y(), &mut adam).unwrap();
        let mut last = first;
        for _ in 0..150 {
            last = net.train_batch(ds.x().view(), ds.y(), &mut adam).unwrap();
        }
        assert!(last < 0.5 * first, "loss {} -> {}", first, last);

        let proba = net.predict_proba(ds.x().view()).unwrap();
        assert!(proba.rows().into_iter().all(|r| (r.sum() - 1.0).abs() < 1e-9));
    }

    #[test]
    fn test_seed_reproducible_init() {
        let shape = SampleShape::new(2, 40);
        let a = ShallowConvNet::new(shape, 2, small_config()).unwrap();
        let b = ShallowConvNet::new(shape, 2, small_config()).unwrap();
        assert_eq!(a.temporal, b.temporal);
        assert_eq!(a.dense, b.dense);
        assert_eq!(a.n_parameters(), 3 * 5 + 3 * 2 + 3 + 2 * (3 * 8) + 2);
    }
}
