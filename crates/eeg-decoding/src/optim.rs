//! Adam optimizer with decoupled weight decay

use eeg_core::{EegError, EegResult};
use ndarray::{Array, ArrayD, Dimension, Zip};
use serde::{Deserialize, Serialize};

/// Adam hyper-parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdamConfig {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    /// Decoupled (AdamW) decay, applied to slots registered with `decay = true`
    pub weight_decay: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            weight_decay: 0.0,
        }
    }
}

/// Adam state. Parameters are addressed by slot index, one per tensor.
#[derive(Debug, Clone)]
pub struct Adam {
    config: AdamConfig,
    first_moments: Vec<Option<ArrayD<f64>>>,
    second_moments: Vec<Option<ArrayD<f64>>>,
    t: u64,
}

impl Adam {
    pub fn new(config: AdamConfig) -> Self {
        Self {
            config,
            first_moments: Vec::new(),
            second_moments: Vec::new(),
            t: 0,
        }
    }

    pub fn config(&self) -> &AdamConfig {
        &self.config
    }

    pub fn steps(&self) -> u64 {
        self.t
    }

    /// Advance the step counter; call once per batch, before `update`
    pub fn begin_step(&mut self) {
        self.t += 1;
    }

    pub fn update<D: Dimension>(
        &mut self,
        slot: usize,
        param: &mut Array<f64, D>,
        grad: &Array<f64, D>,
        decay: bool,
    ) -> EegResult<()> {
        if param.shape() != grad.shape() {
            return Err(EegError::TrainingError {
                message: format!(
                    "Gradient shape {:?} does not match parameter shape {:?} (slot {})",
                    grad.shape(),
                    param.shape(),
                    slot
                ),
            });
        }
        if self.t == 0 {
            return Err(EegError::TrainingError {
                message: "Adam::update called before begin_step".to_string(),
            });
        }

        if self.first_moments.len() <= slot {
            self.first_moments.resize(slot + 1, None);
            self.second_moments.resize(slot + 1, None);
        }
        let m = self.first_moments[slot].get_or_insert_with(|| ArrayD::zeros(param.shape()));
        let v = self.second_moments[slot].get_or_insert_with(|| ArrayD::zeros(param.shape()));
        if m.shape() != param.shape() {
            return Err(EegError::TrainingError {
                message: format!("Slot {} reused for a differently shaped parameter", slot),
            });
        }

        let AdamConfig { learning_rate, beta1, beta2, epsilon, weight_decay } = self.config;
        let bias1 = 1.0 - beta1.powi(self.t as i32);
        let bias2 = 1.0 - beta2.powi(self.t as i32);
        let decay_rate = if decay { learning_rate * weight_decay } else { 0.0 };

        let mut p = param.view_mut().into_dyn();
        let g = grad.view().into_dyn();
        Zip::from(&mut p).and(&g).and(m).and(v).for_each(|p, &g, m, v| {
            *m = beta1 * *m + (1.0 - beta1) * g;
            *v = beta2 * *v + (1.0 - beta2) * g * g;
            let m_hat = *m / bias1;
            let v_hat = *v / bias2;
            *p -= learning_rate * m_hat / (v_hat.sqrt() + epsilon) + decay_rate * *p;
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    #[test]
    fn test_minimises_quadratic() {
        let mut adam = Adam::new(AdamConfig { learning_rate: 0.1, ..Default::default() });
        let mut x = array![3.0, -2.0];
        for _ in 0..500 {
            let grad: Array1<f64> = 2.0 * &x;
            adam.begin_step();
            adam.update(0, &mut x, &grad, false).unwrap();
        }
        assert!(x.iter().all(|v| v.abs() < 5e-2), "{:?}", x);
    }

    #[test]
    fn test_first_step_size_and_decay() {
        // First Adam step moves each coordinate by ~lr regardless of gradient scale
        let mut adam = Adam::new(AdamConfig { learning_rate: 0.01, ..Default::default() });
        let mut x = array![1.0, 1.0];
        adam.begin_step();
        adam.update(0, &mut x, &array![1e-4, 50.0], false).unwrap();
        assert!((x[0] - 0.99).abs() < 1e-5);
        assert!((x[1] - 0.99).abs() < 1e-5);

        // Zero gradient with decay shrinks the parameter
        let mut adam = Adam::new(AdamConfig { learning_rate: 0.1, weight_decay: 0.5, ..Default::default() });
        let mut w = array![2.0];
        adam.begin_step();
        adam.update(0, &mut w, &array![0.0], true).unwrap();
        assert!((w[0] - 1.9).abs() < 1e-12);
    }

    #[test]
    fn test_shape_errors() {
        let mut adam = Adam::new(AdamConfig::default());
        let mut x = array![1.0, 2.0];
        assert!(adam.update(0, &mut x, &array![1.0, 1.0], false).is_err());
        adam.begin_step();
        assert!(adam.update(0, &mut x, &array![1.0], false).is_err());
        adam.update(0, &mut x, &array![1.0, 1.0], false).unwrap();
        let mut y = array![1.0, 2.0, 3.0];
        assert!(adam.update(0, &mut y, &array![0.0, 0.0, 0.0], false).is_err());
    }
}
