//! Adam optimizer with explicit per-group state.
//!
//! Each group owns its step count and first/second moment estimates. Groups
//! are created per learnable parameter (single pose) or per parameter kind
//! (trajectory positions, trajectory quaternions), each with its own rate.

use serde::{Deserialize, Serialize};

/// Moment decay rates and denominator floor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdamConfig {
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

/// State of one parameter group.
#[derive(Debug, Clone)]
pub struct AdamGroup {
    lr: f64,
    config: AdamConfig,
    step: u32,
    m: Vec<f64>,
    v: Vec<f64>,
}

impl AdamGroup {
    pub fn new(len: usize, lr: f64, config: AdamConfig) -> Self {
        Self {
            lr,
            config,
            step: 0,
            m: vec![0.0; len],
            v: vec![0.0; len],
        }
    }

    pub fn lr(&self) -> f64 {
        self.lr
    }

    /// Number of updates applied so far.
    pub fn steps(&self) -> u32 {
        self.step
    }

    pub fn len(&self) -> usize {
        self.m.len()
    }

    pub fn is_empty(&self) -> bool {
        self.m.is_empty()
    }

    /// A zero learning rate freezes the group.
    pub fn is_frozen(&self) -> bool {
        self.lr == 0.0
    }

    pub fn first_moment(&self) -> &[f64] {
        &self.m
    }

    pub fn second_moment(&self) -> &[f64] {
        &self.v
    }

    /// Apply one bias-corrected Adam update in place.
    ///
    /// Frozen groups are left untouched, moments included.
    pub fn step(&mut self, params: &mut [f64], grads: &[f64]) {
        debug_assert_eq!(params.len(), self.m.len());
        debug_assert_eq!(grads.len(), self.m.len());

        if self.is_frozen() {
            return;
        }

        self.step += 1;
        let AdamConfig {
            beta1,
            beta2,
            epsilon,
        } = self.config;
        let bias1 = 1.0 - beta1.powi(self.step as i32);
        let bias2 = 1.0 - beta2.powi(self.step as i32);

        for (i, (p, g)) in params.iter_mut().zip(grads).enumerate() {
            self.m[i] = beta1 * self.m[i] + (1.0 - beta1) * g;
            self.v[i] = beta2 * self.v[i] + (1.0 - beta2) * g * g;
            let m_hat = self.m[i] / bias1;
            let v_hat = self.v[i] / bias2;
            *p -= self.lr * m_hat / (v_hat.sqrt() + epsilon);
        }
    }
}
