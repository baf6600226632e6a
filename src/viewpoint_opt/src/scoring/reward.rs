//! Distance-based reward for visible points.
//!
//! Each visible point earns `r = exp(-(d - μ)² / (2σ²))`, a Gaussian in the
//! point's distance `d` to the camera centered on the preferred observation
//! distance `μ`. The solver minimizes, so the objective is the negated sum (or
//! mean) of rewards.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Gaussian reward parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardParams {
    /// Preferred observation distance (`dist_rewards_mean`).
    pub mean: f64,
    /// Gaussian width (`dist_rewards_sigma`).
    pub sigma: f64,
    /// Floor added to denominators.
    pub eps: f64,
}

impl Default for RewardParams {
    fn default() -> Self {
        Self {
            mean: 3.0,
            sigma: 2.0,
            eps: 1e-6,
        }
    }
}

impl RewardParams {
    #[inline]
    fn denominator(&self) -> f64 {
        (2.0 * self.sigma * self.sigma).max(self.eps)
    }

    /// Reward for a point at `distance`.
    #[inline]
    pub fn reward(&self, distance: f64) -> f64 {
        let diff = distance - self.mean;
        (-(diff * diff) / self.denominator()).exp()
    }

    /// Reward and its derivative with respect to the distance.
    #[inline]
    pub fn reward_with_derivative(&self, distance: f64) -> (f64, f64) {
        let denom = self.denominator();
        let diff = distance - self.mean;
        let r = (-(diff * diff) / denom).exp();
        (r, -2.0 * diff / denom * r)
    }
}

/// Which distance the reward is a function of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardDistance {
    /// Camera-forward component (z in the camera frame).
    #[default]
    Depth,
    /// Euclidean distance to the camera center.
    Range,
}

impl RewardDistance {
    #[inline]
    pub fn measure(self, camera: &Vector3<f64>) -> f64 {
        match self {
            RewardDistance::Depth => camera.z,
            RewardDistance::Range => camera.norm(),
        }
    }

    /// `∂d/∂p_c` for a camera-frame point.
    #[inline]
    pub fn gradient(self, camera: &Vector3<f64>, eps: f64) -> Vector3<f64> {
        match self {
            RewardDistance::Depth => Vector3::z(),
            RewardDistance::Range => camera / camera.norm().max(eps),
        }
    }
}

/// How per-point rewards are combined into the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// `-Σ r`
    #[default]
    Sum,
    /// `-Σ r / (n + eps)`
    Mean,
}

/// Complete reward model: per-point Gaussian plus aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RewardModel {
    pub params: RewardParams,
    pub distance: RewardDistance,
    pub aggregation: Aggregation,
}

impl RewardModel {
    pub fn new(params: RewardParams, distance: RewardDistance, aggregation: Aggregation) -> Self {
        Self {
            params,
            distance,
            aggregation,
        }
    }

    /// Reward of one camera-frame point.
    #[inline]
    pub fn point_reward(&self, camera: &Vector3<f64>) -> f64 {
        self.params.reward(self.distance.measure(camera))
    }

    /// Reward of one camera-frame point and `∂r/∂p_c`.
    #[inline]
    pub fn point_reward_gradient(&self, camera: &Vector3<f64>) -> (f64, Vector3<f64>) {
        let d = self.distance.measure(camera);
        let (r, dr_dd) = self.params.reward_with_derivative(d);
        (r, self.distance.gradient(camera, self.params.eps) * dr_dd)
    }

    /// Factor `w` such that `objective = -w * Σ r` for `num_visible` points.
    #[inline]
    pub fn objective_weight(&self, num_visible: usize) -> f64 {
        match self.aggregation {
            Aggregation::Sum => 1.0,
            Aggregation::Mean => 1.0 / (num_visible as f64 + self.params.eps),
        }
    }

    /// Objective for a set of per-point rewards. An empty set scores zero.
    pub fn objective(&self, rewards: &[f64]) -> f64 {
        if rewards.is_empty() {
            return 0.0;
        }
        -self.objective_weight(rewards.len()) * rewards.iter().sum::<f64>()
    }
}
