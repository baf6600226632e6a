//! Path regularization for trajectory optimization.
//!
//! Two penalties on waypoint positions:
//! - Smoothness: `Σ ‖p[i+1] - 2 p[i] + p[i-1]‖²`, the squared second difference,
//!   which is zero for equally spaced collinear waypoints and grows with sharp turns
//! - Length: `Σ ‖p[i+1] - p[i]‖`, the total path length
//!
//! Orientations are not regularized.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Weights of the path penalties.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegularizationConfig {
    pub smooth_weight: f64,
    pub length_weight: f64,
    /// Floor on segment length in the length gradient.
    pub eps: f64,
}

impl Default for RegularizationConfig {
    fn default() -> Self {
        Self {
            smooth_weight: 14.0,
            length_weight: 0.02,
            eps: 1e-6,
        }
    }
}

/// Value and per-waypoint gradient of a path penalty.
#[derive(Debug, Clone, PartialEq)]
pub struct PathPenalty {
    pub value: f64,
    pub gradient: Vec<Vector3<f64>>,
}

impl PathPenalty {
    fn zeros(len: usize) -> Self {
        Self {
            value: 0.0,
            gradient: vec![Vector3::zeros(); len],
        }
    }
}

/// Squared second differences of consecutive positions.
pub fn smoothness_penalty(positions: &[Vector3<f64>]) -> PathPenalty {
    let mut penalty = PathPenalty::zeros(positions.len());

    for i in 1..positions.len().saturating_sub(1) {
        let accel = positions[i + 1] - positions[i] * 2.0 + positions[i - 1];
        penalty.value += accel.norm_squared();

        let g = accel * 2.0;
        penalty.gradient[i - 1] += g;
        penalty.gradient[i] -= g * 2.0;
        penalty.gradient[i + 1] += g;
    }

    penalty
}

/// Sum of segment lengths.
pub fn length_penalty(positions: &[Vector3<f64>], eps: f64) -> PathPenalty {
    let mut penalty = PathPenalty::zeros(positions.len());

    for i in 0..positions.len().saturating_sub(1) {
        let segment = positions[i + 1] - positions[i];
        let length = segment.norm();
        penalty.value += length;

        let direction = segment / length.max(eps);
        penalty.gradient[i] -= direction;
        penalty.gradient[i + 1] += direction;
    }

    penalty
}

impl RegularizationConfig {
    /// Weighted sum of both penalties.
    ///
    /// # Returns
    /// `(total, smoothness, length, gradient)` where `total` and `gradient`
    /// include the weights and the two penalty values do not.
    pub fn evaluate(&self, positions: &[Vector3<f64>]) -> (f64, f64, f64, Vec<Vector3<f64>>) {
        let smooth = smoothness_penalty(positions);
        let length = length_penalty(positions, self.eps);

        let gradient = smooth
            .gradient
            .iter()
            .zip(&length.gradient)
            .map(|(s, l)| s * self.smooth_weight + l * self.length_weight)
            .collect();
        let total = self.smooth_weight * smooth.value + self.length_weight * length.value;

        (total, smooth.value, length.value, gradient)
    }
}
