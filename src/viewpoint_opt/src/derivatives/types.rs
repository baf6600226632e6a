//! Type definitions for gradient computation.

use nalgebra::{Vector3, Vector4, Vector6};
use serde::{Deserialize, Serialize};

use crate::scoring::ViewEvaluation;

/// Policy for choosing a gradient source per parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradientMode {
    /// Differentiate through projection and reward with the visible set held fixed.
    Analytic,
    /// Central differences through the full pipeline, occlusion included.
    FiniteDifference,
    /// Analytic, except where a `±delta` probe changes the visible set.
    Auto,
}

/// Where one gradient component came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradientSource {
    Analytic,
    FiniteDifference,
    /// Parameter is not learnable; component is zero.
    Frozen,
    /// Nothing visible; component is zero.
    Degenerate,
}

/// Gradient of the single-pose objective.
///
/// Components are ordered `[x, y, z, roll, pitch, yaw]`.
#[derive(Debug, Clone)]
pub struct PoseGradient {
    /// Pipeline output at the current pose.
    pub evaluation: ViewEvaluation,
    pub gradient: Vector6<f64>,
    pub sources: [GradientSource; 6],
}

impl PoseGradient {
    pub fn objective(&self) -> f64 {
        self.evaluation.objective
    }

    pub fn is_degenerate(&self) -> bool {
        self.evaluation.is_degenerate()
    }
}

/// Gradient of one waypoint's view term.
#[derive(Debug, Clone)]
pub struct WaypointGradient {
    /// Pipeline output at the waypoint.
    pub evaluation: ViewEvaluation,
    /// `∂f/∂position`
    pub position: Vector3<f64>,
    /// `∂f/∂q` with respect to the raw `(w, x, y, z)` components
    pub quat: Vector4<f64>,
    /// Position components first, then quaternion components.
    pub sources: [GradientSource; 7],
}

impl WaypointGradient {
    pub fn objective(&self) -> f64 {
        self.evaluation.objective
    }
}
