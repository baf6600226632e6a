//! Type definitions for pose and trajectory optimization.

use serde::{Deserialize, Serialize};

use super::debug::RunDebug;
use crate::error::{Result, ViewOptError};
use crate::geometry::{EulerPose, Waypoint};
use crate::scoring::ViewEvaluation;

/// Learnability and rate of one pose parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub learnable: bool,
    pub lr: f64,
}

impl ParamSpec {
    pub fn free(lr: f64) -> Self {
        Self { learnable: true, lr }
    }

    pub fn frozen() -> Self {
        Self {
            learnable: false,
            lr: 0.0,
        }
    }

    /// Learnable with a nonzero rate.
    pub fn is_free(&self) -> bool {
        self.learnable && self.lr > 0.0
    }
}

/// Per-parameter configuration of the single-pose solver.
///
/// Default: horizontal position (x, y) and pitch free at 0.04, the rest held.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseParamConfig {
    pub x: ParamSpec,
    pub y: ParamSpec,
    pub z: ParamSpec,
    pub roll: ParamSpec,
    pub pitch: ParamSpec,
    pub yaw: ParamSpec,
}

impl Default for PoseParamConfig {
    fn default() -> Self {
        Self {
            x: ParamSpec::free(0.04),
            y: ParamSpec::free(0.04),
            z: ParamSpec::frozen(),
            roll: ParamSpec::frozen(),
            pitch: ParamSpec::free(0.04),
            yaw: ParamSpec::frozen(),
        }
    }
}

impl PoseParamConfig {
    /// Every parameter free at the same rate.
    pub fn all_free(lr: f64) -> Self {
        let spec = ParamSpec::free(lr);
        Self {
            x: spec,
            y: spec,
            z: spec,
            roll: spec,
            pitch: spec,
            yaw: spec,
        }
    }

    /// Specs in `[x, y, z, roll, pitch, yaw]` order.
    pub fn specs(&self) -> [ParamSpec; 6] {
        [self.x, self.y, self.z, self.roll, self.pitch, self.yaw]
    }

    pub fn learnable_mask(&self) -> [bool; 6] {
        self.specs().map(|s| s.is_free())
    }

    pub fn validate(&self) -> Result<()> {
        const NAMES: [&str; 6] = ["x", "y", "z", "roll", "pitch", "yaw"];
        for (name, spec) in NAMES.iter().zip(self.specs()) {
            if !spec.lr.is_finite() || spec.lr < 0.0 {
                return Err(ViewOptError::InvalidConfig(format!(
                    "pose_params.{name}.lr must be finite and non-negative, got {}",
                    spec.lr
                )));
            }
        }
        Ok(())
    }
}

/// Terminal state of a solver run.
///
/// There is no convergence test: a run ends when its iteration budget is
/// spent or when it is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    BudgetExhausted,
    Cancelled,
}

impl SolveStatus {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SolveStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SolveStatus::BudgetExhausted => "budget_exhausted",
            SolveStatus::Cancelled => "cancelled",
        }
    }
}

/// Result of single-pose optimization.
#[derive(Debug, Clone)]
pub struct PoseSolveResult {
    /// Pose after the last completed iteration.
    pub pose: EulerPose,

    pub status: SolveStatus,

    /// Number of completed iterations.
    pub iterations: usize,

    /// Objective at `pose`.
    pub objective: f64,

    /// Objective at the initial pose.
    pub initial_objective: f64,

    /// Visible set and rewards at `pose`.
    pub evaluation: ViewEvaluation,

    /// Longest run of direction reversals in the position track.
    pub oscillation_count: usize,

    pub mean_step_ms: f64,

    pub debug: RunDebug,
}

/// Result of trajectory optimization.
#[derive(Debug, Clone)]
pub struct TrajectorySolveResult {
    /// Waypoints after the last completed iteration, quaternions unit-normalized.
    pub waypoints: Vec<Waypoint>,

    pub status: SolveStatus,

    pub iterations: usize,

    /// Total objective (view terms plus weighted penalties) at `waypoints`.
    pub objective: f64,

    /// Sum of per-waypoint view objectives at `waypoints`.
    pub view_objective: f64,

    /// Unweighted smoothness penalty at `waypoints`.
    pub smoothness: f64,

    /// Unweighted path length at `waypoints`.
    pub length: f64,

    pub initial_objective: f64,

    /// One evaluation per waypoint, in path order.
    pub evaluations: Vec<ViewEvaluation>,

    /// Maximum over waypoints of the reversal count of each position track.
    pub oscillation_count: usize,

    pub mean_step_ms: f64,

    pub debug: RunDebug,
}
