//! Per-iteration trace of an optimization run.

use serde::Serialize;

use crate::derivatives::GradientSource;

/// One single-pose iteration.
#[derive(Debug, Clone, Serialize)]
pub struct IterationDebug {
    /// Iteration number (0-indexed).
    pub iteration: usize,

    /// Pose at the start of this iteration [x, y, z, roll, pitch, yaw].
    pub pose: Vec<f64>,

    /// Objective at `pose`.
    pub objective: f64,

    /// Frustum candidates and final visible points at `pose`.
    pub num_candidates: usize,
    pub num_visible: usize,

    /// Gradient and where each component came from.
    pub gradient: Vec<f64>,
    pub sources: Vec<GradientSource>,

    /// Whether the update was skipped (nothing visible).
    pub skipped: bool,

    /// Pose after the update.
    pub pose_after: Vec<f64>,

    pub elapsed_ms: f64,
}

impl IterationDebug {
    pub fn new(iteration: usize) -> Self {
        Self {
            iteration,
            pose: vec![0.0; 6],
            objective: 0.0,
            num_candidates: 0,
            num_visible: 0,
            gradient: vec![0.0; 6],
            sources: Vec::new(),
            skipped: false,
            pose_after: vec![0.0; 6],
            elapsed_ms: 0.0,
        }
    }

    /// Compact log line.
    pub fn to_log_line(&self) -> String {
        format!(
            "iter={} pose=[{:.4},{:.4},{:.4},{:.4},{:.4},{:.4}] obj={:.6} visible={} skipped={} ms={:.2}",
            self.iteration,
            self.pose[0], self.pose[1], self.pose[2],
            self.pose[3], self.pose[4], self.pose[5],
            self.objective,
            self.num_visible,
            self.skipped,
            self.elapsed_ms,
        )
    }
}

/// One trajectory iteration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PathIterationDebug {
    pub iteration: usize,
    /// Total objective: view terms plus weighted penalties.
    pub objective: f64,
    pub view_objective: f64,
    pub smoothness: f64,
    pub length: f64,
    /// Visible points per waypoint.
    pub num_visible: Vec<usize>,
    /// Norm of the full position gradient.
    pub position_gradient_norm: f64,
    /// Norm of the full quaternion gradient.
    pub quat_gradient_norm: f64,
    /// Number of gradient components taken from finite differences.
    pub num_finite_difference: usize,
    pub elapsed_ms: f64,
}

impl PathIterationDebug {
    pub fn to_log_line(&self) -> String {
        format!(
            "iter={} obj={:.6} view={:.6} smooth={:.6} length={:.4} |g_pos|={:.4} ms={:.2}",
            self.iteration,
            self.objective,
            self.view_objective,
            self.smoothness,
            self.length,
            self.position_gradient_norm,
            self.elapsed_ms,
        )
    }
}

/// Complete trace of one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunDebug {
    /// `"pose"` or `"trajectory"`.
    pub kind: String,
    pub status: String,
    pub total_iterations: usize,
    pub final_objective: f64,
    pub oscillation_count: usize,
    pub mean_step_ms: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub iterations: Vec<IterationDebug>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path_iterations: Vec<PathIterationDebug>,
}

impl RunDebug {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Mean of per-iteration durations, zero for an empty run.
pub(crate) fn mean_ms(durations: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = durations.fold((0.0, 0usize), |(s, c), d| (s + d, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
