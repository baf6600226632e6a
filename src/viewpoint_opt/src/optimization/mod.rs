//! Gradient-based optimization of camera poses.
//!
//! This module implements the two solver loops:
//! 1. Evaluate the view pipeline at the current pose(s)
//! 2. Compute the objective gradient (analytic, finite-difference or both)
//! 3. Add path penalties (trajectory only)
//! 4. Apply an Adam update per parameter group
//!
//! Both run for a fixed iteration budget and stop early only on cancellation.

pub mod adam;
pub mod debug;
pub mod observer;
pub mod oscillation;
pub mod pose_solver;
pub mod regularization;
pub mod trajectory;
pub mod types;

pub use adam::{AdamConfig, AdamGroup};
pub use debug::{IterationDebug, PathIterationDebug, RunDebug};
pub use observer::{NoopObserver, PathSnapshot, PoseSnapshot, SolverObserver};
pub use oscillation::{count_oscillation, OscillationResult, DEFAULT_OSCILLATION_THRESHOLD};
pub use pose_solver::{PoseSolver, PoseSolverConfig};
pub use regularization::{length_penalty, smoothness_penalty, PathPenalty, RegularizationConfig};
pub use trajectory::{validate_path, TrajectorySolver, TrajectorySolverConfig};
pub use types::{ParamSpec, PoseParamConfig, PoseSolveResult, SolveStatus, TrajectorySolveResult};
