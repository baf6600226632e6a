//! Visibility-reward camera pose and trajectory optimization.
//!
//! Given a static point cloud, this library refines one camera pose, or an
//! ordered sequence of waypoint poses, so that the camera observes as much
//! of the cloud as possible at a preferred distance.
//!
//! # Architecture
//!
//! Each evaluation runs a fixed pipeline:
//! - Frustum culling: depth range and image bounds
//! - Hidden point removal: spherical flip plus convex hull
//! - Reward: Gaussian in distance, aggregated into a scalar objective
//!
//! On top of it, the gradient engine differentiates the objective with
//! respect to pose parameters (analytic with the visible set held fixed,
//! central differences through the full pipeline, or a per-parameter mix),
//! and two Adam-driven solvers update a single pose or a whole path.
//!
//! # Usage
//!
//! ```ignore
//! use viewpoint_opt::{EulerPose, NoopObserver, PointCloud, ViewPlanner};
//!
//! let planner = ViewPlanner::builder().n_opt_steps(20).build()?;
//! let cloud = PointCloud::new(points)?;
//!
//! let result = planner.optimize_pose(&cloud, &EulerPose::default(), &mut NoopObserver)?;
//! println!("{:?} after {} iterations", result.status, result.iterations);
//! ```

pub mod config;
pub mod derivatives;
pub mod error;
pub mod filtering;
pub mod geometry;
pub mod messages;
pub mod optimization;
pub mod planner;
pub mod runtime;
pub mod scoring;
pub mod test_utils;
pub mod visibility;

pub use config::OptimizerConfig;
pub use derivatives::{GradientMode, GradientSettings, GradientSource};
pub use error::{Result, ViewOptError};
pub use filtering::{frustum_cull, CameraPoint, FrustumParams, FrustumResult};
pub use geometry::{CameraTransform, EulerPose, Intrinsics, PointCloud, Waypoint};
pub use messages::{
    InitialPath, InitialPose, OptimizedPath, OptimizedPose, Orientation, PathWaypoint,
    PointCloudSnapshot, Quaternion, VisibilityReport,
};
pub use optimization::{
    AdamConfig, IterationDebug, NoopObserver, PathSnapshot, PoseParamConfig, PoseSnapshot,
    PoseSolveResult, RunDebug, SolveStatus, SolverObserver, TrajectorySolveResult,
};
pub use scoring::{Aggregation, RewardDistance, RewardModel, ViewEvaluation, ViewModel};
pub use visibility::{hidden_point_removal, OcclusionParams, Visibility};

// High-level API
pub use planner::{PathResponse, PoseEvaluation, PoseResponse, ViewPlanner, ViewPlannerBuilder};

// Execution placement and cancellation
pub use runtime::{Backend, CancelFlag, ExecutionContext};
