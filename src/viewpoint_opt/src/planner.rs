//! High-level view planning API.
//!
//! # Example
//!
//! ```ignore
//! use viewpoint_opt::{EulerPose, NoopObserver, PointCloud, ViewPlanner};
//!
//! let planner = ViewPlanner::builder()
//!     .n_opt_steps(50)
//!     .reward(3.0, 2.0)
//!     .build()?;
//!
//! let cloud = PointCloud::new(points)?;
//! let result = planner.optimize_pose(&cloud, &EulerPose::default(), &mut NoopObserver)?;
//! println!("objective {} -> {}", result.initial_objective, result.objective);
//! ```

use crate::config::OptimizerConfig;
use crate::derivatives::GradientMode;
use crate::error::{Result, ViewOptError};
use crate::geometry::{EulerPose, Intrinsics, PointCloud, Waypoint};
use crate::messages::{
    InitialPath, InitialPose, OptimizedPath, OptimizedPose, PointCloudSnapshot, VisibilityReport,
};
use crate::optimization::{
    PoseParamConfig, PoseSolveResult, PoseSolver, RunDebug, SolverObserver,
    TrajectorySolveResult, TrajectorySolver,
};
use crate::runtime::{Backend, CancelFlag, ExecutionContext};
use crate::scoring::{ViewEvaluation, ViewModel};
use crate::visibility::OcclusionParams;

/// Builder for [`ViewPlanner`].
#[derive(Debug, Clone, Default)]
pub struct ViewPlannerBuilder {
    config: OptimizerConfig,
    cancel: Option<CancelFlag>,
}

impl ViewPlannerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a complete configuration.
    pub fn config(mut self, config: OptimizerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the depth range of the viewing volume.
    pub fn frustum_range(mut self, min_dist: f64, max_dist: f64) -> Self {
        self.config.frustum_min_dist = min_dist;
        self.config.frustum_max_dist = max_dist;
        self
    }

    /// Set the preferred distance and width of the reward Gaussian.
    pub fn reward(mut self, mean: f64, sigma: f64) -> Self {
        self.config.dist_rewards_mean = mean;
        self.config.dist_rewards_sigma = sigma;
        self
    }

    pub fn eps(mut self, eps: f64) -> Self {
        self.config.eps = eps;
        self
    }

    /// Set the finite-difference step.
    pub fn delta(mut self, delta: f64) -> Self {
        self.config.delta = delta;
        self
    }

    pub fn n_opt_steps(mut self, n_opt_steps: usize) -> Self {
        self.config.n_opt_steps = n_opt_steps;
        self
    }

    pub fn smooth_weight(mut self, weight: f64) -> Self {
        self.config.smooth_weight = weight;
        self
    }

    pub fn length_weight(mut self, weight: f64) -> Self {
        self.config.length_weight = weight;
        self
    }

    pub fn lr_pose(mut self, lr: f64) -> Self {
        self.config.lr_pose = lr;
        self
    }

    /// Set the waypoint orientation rate. Zero freezes orientations.
    pub fn lr_quat(mut self, lr: f64) -> Self {
        self.config.lr_quat = lr;
        self
    }

    pub fn intrinsics(mut self, intrinsics: Intrinsics) -> Self {
        self.config.intrinsics = intrinsics;
        self
    }

    pub fn occlusion(mut self, occlusion: OcclusionParams) -> Self {
        self.config.occlusion = occlusion;
        self
    }

    pub fn gradient_mode(mut self, mode: GradientMode) -> Self {
        self.config.gradient_mode = Some(mode);
        self
    }

    pub fn publish_every(mut self, every: usize) -> Self {
        self.config.publish_every = every;
        self
    }

    pub fn pose_params(mut self, params: PoseParamConfig) -> Self {
        self.config.pose_params = params;
        self
    }

    /// Select the execution backend.
    ///
    /// A parallel backend that cannot be created falls back to sequential.
    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    /// Share a cancellation flag with the caller.
    pub fn cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Validate the configuration and build the planner.
    pub fn build(self) -> Result<ViewPlanner> {
        let planner = ViewPlanner::new(self.config)?;
        Ok(match self.cancel {
            Some(flag) => planner.with_cancel_flag(flag),
            None => planner,
        })
    }
}

/// Objective and per-point report of one fixed pose.
#[derive(Debug, Clone)]
pub struct PoseEvaluation {
    pub objective: f64,
    pub evaluation: ViewEvaluation,
    pub report: VisibilityReport,
}

/// Response to a single-pose request.
#[derive(Debug, Clone)]
pub struct PoseResponse {
    pub pose: OptimizedPose,
    pub report: VisibilityReport,
    pub debug: RunDebug,
}

/// Response to a trajectory request.
#[derive(Debug, Clone)]
pub struct PathResponse {
    pub path: OptimizedPath,
    pub report: VisibilityReport,
    pub debug: RunDebug,
}

/// Camera pose and trajectory optimizer over a static point cloud.
///
/// Each call is an independent run: the planner holds configuration and the
/// execution context, never per-run state.
#[derive(Debug, Clone)]
pub struct ViewPlanner {
    config: OptimizerConfig,
    model: ViewModel,
    ctx: ExecutionContext,
}

impl ViewPlanner {
    /// Create a planner from a validated configuration.
    pub fn new(config: OptimizerConfig) -> Result<Self> {
        config.validate()?;
        let model = config.view_model();
        let ctx = ExecutionContext::new(config.backend);
        Ok(Self { config, model, ctx })
    }

    pub fn builder() -> ViewPlannerBuilder {
        ViewPlannerBuilder::new()
    }

    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.ctx = self.ctx.with_cancel_flag(flag);
        self
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn model(&self) -> &ViewModel {
        &self.model
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// Flag that cancels in-flight runs of this planner.
    pub fn cancel_flag(&self) -> &CancelFlag {
        self.ctx.cancel_flag()
    }

    /// Optimize a single pose.
    ///
    /// # Errors
    /// An empty cloud or a non-finite pose is rejected before any iteration.
    pub fn optimize_pose(
        &self,
        cloud: &PointCloud,
        initial: &EulerPose,
        observer: &mut dyn SolverObserver,
    ) -> Result<PoseSolveResult> {
        self.optimize_pose_with(&self.model, cloud, initial, observer)
    }

    /// Optimize a waypoint sequence.
    ///
    /// # Errors
    /// An empty cloud, fewer than two waypoints or a non-unit quaternion is
    /// rejected before any iteration.
    pub fn optimize_path(
        &self,
        cloud: &PointCloud,
        initial: &[Waypoint],
        observer: &mut dyn SolverObserver,
    ) -> Result<TrajectorySolveResult> {
        check_cloud(cloud)?;
        TrajectorySolver::new(self.model, self.config.trajectory_solver_config())
            .solve(cloud, initial, &self.ctx, observer)
    }

    /// Score a fixed pose without optimizing it.
    pub fn evaluate_pose(&self, cloud: &PointCloud, pose: &EulerPose) -> Result<PoseEvaluation> {
        check_cloud(cloud)?;
        if pose.params().iter().any(|v| !v.is_finite()) {
            return Err(ViewOptError::NonFiniteInput { field: "pose" });
        }
        let evaluation = self.model.evaluate(cloud, &pose.transform(), &self.ctx);
        Ok(PoseEvaluation {
            objective: evaluation.objective,
            report: VisibilityReport::from_evaluation(cloud.len(), &evaluation),
            evaluation,
        })
    }

    /// Handle a single-pose request in message form.
    ///
    /// Intrinsics carried by the request replace the configured ones for
    /// this run.
    pub fn optimize_pose_request(
        &self,
        snapshot: &PointCloudSnapshot,
        request: &InitialPose,
        observer: &mut dyn SolverObserver,
    ) -> Result<PoseResponse> {
        let cloud = snapshot.to_point_cloud()?;
        let initial = request.to_euler_pose()?;
        let mut model = self.model;
        if let Some(intrinsics) = request.intrinsics {
            intrinsics.validate()?;
            model.intrinsics = intrinsics;
        }

        let result = self.optimize_pose_with(&model, &cloud, &initial, observer)?;
        Ok(PoseResponse {
            pose: OptimizedPose::from(&result),
            report: VisibilityReport::from_evaluation(cloud.len(), &result.evaluation),
            debug: result.debug,
        })
    }

    /// Handle a trajectory request in message form.
    pub fn optimize_path_request(
        &self,
        snapshot: &PointCloudSnapshot,
        request: &InitialPath,
        observer: &mut dyn SolverObserver,
    ) -> Result<PathResponse> {
        let cloud = snapshot.to_point_cloud()?;
        let initial = request.to_waypoints()?;

        let result = self.optimize_path(&cloud, &initial, observer)?;
        Ok(PathResponse {
            path: OptimizedPath::from_result(&result, &request.frame_id),
            report: VisibilityReport::from_evaluations(cloud.len(), &result.evaluations),
            debug: result.debug,
        })
    }

    fn optimize_pose_with(
        &self,
        model: &ViewModel,
        cloud: &PointCloud,
        initial: &EulerPose,
        observer: &mut dyn SolverObserver,
    ) -> Result<PoseSolveResult> {
        check_cloud(cloud)?;
        PoseSolver::new(*model, self.config.pose_solver_config())
            .solve(cloud, initial, &self.ctx, observer)
    }
}

fn check_cloud(cloud: &PointCloud) -> Result<()> {
    if cloud.is_empty() {
        return Err(ViewOptError::EmptyPointCloud);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::{NoopObserver, SolveStatus};
    use crate::test_utils::make_wall;

    #[test]
    fn test_builder_validates() {
        assert!(ViewPlanner::builder().build().is_ok());
        assert!(matches!(
            ViewPlanner::builder().frustum_range(5.0, 1.0).build(),
            Err(ViewOptError::InvalidConfig(_))
        ));
        assert!(matches!(
            ViewPlanner::builder().reward(3.0, 0.0).build(),
            Err(ViewOptError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_builder_sets_values() {
        let planner = ViewPlanner::builder()
            .n_opt_steps(3)
            .lr_quat(0.01)
            .gradient_mode(GradientMode::FiniteDifference)
            .backend(Backend::Parallel { threads: 2 })
            .build()
            .unwrap();
        assert_eq!(planner.config().n_opt_steps, 3);
        assert_eq!(planner.config().lr_quat, 0.01);
        assert_eq!(
            planner.context().active_backend(),
            Backend::Parallel { threads: 2 }
        );
    }

    #[test]
    fn test_empty_cloud_rejected() {
        let planner = ViewPlanner::builder().build().unwrap();
        let empty = PointCloud::new(Vec::new()).unwrap();
        assert_eq!(
            planner
                .optimize_pose(&empty, &EulerPose::default(), &mut NoopObserver)
                .unwrap_err(),
            ViewOptError::EmptyPointCloud
        );
        assert_eq!(
            planner
                .evaluate_pose(&empty, &EulerPose::default())
                .unwrap_err(),
            ViewOptError::EmptyPointCloud
        );
    }

    #[test]
    fn test_evaluate_pose_report() {
        let mut points = make_wall(3.0, 0.5, 0.1);
        // Behind the camera
        points.push([0.0, 0.0, -3.0]);
        let cloud = PointCloud::new(points).unwrap();
        let planner = ViewPlanner::builder().build().unwrap();

        let eval = planner.evaluate_pose(&cloud, &EulerPose::default()).unwrap();

        assert_eq!(eval.report.visible.len(), cloud.len());
        assert!(!eval.report.visible[cloud.len() - 1]);
        assert_eq!(eval.report.reward[cloud.len() - 1], 0.0);
        assert_eq!(eval.report.num_visible(), cloud.len() - 1);
        assert!(eval.objective < 0.0);
    }

    #[test]
    fn test_request_intrinsics_override() {
        let snapshot = PointCloudSnapshot::from_cloud(
            &PointCloud::new(make_wall(3.0, 0.5, 0.1)).unwrap(),
            "map",
            0.0,
        );
        // A tiny image sees only the wall center
        let request = InitialPose {
            position: [0.0; 3],
            orientation: Default::default(),
            intrinsics: Some(Intrinsics {
                fx: 500.0,
                fy: 500.0,
                cx: 10.0,
                cy: 10.0,
                width: 20,
                height: 20,
            }),
        };
        let planner = ViewPlanner::builder().n_opt_steps(1).build().unwrap();

        let response = planner
            .optimize_pose_request(&snapshot, &request, &mut NoopObserver)
            .unwrap();

        assert_eq!(response.pose.status, SolveStatus::BudgetExhausted);
        assert!(response.report.num_visible() < 121);
        assert!(response.report.num_visible() > 0);
    }

    #[test]
    fn test_shared_cancel_flag() {
        let flag = CancelFlag::new();
        let planner = ViewPlanner::builder()
            .cancel_flag(flag.clone())
            .build()
            .unwrap();
        flag.cancel();
        assert!(planner.cancel_flag().is_cancelled());
    }
}
