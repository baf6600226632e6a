//! Full view evaluation: frustum culling, hidden point removal, reward.
//!
//! ```text
//! PointCloud (world) --transform--> camera frame
//!   -> frustum_cull          (depth range + image bounds)
//!   -> visible_subset        (spherical flip + convex hull)
//!   -> RewardModel           (Gaussian in distance, aggregated)
//!   -> ViewEvaluation        (visible set, rewards, objective)
//! ```

use crate::filtering::{frustum_cull, CameraPoint, FrustumParams};
use crate::geometry::{CameraTransform, Intrinsics, PointCloud};
use crate::runtime::ExecutionContext;
use crate::visibility::{visible_subset, OcclusionParams};

use super::reward::RewardModel;

/// Everything needed to score a camera pose against a cloud.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewModel {
    pub intrinsics: Intrinsics,
    pub frustum: FrustumParams,
    pub occlusion: OcclusionParams,
    pub reward: RewardModel,
}

/// Outcome of evaluating one pose.
#[derive(Debug, Clone, Default)]
pub struct ViewEvaluation {
    /// Final visible set with camera-frame coordinates, in cloud order.
    pub visible: Vec<CameraPoint>,
    /// Reward per entry of `visible`.
    pub rewards: Vec<f64>,
    /// Aggregated objective (negated; zero when nothing is visible).
    pub objective: f64,
    /// Number of points that passed frustum culling.
    pub num_candidates: usize,
}

impl ViewEvaluation {
    pub fn num_visible(&self) -> usize {
        self.visible.len()
    }

    /// Nothing visible: objective and gradient are both zero.
    pub fn is_degenerate(&self) -> bool {
        self.visible.is_empty()
    }

    pub fn visible_indices(&self) -> Vec<usize> {
        self.visible.iter().map(|p| p.index).collect()
    }

    pub fn total_reward(&self) -> f64 {
        self.rewards.iter().sum()
    }

    /// Whether two evaluations selected exactly the same points.
    pub fn same_visible_set(&self, other: &ViewEvaluation) -> bool {
        self.visible.len() == other.visible.len()
            && self
                .visible
                .iter()
                .zip(&other.visible)
                .all(|(a, b)| a.index == b.index)
    }
}

impl ViewModel {
    /// Run the full pipeline for one camera transform.
    pub fn evaluate(
        &self,
        cloud: &PointCloud,
        transform: &CameraTransform,
        ctx: &ExecutionContext,
    ) -> ViewEvaluation {
        let culled = frustum_cull(cloud, transform, &self.intrinsics, &self.frustum, ctx);
        let num_candidates = culled.points.len();

        let visible = visible_subset(&culled.points, &self.occlusion);
        debug_assert!(visible.len() <= num_candidates && num_candidates <= cloud.len());

        let rewards = ctx.map(visible.len(), |i| {
            self.reward.point_reward(&visible[i].camera)
        });
        let objective = self.reward.objective(&rewards);

        ViewEvaluation {
            visible,
            rewards,
            objective,
            num_candidates,
        }
    }

    /// Objective only.
    pub fn objective(
        &self,
        cloud: &PointCloud,
        transform: &CameraTransform,
        ctx: &ExecutionContext,
    ) -> f64 {
        self.evaluate(cloud, transform, ctx).objective
    }
}
