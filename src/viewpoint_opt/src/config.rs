//! Optimizer configuration.
//!
//! Every key is optional; missing keys take their defaults. The flat keys
//! (`frustum_min_dist` through `lr_quat`) are the recognized options of the
//! core, the nested ones tune the model and the solvers further.

use serde::{Deserialize, Serialize};

use crate::derivatives::{GradientMode, GradientSettings};
use crate::error::{Result, ViewOptError};
use crate::filtering::FrustumParams;
use crate::geometry::Intrinsics;
use crate::optimization::{
    AdamConfig, PoseParamConfig, PoseSolverConfig, RegularizationConfig, TrajectorySolverConfig,
};
use crate::runtime::Backend;
use crate::scoring::{Aggregation, RewardDistance, RewardModel, RewardParams, ViewModel};
use crate::visibility::OcclusionParams;

/// Complete configuration of a view planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Near depth bound of the viewing volume.
    pub frustum_min_dist: f64,
    /// Far depth bound of the viewing volume.
    pub frustum_max_dist: f64,
    /// Preferred observation distance.
    pub dist_rewards_mean: f64,
    /// Width of the reward Gaussian.
    pub dist_rewards_sigma: f64,
    /// Floor on denominators.
    pub eps: f64,
    /// Finite-difference step (m for positions, rad for angles).
    pub delta: f64,
    /// Iteration budget.
    pub n_opt_steps: usize,
    pub smooth_weight: f64,
    pub length_weight: f64,
    /// Learning rate of trajectory waypoint positions.
    pub lr_pose: f64,
    /// Learning rate of trajectory waypoint quaternions (0 freezes them).
    pub lr_quat: f64,

    pub intrinsics: Intrinsics,
    pub occlusion: OcclusionParams,
    pub reward_distance: RewardDistance,
    pub aggregation: Aggregation,
    /// Gradient policy. Unset means `auto` for a single pose and `analytic`
    /// for trajectories.
    pub gradient_mode: Option<GradientMode>,
    /// Observer cadence in iterations (0 disables).
    pub publish_every: usize,
    pub adam: AdamConfig,
    /// Learnability and rate of each single-pose parameter.
    pub pose_params: PoseParamConfig,
    pub backend: Backend,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            frustum_min_dist: 1.0,
            frustum_max_dist: 5.0,
            dist_rewards_mean: 3.0,
            dist_rewards_sigma: 2.0,
            eps: 1e-6,
            delta: 0.05,
            n_opt_steps: 10,
            smooth_weight: 14.0,
            length_weight: 0.02,
            lr_pose: 0.1,
            lr_quat: 0.0,
            intrinsics: Intrinsics::default(),
            occlusion: OcclusionParams::default(),
            reward_distance: RewardDistance::default(),
            aggregation: Aggregation::default(),
            gradient_mode: None,
            publish_every: 4,
            adam: AdamConfig::default(),
            pose_params: PoseParamConfig::default(),
            backend: Backend::default(),
        }
    }
}

impl OptimizerConfig {
    /// Check every value before any optimization starts.
    pub fn validate(&self) -> Result<()> {
        let finite = [
            ("frustum_min_dist", self.frustum_min_dist),
            ("frustum_max_dist", self.frustum_max_dist),
            ("dist_rewards_mean", self.dist_rewards_mean),
            ("dist_rewards_sigma", self.dist_rewards_sigma),
            ("eps", self.eps),
            ("delta", self.delta),
            ("smooth_weight", self.smooth_weight),
            ("length_weight", self.length_weight),
            ("lr_pose", self.lr_pose),
            ("lr_quat", self.lr_quat),
            ("occlusion.radius_exponent", self.occlusion.radius_exponent),
        ];
        if let Some((name, value)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return Err(invalid(format!("{name} must be finite, got {value}")));
        }

        if self.frustum_min_dist < 0.0 || self.frustum_min_dist >= self.frustum_max_dist {
            return Err(invalid(format!(
                "need 0 <= frustum_min_dist < frustum_max_dist, got {} and {}",
                self.frustum_min_dist, self.frustum_max_dist
            )));
        }
        if self.dist_rewards_sigma <= 0.0 {
            return Err(invalid(format!(
                "dist_rewards_sigma must be positive, got {}",
                self.dist_rewards_sigma
            )));
        }
        if self.eps <= 0.0 {
            return Err(invalid(format!("eps must be positive, got {}", self.eps)));
        }
        if self.delta <= 0.0 {
            return Err(invalid(format!("delta must be positive, got {}", self.delta)));
        }
        for (name, value) in [
            ("smooth_weight", self.smooth_weight),
            ("length_weight", self.length_weight),
            ("lr_pose", self.lr_pose),
            ("lr_quat", self.lr_quat),
        ] {
            if value < 0.0 {
                return Err(invalid(format!("{name} must be non-negative, got {value}")));
            }
        }

        let adam = &self.adam;
        if !(0.0..1.0).contains(&adam.beta1) || !(0.0..1.0).contains(&adam.beta2) {
            return Err(invalid(format!(
                "adam betas must lie in [0, 1), got {} and {}",
                adam.beta1, adam.beta2
            )));
        }
        if adam.epsilon.is_nan() || adam.epsilon <= 0.0 {
            return Err(invalid(format!(
                "adam.epsilon must be positive, got {}",
                adam.epsilon
            )));
        }
        if let Backend::Parallel { threads: 0 } = self.backend {
            return Err(invalid("backend.threads must be at least 1".to_string()));
        }

        self.pose_params.validate()?;
        self.intrinsics
            .validate()
            .map_err(|e| invalid(format!("intrinsics: {e}")))?;
        Ok(())
    }

    /// Visibility and reward model described by this configuration.
    pub fn view_model(&self) -> ViewModel {
        ViewModel {
            intrinsics: self.intrinsics,
            frustum: FrustumParams {
                min_dist: self.frustum_min_dist,
                max_dist: self.frustum_max_dist,
            },
            occlusion: self.occlusion,
            reward: RewardModel::new(
                RewardParams {
                    mean: self.dist_rewards_mean,
                    sigma: self.dist_rewards_sigma,
                    eps: self.eps,
                },
                self.reward_distance,
                self.aggregation,
            ),
        }
    }

    pub fn pose_solver_config(&self) -> PoseSolverConfig {
        PoseSolverConfig {
            params: self.pose_params,
            adam: self.adam,
            n_steps: self.n_opt_steps,
            gradient: GradientSettings {
                mode: self.gradient_mode.unwrap_or(GradientMode::Auto),
                delta: self.delta,
            },
            publish_every: self.publish_every,
        }
    }

    pub fn trajectory_solver_config(&self) -> TrajectorySolverConfig {
        TrajectorySolverConfig {
            lr_pose: self.lr_pose,
            lr_quat: self.lr_quat,
            adam: self.adam,
            regularization: RegularizationConfig {
                smooth_weight: self.smooth_weight,
                length_weight: self.length_weight,
                eps: self.eps,
            },
            n_steps: self.n_opt_steps,
            gradient: GradientSettings {
                mode: self.gradient_mode.unwrap_or(GradientMode::Analytic),
                delta: self.delta,
            },
            publish_every: self.publish_every,
        }
    }
}

fn invalid(message: String) -> ViewOptError {
    ViewOptError::InvalidConfig(message)
}
