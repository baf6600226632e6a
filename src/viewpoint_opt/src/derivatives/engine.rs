//! Per-parameter combination of analytic and finite-difference gradients.

use nalgebra::Vector6;

use super::analytic::{euler_pose_gradient, waypoint_gradient};
use super::numeric::probe_parameter;
use super::types::{GradientMode, GradientSource, PoseGradient, WaypointGradient};
use crate::geometry::{EulerPose, PointCloud, Waypoint};
use crate::runtime::ExecutionContext;
use crate::scoring::ViewModel;

/// Gradient settings shared by both solvers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientSettings {
    pub mode: GradientMode,
    /// Finite-difference step, meters for positions and radians (or raw
    /// quaternion units) for orientations.
    pub delta: f64,
}

impl GradientSettings {
    fn wants_probe(&self) -> bool {
        self.mode != GradientMode::Analytic
    }

    fn use_probe(&self, membership_changed: bool) -> bool {
        match self.mode {
            GradientMode::Analytic => false,
            GradientMode::FiniteDifference => true,
            GradientMode::Auto => membership_changed,
        }
    }
}

/// Evaluate a pose and compute the objective gradient for its learnable parameters.
///
/// # Arguments
/// * `model` - Visibility and reward model
/// * `cloud` - World-frame point cloud
/// * `pose` - Current camera pose
/// * `learnable` - Mask over `[x, y, z, roll, pitch, yaw]`
/// * `settings` - Gradient mode and finite-difference step
/// * `ctx` - Execution context
///
/// # Returns
/// The evaluation at `pose` and the gradient. Frozen components and every
/// component of a zero-visibility evaluation are zero.
pub fn compute_pose_gradient(
    model: &ViewModel,
    cloud: &PointCloud,
    pose: &EulerPose,
    learnable: &[bool; 6],
    settings: &GradientSettings,
    ctx: &ExecutionContext,
) -> PoseGradient {
    let evaluation = model.evaluate(cloud, &pose.transform(), ctx);

    if evaluation.is_degenerate() {
        return PoseGradient {
            evaluation,
            gradient: Vector6::zeros(),
            sources: [GradientSource::Degenerate; 6],
        };
    }

    let mut gradient = match settings.mode {
        GradientMode::FiniteDifference => Vector6::zeros(),
        _ => euler_pose_gradient(&evaluation, cloud, pose, &model.reward, ctx),
    };
    let mut sources = [GradientSource::Analytic; 6];

    let base = pose.params();
    for k in 0..6 {
        if !learnable[k] {
            gradient[k] = 0.0;
            sources[k] = GradientSource::Frozen;
            continue;
        }
        if !settings.wants_probe() {
            continue;
        }

        let probe = probe_parameter(&evaluation, settings.delta, |step| {
            let mut params = base;
            params[k] += step;
            model.evaluate(cloud, &EulerPose::from_params(&params).transform(), ctx)
        });
        if settings.use_probe(probe.membership_changed) {
            gradient[k] = probe.derivative;
            sources[k] = GradientSource::FiniteDifference;
        }
    }

    PoseGradient {
        evaluation,
        gradient,
        sources,
    }
}

/// Evaluate one waypoint's view term and compute its gradient.
///
/// `learnable` masks `[x, y, z, qw, qx, qy, qz]`. Finite differences perturb
/// this waypoint only.
pub fn compute_waypoint_gradient(
    model: &ViewModel,
    cloud: &PointCloud,
    waypoint: &Waypoint,
    learnable: &[bool; 7],
    settings: &GradientSettings,
    ctx: &ExecutionContext,
) -> WaypointGradient {
    let evaluation = model.evaluate(cloud, &waypoint.transform(), ctx);

    if evaluation.is_degenerate() {
        return WaypointGradient {
            evaluation,
            position: Default::default(),
            quat: Default::default(),
            sources: [GradientSource::Degenerate; 7],
        };
    }

    let (mut position, mut quat) = match settings.mode {
        GradientMode::FiniteDifference => (Default::default(), Default::default()),
        _ => waypoint_gradient(&evaluation, cloud, waypoint, &model.reward, ctx),
    };
    let mut sources = [GradientSource::Analytic; 7];

    for k in 0..7 {
        if !learnable[k] {
            set_component(&mut position, &mut quat, k, 0.0);
            sources[k] = GradientSource::Frozen;
            continue;
        }
        if !settings.wants_probe() {
            continue;
        }

        let probe = probe_parameter(&evaluation, settings.delta, |step| {
            let mut perturbed = *waypoint;
            if k < 3 {
                perturbed.position[k] += step;
            } else {
                perturbed.quat[k - 3] += step;
            }
            model.evaluate(cloud, &perturbed.transform(), ctx)
        });
        if settings.use_probe(probe.membership_changed) {
            set_component(&mut position, &mut quat, k, probe.derivative);
            sources[k] = GradientSource::FiniteDifference;
        }
    }

    WaypointGradient {
        evaluation,
        position,
        quat,
        sources,
    }
}

fn set_component(
    position: &mut nalgebra::Vector3<f64>,
    quat: &mut nalgebra::Vector4<f64>,
    k: usize,
    value: f64,
) {
    if k < 3 {
        position[k] = value;
    } else {
        quat[k - 3] = value;
    }
}
