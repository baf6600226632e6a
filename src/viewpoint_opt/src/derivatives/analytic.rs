//! Analytic gradients through projection and reward.
//!
//! The visible set is treated as constant for the evaluated pose. For a visible
//! world point `p_w` and camera pose `(R, t)`:
//! - `p_c = Rᵀ (p_w - t)`
//! - `∂p_c/∂t = -Rᵀ`, so `∂r/∂t = -R ∂r/∂p_c`
//! - `∂p_c/∂θ = (∂R/∂θ)ᵀ (p_w - t)`
//!
//! The aggregation weight (1 for a sum, `1 / (n + eps)` for a mean) is constant
//! for a fixed set and simply scales the summed per-point gradients.

use nalgebra::{SVector, Vector3, Vector4, Vector6};

use crate::geometry::{EulerDerivatives, EulerPose, PointCloud, QuaternionDerivatives, Waypoint};
use crate::runtime::ExecutionContext;
use crate::scoring::{RewardModel, ViewEvaluation};

/// Gradient of the objective with respect to `[x, y, z, roll, pitch, yaw]`.
///
/// Returns zero when nothing is visible.
pub fn euler_pose_gradient(
    evaluation: &ViewEvaluation,
    cloud: &PointCloud,
    pose: &EulerPose,
    reward: &RewardModel,
    ctx: &ExecutionContext,
) -> Vector6<f64> {
    if evaluation.is_degenerate() {
        return Vector6::zeros();
    }

    let deriv = EulerDerivatives::new(pose.roll, pose.pitch, pose.yaw);
    let points = cloud.points();
    let visible = &evaluation.visible;

    let sum = ctx.map_reduce(
        visible.len(),
        Vector6::zeros,
        |i| {
            let point = &visible[i];
            let (_, d_camera) = reward.point_reward_gradient(&point.camera);
            let offset = points[point.index] - pose.position;

            let d_translation = -(deriv.rotation * d_camera);
            let [d_roll, d_pitch, d_yaw] = deriv.camera_point_terms(&offset);

            Vector6::new(
                d_translation.x,
                d_translation.y,
                d_translation.z,
                d_camera.dot(&d_roll),
                d_camera.dot(&d_pitch),
                d_camera.dot(&d_yaw),
            )
        },
        |a, b| a + b,
    );

    sum * -reward.objective_weight(visible.len())
}

/// Gradient of one waypoint's view term with respect to its position and raw quaternion.
pub fn waypoint_gradient(
    evaluation: &ViewEvaluation,
    cloud: &PointCloud,
    waypoint: &Waypoint,
    reward: &RewardModel,
    ctx: &ExecutionContext,
) -> (Vector3<f64>, Vector4<f64>) {
    if evaluation.is_degenerate() {
        return (Vector3::zeros(), Vector4::zeros());
    }

    let deriv = QuaternionDerivatives::new(&waypoint.quat);
    let points = cloud.points();
    let visible = &evaluation.visible;

    let sum: SVector<f64, 7> = ctx.map_reduce(
        visible.len(),
        SVector::<f64, 7>::zeros,
        |i| {
            let point = &visible[i];
            let (_, d_camera) = reward.point_reward_gradient(&point.camera);
            let offset = points[point.index] - waypoint.position;

            let d_translation = -(deriv.rotation * d_camera);
            let d_quat = deriv.camera_point_terms(&offset);

            SVector::<f64, 7>::from_column_slice(&[
                d_translation.x,
                d_translation.y,
                d_translation.z,
                d_camera.dot(&d_quat[0]),
                d_camera.dot(&d_quat[1]),
                d_camera.dot(&d_quat[2]),
                d_camera.dot(&d_quat[3]),
            ])
        },
        |a, b| a + b,
    );

    let scaled = sum * -reward.objective_weight(visible.len());
    (
        Vector3::new(scaled[0], scaled[1], scaled[2]),
        Vector4::new(scaled[3], scaled[4], scaled[5], scaled[6]),
    )
}
