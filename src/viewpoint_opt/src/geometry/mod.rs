//! Geometry primitives: poses, intrinsics, point clouds and rotation derivatives.

pub mod angular;
pub mod types;

pub use angular::{euler_rotation, quaternion_rotation, EulerDerivatives, QuaternionDerivatives};
pub use types::{
    check_unit_quaternion, CameraTransform, EulerPose, Intrinsics, PointCloud, Waypoint,
    UNIT_QUATERNION_TOLERANCE,
};
