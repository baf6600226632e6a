//! Core geometric types: point clouds, camera intrinsics and pose parameterizations.
//!
//! Poses are camera-to-world. The camera frame looks along +Z with +X right and
//! +Y down, so a camera-frame point projects to pixel
//! `(fx * x / z + cx, fy * y / z + cy)`.

use nalgebra::{Matrix3, UnitQuaternion, Vector3, Vector4};
use serde::{Deserialize, Serialize};

use super::angular::{euler_angles, euler_rotation, quaternion_rotation};
use crate::error::{Result, ViewOptError};

/// Tolerance on the norm of incoming quaternions.
pub const UNIT_QUATERNION_TOLERANCE: f64 = 1e-3;

/// Ordered, immutable set of 3D points.
///
/// Position in the vector is the only identity a point has; it is preserved so
/// per-point outputs can be overlaid on the input.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    points: Vec<Vector3<f64>>,
}

impl PointCloud {
    /// Build a cloud from xyz triples, rejecting non-finite coordinates.
    pub fn new(points: Vec<[f64; 3]>) -> Result<Self> {
        if points.iter().flatten().any(|v| !v.is_finite()) {
            return Err(ViewOptError::NonFiniteInput {
                field: "point cloud",
            });
        }
        Ok(Self {
            points: points.into_iter().map(Vector3::from).collect(),
        })
    }

    /// Build a cloud from a row-major 2D array.
    ///
    /// Accepts N rows of 3 values, or exactly 3 rows of N values (N != 3)
    /// which is transposed into N points.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        if rows.iter().all(|row| row.len() == 3) {
            return Self::new(rows.iter().map(|r| [r[0], r[1], r[2]]).collect());
        }

        if rows.len() == 3 {
            let n = rows[0].len();
            if rows.iter().all(|row| row.len() == n) {
                let points = (0..n).map(|i| [rows[0][i], rows[1][i], rows[2][i]]).collect();
                return Self::new(points);
            }
        }

        let bad_row = rows.iter().position(|row| row.len() != 3).unwrap_or(0);
        Err(ViewOptError::InvalidPointCloud(format!(
            "expected Nx3 or 3xN layout, row {bad_row} has {} values",
            rows.get(bad_row).map_or(0, Vec::len)
        )))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Vector3<f64>] {
        &self.points
    }

    /// Points as plain triples, in input order.
    pub fn to_arrays(&self) -> Vec<[f64; 3]> {
        self.points.iter().map(|p| [p.x, p.y, p.z]).collect()
    }
}

/// Pinhole camera intrinsics, constant for a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub width: u32,
    pub height: u32,
}

impl Default for Intrinsics {
    fn default() -> Self {
        Self {
            fx: 500.0,
            fy: 500.0,
            cx: 320.0,
            cy: 240.0,
            width: 640,
            height: 480,
        }
    }
}

impl Intrinsics {
    pub fn validate(&self) -> Result<()> {
        let values = [self.fx, self.fy, self.cx, self.cy];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ViewOptError::NonFiniteInput {
                field: "intrinsics",
            });
        }
        if self.fx <= 0.0 || self.fy <= 0.0 {
            return Err(ViewOptError::InvalidIntrinsics(format!(
                "focal lengths must be positive (fx={}, fy={})",
                self.fx, self.fy
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ViewOptError::InvalidIntrinsics(format!(
                "image size must be non-zero ({}x{})",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Project a camera-frame point to pixel coordinates.
    ///
    /// Returns `None` for points at or behind the image plane.
    pub fn project(&self, point: &Vector3<f64>) -> Option<(f64, f64)> {
        if point.z <= f64::EPSILON {
            return None;
        }
        Some((
            self.fx * point.x / point.z + self.cx,
            self.fy * point.y / point.z + self.cy,
        ))
    }

    /// Whether a pixel lies inside `[0, width) x [0, height)`.
    pub fn contains(&self, u: f64, v: f64) -> bool {
        u >= 0.0 && u < self.width as f64 && v >= 0.0 && v < self.height as f64
    }
}

/// Rigid camera-to-world transform used by every pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraTransform {
    /// Columns are the camera axes expressed in the world frame.
    pub rotation: Matrix3<f64>,
    /// Camera center in the world frame.
    pub position: Vector3<f64>,
}

impl CameraTransform {
    pub fn new(rotation: Matrix3<f64>, position: Vector3<f64>) -> Self {
        Self { rotation, position }
    }

    /// Express a world point in the camera frame: `Rᵀ (p - t)`.
    #[inline]
    pub fn world_to_camera(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.tr_mul(&(point - self.position))
    }

    /// Express a camera-frame point in the world frame: `R p + t`.
    #[inline]
    pub fn camera_to_world(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * point + self.position
    }
}

/// Single camera pose parameterized by position and Euler angles.
///
/// The rotation is `Rz(yaw) * Ry(pitch) * Rx(roll)`. Euler angles are only
/// used here, where a constrained subset of angles is optimized.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerPose {
    pub position: Vector3<f64>,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl EulerPose {
    pub fn new(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        Self {
            position: Vector3::new(x, y, z),
            roll,
            pitch,
            yaw,
        }
    }

    /// Build from a 6-vector `[x, y, z, roll, pitch, yaw]`.
    pub fn from_params(params: &[f64; 6]) -> Self {
        Self::new(
            params[0], params[1], params[2], params[3], params[4], params[5],
        )
    }

    /// Convert to a 6-vector `[x, y, z, roll, pitch, yaw]`.
    pub fn params(&self) -> [f64; 6] {
        [
            self.position.x,
            self.position.y,
            self.position.z,
            self.roll,
            self.pitch,
            self.yaw,
        ]
    }

    /// Build from a position and an orientation quaternion.
    ///
    /// At gimbal lock the returned angles have zero roll but describe the
    /// same rotation.
    pub fn from_quaternion(position: Vector3<f64>, quat: &UnitQuaternion<f64>) -> Self {
        let (roll, pitch, yaw) = euler_angles(&quat.to_rotation_matrix().into_inner());
        Self {
            position,
            roll,
            pitch,
            yaw,
        }
    }

    pub fn rotation(&self) -> Matrix3<f64> {
        euler_rotation(self.roll, self.pitch, self.yaw)
    }

    pub fn unit_quaternion(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_euler_angles(self.roll, self.pitch, self.yaw)
    }

    pub fn transform(&self) -> CameraTransform {
        CameraTransform::new(self.rotation(), self.position)
    }
}

/// One trajectory waypoint: position plus a raw quaternion.
///
/// The quaternion is stored `(w, x, y, z)` exactly as the optimizer updates
/// it; it is normalized on every read, never assumed unit on write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub position: Vector3<f64>,
    pub quat: Vector4<f64>,
}

impl Waypoint {
    pub fn new(position: Vector3<f64>, quat_wxyz: Vector4<f64>) -> Self {
        Self {
            position,
            quat: quat_wxyz,
        }
    }

    pub fn from_unit_quaternion(position: Vector3<f64>, quat: &UnitQuaternion<f64>) -> Self {
        let q = quat.quaternion();
        Self::new(position, Vector4::new(q.w, q.i, q.j, q.k))
    }

    /// Normalized quaternion `(w, x, y, z)`.
    ///
    /// A zero-length quaternion normalizes to identity.
    pub fn normalized_quat(&self) -> Vector4<f64> {
        let norm = self.quat.norm();
        if norm <= f64::EPSILON {
            Vector4::new(1.0, 0.0, 0.0, 0.0)
        } else {
            self.quat / norm
        }
    }

    pub fn unit_quaternion(&self) -> UnitQuaternion<f64> {
        let q = self.normalized_quat();
        UnitQuaternion::new_unchecked(nalgebra::Quaternion::new(q[0], q[1], q[2], q[3]))
    }

    pub fn rotation(&self) -> Matrix3<f64> {
        quaternion_rotation(&self.normalized_quat())
    }

    pub fn transform(&self) -> CameraTransform {
        CameraTransform::new(self.rotation(), self.position)
    }
}

/// Check that a quaternion is unit length within [`UNIT_QUATERNION_TOLERANCE`].
pub fn check_unit_quaternion(index: usize, quat_wxyz: &Vector4<f64>) -> Result<()> {
    if quat_wxyz.iter().any(|v| !v.is_finite()) {
        return Err(ViewOptError::NonFiniteInput {
            field: "quaternion",
        });
    }
    let norm = quat_wxyz.norm();
    if (norm - 1.0).abs() > UNIT_QUATERNION_TOLERANCE {
        return Err(ViewOptError::NonUnitQuaternion { index, norm });
    }
    Ok(())
}
