//! Rotation matrices and their derivatives with respect to orientation parameters.
//!
//! Two parameterizations are supported:
//! - Euler angles (roll, pitch, yaw) with `R = Rz(yaw) * Ry(pitch) * Rx(roll)`
//! - Raw quaternions `(w, x, y, z)`, normalized before use
//!
//! The derivatives are the building blocks of the analytic gradient: for a
//! camera-frame point `p_c = Rᵀ (p_w - t)`, `∂p_c/∂θ = (∂R/∂θ)ᵀ (p_w - t)`.

use nalgebra::{Matrix3, Matrix4, Vector3, Vector4};

/// Threshold for treating angles as zero (avoids numerical issues).
const ANGLE_EPSILON: f64 = 1e-12;

/// Quaternions shorter than this are treated as identity.
const QUAT_NORM_EPSILON: f64 = 1e-12;

#[inline]
fn sin_cos(angle: f64) -> (f64, f64) {
    if angle.abs() < ANGLE_EPSILON {
        (0.0, 1.0)
    } else {
        angle.sin_cos()
    }
}

fn rot_x(s: f64, c: f64) -> Matrix3<f64> {
    Matrix3::new(1.0, 0.0, 0.0, 0.0, c, -s, 0.0, s, c)
}

fn rot_y(s: f64, c: f64) -> Matrix3<f64> {
    Matrix3::new(c, 0.0, s, 0.0, 1.0, 0.0, -s, 0.0, c)
}

fn rot_z(s: f64, c: f64) -> Matrix3<f64> {
    Matrix3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0)
}

fn d_rot_x(s: f64, c: f64) -> Matrix3<f64> {
    Matrix3::new(0.0, 0.0, 0.0, 0.0, -s, -c, 0.0, c, -s)
}

fn d_rot_y(s: f64, c: f64) -> Matrix3<f64> {
    Matrix3::new(-s, 0.0, c, 0.0, 0.0, 0.0, -c, 0.0, -s)
}

fn d_rot_z(s: f64, c: f64) -> Matrix3<f64> {
    Matrix3::new(-s, -c, 0.0, c, -s, 0.0, 0.0, 0.0, 0.0)
}

/// Rotation matrix for Euler angles, `Rz(yaw) * Ry(pitch) * Rx(roll)`.
///
/// The composition of elementary rotations is orthonormal for every angle
/// triple, including pitch = ±π/2.
pub fn euler_rotation(roll: f64, pitch: f64, yaw: f64) -> Matrix3<f64> {
    let (sx, cx) = sin_cos(roll);
    let (sy, cy) = sin_cos(pitch);
    let (sz, cz) = sin_cos(yaw);
    rot_z(sz, cz) * rot_y(sy, cy) * rot_x(sx, cx)
}

/// Below this `cos(pitch)` the roll and yaw axes coincide.
const GIMBAL_LOCK_EPSILON: f64 = 1.5e-8;

/// Euler angles `(roll, pitch, yaw)` of a rotation matrix, inverse of [`euler_rotation`].
///
/// At gimbal lock only `roll - yaw` (pitch = π/2) or `roll + yaw`
/// (pitch = -π/2) is determined; roll is set to zero and yaw carries the
/// whole rotation about the shared axis.
pub fn euler_angles(r: &Matrix3<f64>) -> (f64, f64, f64) {
    let cos_pitch = r[(0, 0)].hypot(r[(1, 0)]);
    let pitch = (-r[(2, 0)]).atan2(cos_pitch);

    if cos_pitch < GIMBAL_LOCK_EPSILON {
        let yaw = (-r[(0, 1)]).atan2(r[(1, 1)]);
        return (0.0, pitch, yaw);
    }

    let roll = r[(2, 1)].atan2(r[(2, 2)]);
    let yaw = r[(1, 0)].atan2(r[(0, 0)]);
    (roll, pitch, yaw)
}

/// Rotation matrix of a unit quaternion `(w, x, y, z)`.
pub fn quaternion_rotation(q: &Vector4<f64>) -> Matrix3<f64> {
    let (w, x, y, z) = (q[0], q[1], q[2], q[3]);
    Matrix3::new(
        1.0 - 2.0 * (y * y + z * z),
        2.0 * (x * y - w * z),
        2.0 * (x * z + w * y),
        2.0 * (x * y + w * z),
        1.0 - 2.0 * (x * x + z * z),
        2.0 * (y * z - w * x),
        2.0 * (x * z - w * y),
        2.0 * (y * z + w * x),
        1.0 - 2.0 * (x * x + y * y),
    )
}

/// Derivatives of the Euler rotation matrix with respect to each angle.
#[derive(Debug, Clone)]
pub struct EulerDerivatives {
    /// The rotation itself, computed from the same sin/cos values.
    pub rotation: Matrix3<f64>,
    /// `[∂R/∂roll, ∂R/∂pitch, ∂R/∂yaw]`.
    pub d_rotation: [Matrix3<f64>; 3],
}

impl EulerDerivatives {
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        let (sx, cx) = sin_cos(roll);
        let (sy, cy) = sin_cos(pitch);
        let (sz, cz) = sin_cos(yaw);

        let rx = rot_x(sx, cx);
        let ry = rot_y(sy, cy);
        let rz = rot_z(sz, cz);

        Self {
            rotation: rz * ry * rx,
            d_rotation: [
                rz * ry * d_rot_x(sx, cx),
                rz * d_rot_y(sy, cy) * rx,
                d_rot_z(sz, cz) * ry * rx,
            ],
        }
    }

    /// `∂p_c/∂θ_k` for a world-frame offset `p_w - t`, for all three angles.
    pub fn camera_point_terms(&self, offset: &Vector3<f64>) -> [Vector3<f64>; 3] {
        [
            self.d_rotation[0].tr_mul(offset),
            self.d_rotation[1].tr_mul(offset),
            self.d_rotation[2].tr_mul(offset),
        ]
    }
}

/// Derivatives of `R(q / |q|)` with respect to the raw quaternion components.
///
/// The optimizer updates raw quaternions, so the normalization is part of the
/// differentiated function: `∂R/∂q = Σ ∂R/∂q̂ᵢ · ∂q̂ᵢ/∂q` with
/// `∂q̂/∂q = (I - q̂ q̂ᵀ) / |q|`.
#[derive(Debug, Clone)]
pub struct QuaternionDerivatives {
    /// Rotation of the normalized quaternion.
    pub rotation: Matrix3<f64>,
    /// `[∂R/∂w, ∂R/∂x, ∂R/∂y, ∂R/∂z]` with respect to the raw components.
    pub d_rotation: [Matrix3<f64>; 4],
}

impl QuaternionDerivatives {
    pub fn new(raw: &Vector4<f64>) -> Self {
        let norm = raw.norm();
        if norm < QUAT_NORM_EPSILON {
            // Degenerate: identity rotation, no usable direction.
            return Self {
                rotation: Matrix3::identity(),
                d_rotation: [Matrix3::zeros(); 4],
            };
        }

        let q = raw / norm;
        let (w, x, y, z) = (q[0], q[1], q[2], q[3]);

        // Derivatives with respect to the normalized components.
        let d_unit = [
            Matrix3::new(0.0, -z, y, z, 0.0, -x, -y, x, 0.0) * 2.0,
            Matrix3::new(0.0, y, z, y, -2.0 * x, -w, z, w, -2.0 * x) * 2.0,
            Matrix3::new(-2.0 * y, x, w, x, 0.0, z, -w, z, -2.0 * y) * 2.0,
            Matrix3::new(-2.0 * z, -w, x, w, -2.0 * z, y, x, y, 0.0) * 2.0,
        ];

        let projection = (Matrix4::identity() - q * q.transpose()) / norm;

        let mut d_rotation = [Matrix3::zeros(); 4];
        for (j, d) in d_rotation.iter_mut().enumerate() {
            for (i, d_unit_i) in d_unit.iter().enumerate() {
                *d += d_unit_i * projection[(i, j)];
            }
        }

        Self {
            rotation: quaternion_rotation(&q),
            d_rotation,
        }
    }

    /// `∂p_c/∂q_k` for a world-frame offset `p_w - t`, for all four components.
    pub fn camera_point_terms(&self, offset: &Vector3<f64>) -> [Vector3<f64>; 4] {
        [
            self.d_rotation[0].tr_mul(offset),
            self.d_rotation[1].tr_mul(offset),
            self.d_rotation[2].tr_mul(offset),
            self.d_rotation[3].tr_mul(offset),
        ]
    }
}
