//! Message types exchanged with the surrounding system.
//!
//! These carry the format of the inputs and outputs, not the transport.
//! Quaternions use explicit `{x, y, z, w}` fields; everything inside the crate
//! stores them `(w, x, y, z)`.

use nalgebra::{UnitQuaternion, Vector3, Vector4};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewOptError};
use crate::geometry::{check_unit_quaternion, EulerPose, Intrinsics, PointCloud, Waypoint};
use crate::optimization::{validate_path, PoseSolveResult, SolveStatus, TrajectorySolveResult};
use crate::scoring::ViewEvaluation;

fn default_frame_id() -> String {
    "map".to_string()
}

/// Orientation quaternion with named components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    pub fn identity() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }

    pub fn to_wxyz(self) -> Vector4<f64> {
        Vector4::new(self.w, self.x, self.y, self.z)
    }

    pub fn from_wxyz(q: &Vector4<f64>) -> Self {
        Self {
            w: q[0],
            x: q[1],
            y: q[2],
            z: q[3],
        }
    }

    pub fn from_unit(q: &UnitQuaternion<f64>) -> Self {
        Self {
            x: q.i,
            y: q.j,
            z: q.k,
            w: q.w,
        }
    }
}

/// Point cloud input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloudSnapshot {
    /// N rows of `[x, y, z]`, or 3 rows of N values.
    pub points: Vec<Vec<f64>>,
    #[serde(default = "default_frame_id")]
    pub frame_id: String,
    /// Seconds.
    #[serde(default)]
    pub stamp: f64,
}

impl PointCloudSnapshot {
    pub fn from_cloud(cloud: &PointCloud, frame_id: &str, stamp: f64) -> Self {
        Self {
            points: cloud.to_arrays().iter().map(|p| p.to_vec()).collect(),
            frame_id: frame_id.to_string(),
            stamp,
        }
    }

    /// Validate and convert to a [`PointCloud`].
    ///
    /// # Errors
    /// [`ViewOptError::EmptyPointCloud`] for an empty snapshot, otherwise the
    /// layout and finiteness errors of [`PointCloud::from_rows`].
    pub fn to_point_cloud(&self) -> Result<PointCloud> {
        if self.points.is_empty() {
            return Err(ViewOptError::EmptyPointCloud);
        }
        let cloud = PointCloud::from_rows(&self.points)?;
        if cloud.is_empty() {
            return Err(ViewOptError::EmptyPointCloud);
        }
        Ok(cloud)
    }
}

/// Orientation of an initial pose, either as Euler angles or a quaternion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Orientation {
    Euler { roll: f64, pitch: f64, yaw: f64 },
    Quaternion(Quaternion),
}

impl Default for Orientation {
    fn default() -> Self {
        Orientation::Euler {
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
        }
    }
}

/// Single-pose request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialPose {
    pub position: [f64; 3],
    #[serde(default)]
    pub orientation: Orientation,
    /// Overrides the configured intrinsics when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intrinsics: Option<Intrinsics>,
}

impl InitialPose {
    pub fn to_euler_pose(&self) -> Result<EulerPose> {
        if self.position.iter().any(|v| !v.is_finite()) {
            return Err(ViewOptError::NonFiniteInput {
                field: "initial pose position",
            });
        }
        let position = Vector3::from(self.position);

        match self.orientation {
            Orientation::Euler { roll, pitch, yaw } => {
                if [roll, pitch, yaw].iter().any(|v| !v.is_finite()) {
                    return Err(ViewOptError::NonFiniteInput {
                        field: "initial pose orientation",
                    });
                }
                Ok(EulerPose::new(
                    position.x, position.y, position.z, roll, pitch, yaw,
                ))
            }
            Orientation::Quaternion(q) => {
                let wxyz = q.to_wxyz();
                check_unit_quaternion(0, &wxyz)?;
                let waypoint = Waypoint::new(position, wxyz);
                Ok(EulerPose::from_quaternion(
                    position,
                    &waypoint.unit_quaternion(),
                ))
            }
        }
    }
}

/// One waypoint of a path message.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathWaypoint {
    pub position: [f64; 3],
    pub orientation: Quaternion,
}

impl From<&Waypoint> for PathWaypoint {
    fn from(waypoint: &Waypoint) -> Self {
        Self {
            position: waypoint.position.into(),
            orientation: Quaternion::from_wxyz(&waypoint.normalized_quat()),
        }
    }
}

/// Trajectory request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialPath {
    pub waypoints: Vec<PathWaypoint>,
    #[serde(default = "default_frame_id")]
    pub frame_id: String,
}

impl InitialPath {
    /// Validate and convert to waypoints.
    pub fn to_waypoints(&self) -> Result<Vec<Waypoint>> {
        let waypoints: Vec<Waypoint> = self
            .waypoints
            .iter()
            .map(|w| Waypoint::new(Vector3::from(w.position), w.orientation.to_wxyz()))
            .collect();
        validate_path(&waypoints)?;
        Ok(waypoints)
    }
}

/// Single-pose result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedPose {
    pub position: [f64; 3],
    /// Unit quaternion.
    pub orientation: Quaternion,
    /// Same orientation as `[roll, pitch, yaw]`.
    pub rpy: [f64; 3],
    pub objective: f64,
    pub initial_objective: f64,
    pub num_visible: usize,
    pub iterations: usize,
    pub status: SolveStatus,
    pub oscillation_count: usize,
}

impl From<&PoseSolveResult> for OptimizedPose {
    fn from(result: &PoseSolveResult) -> Self {
        let pose = &result.pose;
        Self {
            position: pose.position.into(),
            orientation: Quaternion::from_unit(&pose.unit_quaternion()),
            rpy: [pose.roll, pose.pitch, pose.yaw],
            objective: result.objective,
            initial_objective: result.initial_objective,
            num_visible: result.evaluation.num_visible(),
            iterations: result.iterations,
            status: result.status,
            oscillation_count: result.oscillation_count,
        }
    }
}

/// Trajectory result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedPath {
    /// Waypoints in input order with unit quaternions.
    pub waypoints: Vec<PathWaypoint>,
    pub frame_id: String,
    pub objective: f64,
    pub initial_objective: f64,
    pub view_objective: f64,
    pub smoothness: f64,
    pub length: f64,
    pub iterations: usize,
    pub status: SolveStatus,
    pub oscillation_count: usize,
}

impl OptimizedPath {
    pub fn from_result(result: &TrajectorySolveResult, frame_id: &str) -> Self {
        Self {
            waypoints: result.waypoints.iter().map(PathWaypoint::from).collect(),
            frame_id: frame_id.to_string(),
            objective: result.objective,
            initial_objective: result.initial_objective,
            view_objective: result.view_objective,
            smoothness: result.smoothness,
            length: result.length,
            iterations: result.iterations,
            status: result.status,
            oscillation_count: result.oscillation_count,
        }
    }
}

/// Per-point visibility and reward, aligned by index with the input cloud.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityReport {
    pub visible: Vec<bool>,
    /// Reward of each point, 0 where not visible.
    pub reward: Vec<f64>,
}

impl VisibilityReport {
    /// Report for a single view.
    pub fn from_evaluation(num_points: usize, evaluation: &ViewEvaluation) -> Self {
        Self::from_evaluations(num_points, std::slice::from_ref(evaluation))
    }

    /// Report over several views: a point is visible if any view sees it, and
    /// its reward is the maximum over the views that do.
    pub fn from_evaluations(num_points: usize, evaluations: &[ViewEvaluation]) -> Self {
        let mut visible = vec![false; num_points];
        let mut reward = vec![0.0_f64; num_points];

        for evaluation in evaluations {
            for (point, r) in evaluation.visible.iter().zip(&evaluation.rewards) {
                if let Some(seen) = visible.get_mut(point.index) {
                    *seen = true;
                    reward[point.index] = reward[point.index].max(*r);
                }
            }
        }

        Self { visible, reward }
    }

    pub fn num_visible(&self) -> usize {
        self.visible.iter().filter(|v| **v).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filtering::CameraPoint;
    use approx::assert_relative_eq;

    fn evaluation(points: &[(usize, f64)]) -> ViewEvaluation {
        ViewEvaluation {
            visible: points
                .iter()
                .map(|(index, _)| CameraPoint {
                    index: *index,
                    camera: Vector3::new(0.0, 0.0, 3.0),
                })
                .collect(),
            rewards: points.iter().map(|(_, r)| *r).collect(),
            objective: 0.0,
            num_candidates: points.len(),
        }
    }

    #[test]
    fn test_snapshot_layouts() {
        let rows: PointCloudSnapshot =
            serde_json::from_str(r#"{"points": [[0,0,1],[1,0,1],[0,1,1],[1,1,1]]}"#).unwrap();
        assert_eq!(rows.frame_id, "map");
        assert_eq!(rows.to_point_cloud().unwrap().len(), 4);

        let columns: PointCloudSnapshot =
            serde_json::from_str(r#"{"points": [[0,1,0,1],[0,0,1,1],[1,1,1,1]], "stamp": 2.5}"#)
                .unwrap();
        let cloud = columns.to_point_cloud().unwrap();
        assert_eq!(cloud.len(), 4);
        assert_eq!(cloud.points()[1], Vector3::new(1.0, 0.0, 1.0));
    }

    #[test]
    fn test_snapshot_rejects_bad_input() {
        let empty = PointCloudSnapshot {
            points: vec![],
            frame_id: "map".into(),
            stamp: 0.0,
        };
        assert_eq!(empty.to_point_cloud(), Err(ViewOptError::EmptyPointCloud));

        let ragged = PointCloudSnapshot {
            points: vec![vec![0.0, 1.0], vec![1.0, 2.0]],
            ..empty
        };
        assert!(matches!(
            ragged.to_point_cloud(),
            Err(ViewOptError::InvalidPointCloud(_))
        ));
    }

    #[test]
    fn test_initial_pose_orientations() {
        let euler: InitialPose = serde_json::from_str(
            r#"{"position": [1, 2, 3], "orientation": {"roll": 0.1, "pitch": 0.2, "yaw": 0.3}}"#,
        )
        .unwrap();
        let pose = euler.to_euler_pose().unwrap();
        assert_eq!(pose.pitch, 0.2);

        let q = UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3);
        let quat = InitialPose {
            position: [1.0, 2.0, 3.0],
            orientation: Orientation::Quaternion(Quaternion::from_unit(&q)),
            intrinsics: None,
        };
        let json = serde_json::to_string(&quat).unwrap();
        let parsed: InitialPose = serde_json::from_str(&json).unwrap();
        let pose = parsed.to_euler_pose().unwrap();
        assert_relative_eq!(pose.roll, 0.1, epsilon = 1e-9);
        assert_relative_eq!(pose.pitch, 0.2, epsilon = 1e-9);
        assert_relative_eq!(pose.yaw, 0.3, epsilon = 1e-9);

        let missing: InitialPose = serde_json::from_str(r#"{"position": [0, 0, 0]}"#).unwrap();
        assert_eq!(missing.to_euler_pose().unwrap(), EulerPose::default());
    }

    #[test]
    fn test_initial_pose_rejects_non_unit_quaternion() {
        let pose = InitialPose {
            position: [0.0; 3],
            orientation: Orientation::Quaternion(Quaternion {
                x: 0.0,
                y: 0.0,
                z: 0.0,
                w: 0.5,
            }),
            intrinsics: None,
        };
        assert!(matches!(
            pose.to_euler_pose(),
            Err(ViewOptError::NonUnitQuaternion { index: 0, .. })
        ));
    }

    #[test]
    fn test_initial_path_validation() {
        let path: InitialPath = serde_json::from_str(
            r#"{"waypoints": [
                {"position": [0, 0, 0], "orientation": {"x": 0, "y": 0, "z": 0, "w": 1}},
                {"position": [1, 0, 0], "orientation": {"x": 0, "y": 0, "z": 0, "w": 1}}
            ]}"#,
        )
        .unwrap();
        let waypoints = path.to_waypoints().unwrap();
        assert_eq!(waypoints[1].position, Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(waypoints[0].quat, Vector4::new(1.0, 0.0, 0.0, 0.0));

        let short = InitialPath {
            waypoints: path.waypoints[..1].to_vec(),
            frame_id: "map".into(),
        };
        assert_eq!(short.to_waypoints(), Err(ViewOptError::TooFewWaypoints(1)));
    }

    #[test]
    fn test_visibility_report_max_over_views() {
        let a = evaluation(&[(0, 0.2), (2, 0.9)]);
        let b = evaluation(&[(0, 0.7), (3, 0.4)]);

        let report = VisibilityReport::from_evaluations(5, &[a.clone(), b]);
        assert_eq!(report.visible, vec![true, false, true, true, false]);
        assert_eq!(report.reward, vec![0.7, 0.0, 0.9, 0.4, 0.0]);
        assert_eq!(report.num_visible(), 3);

        let single = VisibilityReport::from_evaluation(3, &a);
        assert_eq!(single.visible, vec![true, false, true]);
    }

    #[test]
    fn test_path_waypoint_normalizes() {
        let waypoint = Waypoint::new(Vector3::zeros(), Vector4::new(2.0, 0.0, 0.0, 0.0));
        let msg = PathWaypoint::from(&waypoint);
        assert_eq!(msg.orientation, Quaternion::identity());
    }
}
