//! Frustum culling implementation.

use nalgebra::Vector3;

use super::{CameraPoint, FrustumParams, FrustumResult};
use crate::geometry::{CameraTransform, Intrinsics, PointCloud};
use crate::runtime::ExecutionContext;

/// Outcome of testing one camera-frame point against the frustum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Inside,
    OutsideDepth,
    OutsideImage,
}

/// Test a camera-frame point against the depth range and image bounds.
#[inline]
pub fn classify_point(
    camera: &Vector3<f64>,
    intrinsics: &Intrinsics,
    params: &FrustumParams,
) -> Classification {
    if camera.z < params.min_dist || camera.z > params.max_dist {
        return Classification::OutsideDepth;
    }
    match intrinsics.project(camera) {
        Some((u, v)) if intrinsics.contains(u, v) => Classification::Inside,
        _ => Classification::OutsideImage,
    }
}

/// Transform a world cloud into the camera frame and keep points inside the frustum.
///
/// An empty result is a valid outcome (nothing in view), not an error.
pub fn frustum_cull(
    cloud: &PointCloud,
    transform: &CameraTransform,
    intrinsics: &Intrinsics,
    params: &FrustumParams,
    ctx: &ExecutionContext,
) -> FrustumResult {
    let points = cloud.points();

    let classified = ctx.map(points.len(), |index| {
        let camera = transform.world_to_camera(&points[index]);
        (index, camera, classify_point(&camera, intrinsics, params))
    });

    let mut result = FrustumResult {
        points: Vec::with_capacity(classified.len()),
        removed_by_depth: 0,
        removed_by_image: 0,
    };

    for (index, camera, class) in classified {
        match class {
            Classification::Inside => result.points.push(CameraPoint { index, camera }),
            Classification::OutsideDepth => result.removed_by_depth += 1,
            Classification::OutsideImage => result.removed_by_image += 1,
        }
    }

    debug_assert_eq!(
        points.len(),
        result.points.len() + result.removed_by_depth + result.removed_by_image
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::EulerPose;
    use crate::runtime::Backend;
    use std::f64::consts::FRAC_PI_2;

    fn identity() -> CameraTransform {
        EulerPose::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0).transform()
    }

    #[test]
    fn test_cull_empty() {
        let cloud = PointCloud::new(vec![]).unwrap();
        let result = frustum_cull(
            &cloud,
            &identity(),
            &Intrinsics::default(),
            &FrustumParams::default(),
            &ExecutionContext::sequential(),
        );
        assert!(result.is_empty());
        assert_eq!(result.removed_by_depth, 0);
        assert_eq!(result.removed_by_image, 0);
    }

    #[test]
    fn test_cull_depth_range() {
        let cloud = PointCloud::new(vec![
            [0.0, 0.0, 0.5],  // too close
            [0.0, 0.0, 3.0],  // pass
            [0.0, 0.0, 5.0],  // pass (inclusive)
            [0.0, 0.0, 7.0],  // too far
            [0.0, 0.0, -3.0], // behind
        ])
        .unwrap();

        let result = frustum_cull(
            &cloud,
            &identity(),
            &Intrinsics::default(),
            &FrustumParams::default(),
            &ExecutionContext::sequential(),
        );

        let kept: Vec<usize> = result.points.iter().map(|p| p.index).collect();
        assert_eq!(kept, vec![1, 2]);
        assert_eq!(result.removed_by_depth, 3);
    }

    #[test]
    fn test_cull_image_bounds() {
        // fx = 500, cx = 320: x/z must be in [-0.64, 0.64)
        let cloud = PointCloud::new(vec![
            [0.5, 0.0, 1.0],  // u = 570
            [0.7, 0.0, 1.0],  // u = 670, outside
            [0.0, 0.5, 1.0],  // v = 490, outside
            [0.0, -0.4, 1.0], // v = 40
        ])
        .unwrap();

        let result = frustum_cull(
            &cloud,
            &identity(),
            &Intrinsics::default(),
            &FrustumParams::default(),
            &ExecutionContext::sequential(),
        );

        let kept: Vec<usize> = result.points.iter().map(|p| p.index).collect();
        assert_eq!(kept, vec![0, 3]);
        assert_eq!(result.removed_by_image, 2);
    }

    #[test]
    fn test_cull_rotated_camera() {
        // Camera at origin rotated so its +Z axis points along world +X.
        let pose = EulerPose::new(0.0, 0.0, 0.0, 0.0, FRAC_PI_2, 0.0);
        let cloud = PointCloud::new(vec![[3.0, 0.0, 0.0], [0.0, 0.0, 3.0]]).unwrap();

        let result = frustum_cull(
            &cloud,
            &pose.transform(),
            &Intrinsics::default(),
            &FrustumParams::default(),
            &ExecutionContext::sequential(),
        );

        assert_eq!(result.points.len(), 1);
        assert_eq!(result.points[0].index, 0);
        assert!((result.points[0].camera.z - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_cull_parallel_matches_sequential() {
        let points: Vec<[f64; 3]> = (0..500)
            .map(|i| {
                let t = i as f64 * 0.05;
                [t.sin() * 2.0, t.cos() * 1.5, 0.5 + (i % 13) as f64 * 0.5]
            })
            .collect();
        let cloud = PointCloud::new(points).unwrap();
        let transform = identity();
        let k = Intrinsics::default();
        let params = FrustumParams::default();

        let seq = frustum_cull(&cloud, &transform, &k, &params, &ExecutionContext::sequential());
        let par = frustum_cull(
            &cloud,
            &transform,
            &k,
            &params,
            &ExecutionContext::new(Backend::Parallel { threads: 2 }),
        );

        assert_eq!(seq.points, par.points);
        assert_eq!(seq.removed_by_depth, par.removed_by_depth);
    }
}
