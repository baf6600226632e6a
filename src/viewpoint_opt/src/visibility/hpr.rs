//! Spherical-flip visibility test.
//!
//! Each camera-frame point `p` is reflected through a sphere of radius `R`
//! centered at the camera: `p' = p + 2 (R - |p|) p / |p|`. Points whose flipped
//! image is a vertex of the convex hull of all flipped points plus the camera
//! center are visible; the rest are hidden behind nearer geometry.

use nalgebra::Vector3;
use tracing::debug;

use super::hull::convex_hull_vertices;
use super::{OcclusionParams, Visibility};
use crate::filtering::CameraPoint;

/// Norms below this are treated as sitting on the camera center.
const MIN_POINT_NORM: f64 = 1e-12;

/// Classify camera-frame points as visible or occluded.
///
/// Fewer than four points, or a configuration with no hull volume, leaves
/// every point visible.
pub fn hidden_point_removal(points: &[Vector3<f64>], params: &OcclusionParams) -> Vec<Visibility> {
    let all_visible = || vec![Visibility::Visible; points.len()];

    if !params.enabled || points.len() < 4 {
        return all_visible();
    }

    let max_norm = points.iter().map(|p| p.norm()).fold(0.0, f64::max);
    if max_norm < MIN_POINT_NORM {
        return all_visible();
    }
    let radius = max_norm * 10f64.powf(params.radius_exponent);

    let mut flipped: Vec<Vector3<f64>> = points
        .iter()
        .map(|p| {
            let norm = p.norm();
            if norm < MIN_POINT_NORM {
                *p
            } else {
                p + p * (2.0 * (radius - norm) / norm)
            }
        })
        .collect();
    // Camera center closes the hull
    flipped.push(Vector3::zeros());

    let Some(vertices) = convex_hull_vertices(&flipped) else {
        debug!(
            num_points = points.len(),
            "degenerate hull in hidden point removal, keeping all candidates"
        );
        return all_visible();
    };

    let mut visibility = vec![Visibility::Occluded; points.len()];
    for index in vertices {
        if let Some(v) = visibility.get_mut(index) {
            *v = Visibility::Visible;
        }
    }
    visibility
}

/// Keep the visible subset of frustum candidates, preserving order.
pub fn visible_subset(candidates: &[CameraPoint], params: &OcclusionParams) -> Vec<CameraPoint> {
    if !params.enabled {
        return candidates.to_vec();
    }
    let camera: Vec<Vector3<f64>> = candidates.iter().map(|c| c.camera).collect();
    hidden_point_removal(&camera, params)
        .into_iter()
        .zip(candidates)
        .filter(|(v, _)| v.is_visible())
        .map(|(_, c)| *c)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn wall(depth: f64, half_extent: f64, steps: usize) -> Vec<Vector3<f64>> {
        let mut points = Vec::new();
        for i in 0..=steps {
            for j in 0..=steps {
                let x = -half_extent + 2.0 * half_extent * i as f64 / steps as f64;
                let y = -half_extent + 2.0 * half_extent * j as f64 / steps as f64;
                points.push(Vector3::new(x, y, depth));
            }
        }
        points
    }

    /// Fibonacci lattice on a sphere.
    fn sphere(center: Vector3<f64>, radius: f64, n: usize) -> Vec<Vector3<f64>> {
        let golden = PI * (3.0 - 5f64.sqrt());
        (0..n)
            .map(|i| {
                let y = 1.0 - 2.0 * (i as f64 + 0.5) / n as f64;
                let r = (1.0 - y * y).sqrt();
                let theta = golden * i as f64;
                center + Vector3::new(r * theta.cos(), y, r * theta.sin()) * radius
            })
            .collect()
    }

    #[test]
    fn test_too_few_points_visible() {
        let points = vec![Vector3::new(0.0, 0.0, 2.0), Vector3::new(0.0, 0.0, 4.0)];
        let vis = hidden_point_removal(&points, &OcclusionParams::default());
        assert_eq!(vis, vec![Visibility::Visible; 2]);
    }

    #[test]
    fn test_disabled_keeps_all() {
        let mut points = wall(2.0, 0.5, 4);
        points.push(Vector3::new(0.0, 0.0, 4.0));
        let vis = hidden_point_removal(&points, &OcclusionParams::disabled());
        assert!(vis.iter().all(|v| v.is_visible()));
    }

    #[test]
    fn test_wall_fully_visible() {
        let points = wall(3.0, 1.0, 10);
        let vis = hidden_point_removal(&points, &OcclusionParams::default());
        assert!(vis.iter().all(|v| v.is_visible()));
    }

    #[test]
    fn test_point_behind_wall_occluded() {
        let mut points = wall(2.0, 0.5, 4);
        // Directly behind the wall's center sample
        points.push(Vector3::new(0.0, 0.0, 4.0));
        let behind = points.len() - 1;

        let vis = hidden_point_removal(&points, &OcclusionParams::default());
        assert_eq!(vis[behind], Visibility::Occluded);
        assert!(vis[..behind].iter().all(|v| v.is_visible()));
    }

    #[test]
    fn test_sphere_back_side_occluded() {
        let center = Vector3::new(0.0, 0.0, 3.0);
        let points = sphere(center, 1.0, 2000);
        let vis = hidden_point_removal(&points, &OcclusionParams::default());

        for (p, v) in points.iter().zip(&vis) {
            if p.z > 3.5 {
                assert_eq!(*v, Visibility::Occluded, "back point {p:?} marked visible");
            }
            if p.z < 2.2 {
                assert_eq!(*v, Visibility::Visible, "front point {p:?} marked occluded");
            }
        }
    }

    #[test]
    fn test_visible_subset_preserves_indices() {
        let mut points = wall(2.0, 0.5, 4);
        points.push(Vector3::new(0.0, 0.0, 4.0));
        let candidates: Vec<CameraPoint> = points
            .iter()
            .enumerate()
            .map(|(i, p)| CameraPoint {
                index: i * 10,
                camera: *p,
            })
            .collect();

        let visible = visible_subset(&candidates, &OcclusionParams::default());
        assert_eq!(visible.len(), candidates.len() - 1);
        assert!(visible.iter().all(|c| c.index != (candidates.len() - 1) * 10));
    }
}
