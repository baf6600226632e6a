//! Synthetic scenes for testing view optimization.
//!
//! Generators return plain xyz triples, in the same spirit as sensor input;
//! wrap them with [`PointCloud::new`](crate::geometry::PointCloud::new).

use nalgebra::{UnitQuaternion, Vector3};

use crate::geometry::Waypoint;

fn grid_steps(extent: f64, interval: f64) -> usize {
    (extent / interval).round() as usize + 1
}

/// Square wall in the plane `z = depth`, centered on the z axis.
///
/// A camera at the origin with identity orientation faces it head on.
///
/// # Arguments
/// * `depth` - Z coordinate of the wall
/// * `half_extent` - Half the side length
/// * `interval` - Grid spacing between points
pub fn make_wall(depth: f64, half_extent: f64, interval: f64) -> Vec<[f64; 3]> {
    let n = grid_steps(2.0 * half_extent, interval);
    let mut points = Vec::with_capacity(n * n);

    for i in 0..n {
        for j in 0..n {
            let x = -half_extent + interval * (j as f64);
            let y = -half_extent + interval * (i as f64);
            points.push([x, y, depth]);
        }
    }

    points
}

/// Three orthogonal planes meeting at the origin (XY, YZ and ZX).
///
/// # Arguments
/// * `length` - Side length of each plane
/// * `interval` - Grid spacing between points
pub fn make_half_cubic(length: f64, interval: f64) -> Vec<[f64; 3]> {
    let n = grid_steps(length, interval);
    let mut points = Vec::with_capacity(3 * n * n);

    for i in 0..n {
        for j in 0..n {
            let u = interval * (j as f64);
            let v = interval * (i as f64);
            points.push([u, v, 0.0]);
            points.push([0.0, u, v]);
            points.push([u, 0.0, v]);
        }
    }

    points
}

/// Closed box of side `size` centered at the origin: four walls, floor and ceiling.
pub fn make_box_room(size: f64, interval: f64) -> Vec<[f64; 3]> {
    let half = size / 2.0;
    let n = grid_steps(size, interval);
    let mut points = Vec::with_capacity(6 * n * n);

    for i in 0..n {
        for j in 0..n {
            let u = -half + interval * (j as f64);
            let v = -half + interval * (i as f64);
            points.push([u, v, -half]);
            points.push([u, v, half]);
            points.push([u, -half, v]);
            points.push([u, half, v]);
            points.push([-half, u, v]);
            points.push([half, u, v]);
        }
    }

    points
}

/// Random points uniformly inside a sphere.
///
/// # Arguments
/// * `center` - Center of the sphere
/// * `radius` - Radius of the sphere
/// * `num_points` - Number of points to generate
/// * `seed` - Random seed for reproducibility
pub fn make_random_sphere(
    center: [f64; 3],
    radius: f64,
    num_points: usize,
    seed: u64,
) -> Vec<[f64; 3]> {
    // LCG keeps this usable outside dev builds
    let mut rng_state = seed;
    let mut next_random = || -> f64 {
        rng_state = rng_state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((rng_state >> 11) as f64) / ((1u64 << 53) as f64)
    };

    let mut points = Vec::with_capacity(num_points);

    while points.len() < num_points {
        let u = next_random() * 2.0 - 1.0;
        let v = next_random() * 2.0 - 1.0;
        let w = next_random() * 2.0 - 1.0;

        let r2 = u * u + v * v + w * w;
        if r2 <= 1.0 && r2 > 0.0 {
            let r = next_random().cbrt() * radius;
            let scale = r / r2.sqrt();
            points.push([
                center[0] + u * scale,
                center[1] + v * scale,
                center[2] + w * scale,
            ]);
        }
    }

    points
}

/// Equally spaced waypoints along a straight line, all with the same orientation.
pub fn make_straight_path(
    start: Vector3<f64>,
    step: Vector3<f64>,
    count: usize,
    orientation: &UnitQuaternion<f64>,
) -> Vec<Waypoint> {
    (0..count)
        .map(|i| Waypoint::from_unit_quaternion(start + step * i as f64, orientation))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wall_size() {
        let wall = make_wall(3.0, 0.5, 0.1);
        assert_eq!(wall.len(), 121);
        assert!(wall.iter().all(|p| p[2] == 3.0));
    }

    #[test]
    fn test_half_cubic_size() {
        assert_eq!(make_half_cubic(2.0, 0.5).len(), 3 * 25);
    }

    #[test]
    fn test_box_room_bounds() {
        let room = make_box_room(4.0, 0.5);
        assert!(room
            .iter()
            .all(|p| p.iter().all(|v| v.abs() <= 2.0 + 1e-12)));
    }

    #[test]
    fn test_random_sphere_reproducible() {
        let a = make_random_sphere([1.0, 0.0, 0.0], 2.0, 100, 42);
        let b = make_random_sphere([1.0, 0.0, 0.0], 2.0, 100, 42);
        assert_eq!(a, b);
        for p in &a {
            let d = ((p[0] - 1.0).powi(2) + p[1].powi(2) + p[2].powi(2)).sqrt();
            assert!(d <= 2.0 + 1e-9);
        }
    }

    #[test]
    fn test_straight_path() {
        let path = make_straight_path(
            Vector3::zeros(),
            Vector3::x(),
            3,
            &UnitQuaternion::identity(),
        );
        assert_eq!(path.len(), 3);
        assert_eq!(path[2].position, Vector3::new(2.0, 0.0, 0.0));
    }
}
