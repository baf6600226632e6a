//! Incremental 3D convex hull (quickhull).
//!
//! Only the hull's vertex set is needed by hidden point removal, so faces are
//! plain triangles with an outward plane and the list of points still outside
//! them. Adjacency is kept in a directed-edge map: a face wound `a -> b -> c`
//! owns edges `(a, b)`, `(b, c)` and `(c, a)`, and its neighbor across `(a, b)`
//! is the face owning `(b, a)`.

use std::collections::HashMap;

use nalgebra::Vector3;

/// Plane-distance tolerance, relative to the largest absolute coordinate.
const RELATIVE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone)]
struct Face {
    vertices: [usize; 3],
    /// Unit outward normal (zero for a degenerate sliver)
    normal: Vector3<f64>,
    offset: f64,
    /// Points strictly above this face, not yet on the hull
    outside: Vec<usize>,
    alive: bool,
}

impl Face {
    fn new(vertices: [usize; 3], points: &[Vector3<f64>]) -> Self {
        let [a, b, c] = vertices;
        let n = (points[b] - points[a]).cross(&(points[c] - points[a]));
        let norm = n.norm();
        let normal = if norm > f64::MIN_POSITIVE {
            n / norm
        } else {
            Vector3::zeros()
        };
        Self {
            vertices,
            normal,
            offset: normal.dot(&points[a]),
            outside: Vec::new(),
            alive: true,
        }
    }

    #[inline]
    fn distance(&self, point: &Vector3<f64>) -> f64 {
        self.normal.dot(point) - self.offset
    }

    fn edges(&self) -> [(usize, usize); 3] {
        let [a, b, c] = self.vertices;
        [(a, b), (b, c), (c, a)]
    }
}

struct Hull<'a> {
    points: &'a [Vector3<f64>],
    faces: Vec<Face>,
    edges: HashMap<(usize, usize), usize>,
    tolerance: f64,
}

/// Indices of the points that are vertices of the convex hull, ascending.
///
/// Returns `None` when no hull with volume exists (fewer than 4 points, or all
/// points coplanar within tolerance) or when the construction hits a
/// numerically inconsistent state.
pub fn convex_hull_vertices(points: &[Vector3<f64>]) -> Option<Vec<usize>> {
    Hull::build(points).map(|hull| hull.vertices())
}

impl<'a> Hull<'a> {
    fn build(points: &'a [Vector3<f64>]) -> Option<Self> {
        if points.len() < 4 {
            return None;
        }

        let scale = points.iter().map(|p| p.amax()).fold(0.0, f64::max);
        let tolerance = RELATIVE_TOLERANCE * scale;
        let simplex = initial_simplex(points, tolerance)?;

        let mut hull = Self {
            points,
            faces: Vec::with_capacity(points.len() * 2),
            edges: HashMap::with_capacity(points.len() * 6),
            tolerance,
        };

        let centroid = simplex.iter().map(|&i| points[i]).sum::<Vector3<f64>>() / 4.0;
        let [a, b, c, d] = simplex;
        for tri in [[a, b, c], [a, b, d], [a, c, d], [b, c, d]] {
            let mut face = Face::new(tri, points);
            if face.distance(&centroid) > 0.0 {
                face = Face::new([tri[0], tri[2], tri[1]], points);
            }
            hull.push_face(face)?;
        }

        for (index, point) in points.iter().enumerate() {
            if simplex.contains(&index) {
                continue;
            }
            if let Some(face) = hull.farthest_face(point, 0) {
                hull.faces[face].outside.push(index);
            }
        }

        let mut cursor = 0;
        while cursor < hull.faces.len() {
            if hull.faces[cursor].alive && !hull.faces[cursor].outside.is_empty() {
                hull.add_eye_point(cursor)?;
            } else {
                cursor += 1;
            }
        }

        Some(hull)
    }

    fn push_face(&mut self, face: Face) -> Option<()> {
        let index = self.faces.len();
        for edge in face.edges() {
            if self.edges.insert(edge, index).is_some() {
                return None;
            }
        }
        self.faces.push(face);
        Some(())
    }

    /// Face among `first..` that `point` lies farthest above, if any.
    fn farthest_face(&self, point: &Vector3<f64>, first: usize) -> Option<usize> {
        let mut best = None;
        let mut best_distance = self.tolerance;
        for (index, face) in self.faces.iter().enumerate().skip(first) {
            if !face.alive {
                continue;
            }
            let distance = face.distance(point);
            if distance > best_distance {
                best_distance = distance;
                best = Some(index);
            }
        }
        best
    }

    /// Grow the hull to include the farthest outside point of `face_index`.
    fn add_eye_point(&mut self, face_index: usize) -> Option<()> {
        let (slot, _) = {
            let face = &self.faces[face_index];
            face.outside
                .iter()
                .enumerate()
                .map(|(slot, &p)| (slot, face.distance(&self.points[p])))
                .fold((0, f64::NEG_INFINITY), |best, cur| {
                    if cur.1 > best.1 {
                        cur
                    } else {
                        best
                    }
                })
        };
        let eye = self.faces[face_index].outside.swap_remove(slot);
        let eye_point = self.points[eye];

        // Flood the faces visible from the eye; their boundary is the horizon.
        let mut status: HashMap<usize, bool> = HashMap::new();
        status.insert(face_index, true);
        let mut visible = vec![face_index];
        let mut horizon = Vec::new();
        let mut cursor = 0;
        while cursor < visible.len() {
            let current = visible[cursor];
            cursor += 1;
            for (a, b) in self.faces[current].edges() {
                let neighbor = *self.edges.get(&(b, a))?;
                let is_visible = match status.get(&neighbor) {
                    Some(&known) => known,
                    None => {
                        let above = self.faces[neighbor].distance(&eye_point) > self.tolerance;
                        status.insert(neighbor, above);
                        if above {
                            visible.push(neighbor);
                        }
                        above
                    }
                };
                if !is_visible {
                    horizon.push((a, b));
                }
            }
        }

        let mut orphans = Vec::new();
        for &index in &visible {
            let face = &mut self.faces[index];
            face.alive = false;
            orphans.append(&mut face.outside);
            for edge in face.edges() {
                self.edges.remove(&edge);
            }
        }

        let first_new = self.faces.len();
        for (a, b) in horizon {
            self.push_face(Face::new([a, b, eye], self.points))?;
        }

        for index in orphans {
            if let Some(face) = self.farthest_face(&self.points[index], first_new) {
                self.faces[face].outside.push(index);
            }
        }

        Some(())
    }

    fn vertices(&self) -> Vec<usize> {
        let mut vertices: Vec<usize> = self
            .faces
            .iter()
            .filter(|f| f.alive)
            .flat_map(|f| f.vertices)
            .collect();
        vertices.sort_unstable();
        vertices.dedup();
        vertices
    }
}

/// Four affinely independent points to seed the hull, or `None` if the
/// input is flat within `tolerance`.
fn initial_simplex(points: &[Vector3<f64>], tolerance: f64) -> Option<[usize; 4]> {
    // Extremes along each axis: [min_x, max_x, min_y, max_y, min_z, max_z]
    let mut extremes = [0usize; 6];
    for (index, p) in points.iter().enumerate() {
        for axis in 0..3 {
            if p[axis] < points[extremes[2 * axis]][axis] {
                extremes[2 * axis] = index;
            }
            if p[axis] > points[extremes[2 * axis + 1]][axis] {
                extremes[2 * axis + 1] = index;
            }
        }
    }

    let mut best = (0.0, 0, 0);
    for i in 0..6 {
        for j in (i + 1)..6 {
            let d = (points[extremes[i]] - points[extremes[j]]).norm_squared();
            if d > best.0 {
                best = (d, extremes[i], extremes[j]);
            }
        }
    }
    let (length_sq, a, b) = best;
    if length_sq.sqrt() <= tolerance {
        return None;
    }

    let ab = (points[b] - points[a]).normalize();
    let (c, line_distance) = farthest(points, |p| ab.cross(&(p - points[a])).norm());
    if line_distance <= tolerance {
        return None;
    }

    let normal = ab.cross(&(points[c] - points[a])).normalize();
    let (d, plane_distance) = farthest(points, |p| normal.dot(&(p - points[a])).abs());
    if plane_distance <= tolerance {
        return None;
    }

    Some([a, b, c, d])
}

fn farthest<F>(points: &[Vector3<f64>], metric: F) -> (usize, f64)
where
    F: Fn(&Vector3<f64>) -> f64,
{
    points
        .iter()
        .enumerate()
        .map(|(i, p)| (i, metric(p)))
        .fold((0, f64::NEG_INFINITY), |best, cur| {
            if cur.1 > best.1 {
                cur
            } else {
                best
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal, Uniform};

    fn cube_corners() -> Vec<Vector3<f64>> {
        let mut points = Vec::new();
        for x in [0.0, 1.0] {
            for y in [0.0, 1.0] {
                for z in [0.0, 1.0] {
                    points.push(Vector3::new(x, y, z));
                }
            }
        }
        points
    }

    /// Every input point lies on or below every live face.
    fn assert_encloses(hull: &Hull<'_>) {
        for face in hull.faces.iter().filter(|f| f.alive) {
            for p in hull.points {
                assert!(face.distance(p) <= hull.tolerance * 10.0);
            }
        }
    }

    #[test]
    fn test_too_few_points() {
        let points = vec![Vector3::zeros(), Vector3::x(), Vector3::y()];
        assert!(convex_hull_vertices(&points).is_none());
    }

    #[test]
    fn test_coplanar_points() {
        let points: Vec<_> = (0..20)
            .map(|i| Vector3::new((i % 5) as f64, (i / 5) as f64, 2.0))
            .collect();
        assert!(convex_hull_vertices(&points).is_none());
    }

    #[test]
    fn test_collinear_points() {
        let points: Vec<_> = (0..10).map(|i| Vector3::new(i as f64, 0.0, 0.0)).collect();
        assert!(convex_hull_vertices(&points).is_none());
    }

    #[test]
    fn test_tetrahedron() {
        let points = vec![
            Vector3::zeros(),
            Vector3::x(),
            Vector3::y(),
            Vector3::z(),
        ];
        assert_eq!(convex_hull_vertices(&points).unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_cube_with_interior_points() {
        let mut points = cube_corners();
        points.push(Vector3::new(0.5, 0.5, 0.5));
        points.push(Vector3::new(0.2, 0.7, 0.4));

        let hull = Hull::build(&points).unwrap();
        assert_eq!(hull.vertices(), (0..8).collect::<Vec<_>>());
        assert_encloses(&hull);
    }

    #[test]
    fn test_sphere_points_all_on_hull() {
        let mut rng = StdRng::seed_from_u64(42);
        let normal = Normal::new(0.0, 1.0).unwrap();
        let radius = Uniform::new(0.0, 0.5);

        let mut points = Vec::new();
        for _ in 0..200 {
            let v = Vector3::new(
                normal.sample(&mut rng),
                normal.sample(&mut rng),
                normal.sample(&mut rng),
            );
            points.push(v.normalize());
        }
        for _ in 0..100 {
            let v = Vector3::new(
                normal.sample(&mut rng),
                normal.sample(&mut rng),
                normal.sample(&mut rng),
            );
            points.push(v.normalize() * radius.sample(&mut rng));
        }

        let hull = Hull::build(&points).unwrap();
        assert_eq!(hull.vertices(), (0..200).collect::<Vec<_>>());
        assert_encloses(&hull);

        // Closed triangulated surface: F = 2V - 4
        let live_faces = hull.faces.iter().filter(|f| f.alive).count();
        assert_eq!(live_faces, 2 * 200 - 4);
        // Every live directed edge has its twin
        for &(a, b) in hull.edges.keys() {
            assert!(hull.edges.contains_key(&(b, a)));
        }
    }

    #[test]
    fn test_large_offset_coordinates() {
        // Same cube far from the origin; tolerance scales with coordinates.
        let points: Vec<_> = cube_corners()
            .into_iter()
            .map(|p| p * 10.0 + Vector3::new(1000.0, -500.0, 250.0))
            .collect();
        assert_eq!(convex_hull_vertices(&points).unwrap().len(), 8);
    }
}
