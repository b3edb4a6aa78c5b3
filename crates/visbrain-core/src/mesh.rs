//! Triangle mesh utilities.
//!
//! This module contains the mesh computations shared by the brain and ROI
//! objects:
//! - Face rebasing and index validation
//! - Face and vertex normals
//! - Vertex adjacency and graph neighborhoods
//! - Bounding boxes
//! - Icosphere generation for the built-in template

use std::collections::{HashMap, VecDeque};

use glam::{Mat4, Vec3};

use crate::error::{Result, VisbrainError};

/// An indexed triangle mesh with unit vertex normals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriMesh {
    pub vertices: Vec<Vec3>,
    pub faces: Vec<[u32; 3]>,
    pub normals: Vec<Vec3>,
}

impl TriMesh {
    /// Builds a mesh from raw arrays.
    ///
    /// Faces are rebased so that the smallest index is 0 and then checked
    /// against the vertex count. Normals are computed when `normals` is
    /// `None`, otherwise they are normalized.
    pub fn new(vertices: Vec<Vec3>, mut faces: Vec<[u32; 3]>, normals: Option<Vec<Vec3>>) -> Result<Self> {
        rebase_faces(&mut faces);
        validate_faces(&faces, vertices.len())?;
        let normals = match normals {
            Some(normals) => {
                if normals.len() != vertices.len() {
                    return Err(VisbrainError::SizeMismatch {
                        expected: vertices.len(),
                        actual: normals.len(),
                    });
                }
                normals.into_iter().map(unit_or_z).collect()
            }
            None => vertex_normals(&vertices, &faces),
        };
        Ok(Self {
            vertices,
            faces,
            normals,
        })
    }

    pub fn n_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn n_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Flips every normal.
    pub fn invert_normals(&mut self) {
        for n in &mut self.normals {
            *n = -*n;
        }
    }

    pub fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        bounding_box(&self.vertices)
    }

    /// Applies an affine transform to the vertices and recomputes normals.
    pub fn transform(&mut self, transform: Mat4) {
        for v in &mut self.vertices {
            *v = transform.transform_point3(*v);
        }
        self.normals = vertex_normals(&self.vertices, &self.faces);
    }

    /// Appends `other`, offsetting its face indices. Returns the range of
    /// face indices that now belong to `other`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn append(&mut self, other: &TriMesh) -> std::ops::Range<usize> {
        let offset = self.vertices.len() as u32;
        let start = self.faces.len();
        self.vertices.extend_from_slice(&other.vertices);
        self.normals.extend_from_slice(&other.normals);
        self.faces
            .extend(other.faces.iter().map(|f| [f[0] + offset, f[1] + offset, f[2] + offset]));
        start..self.faces.len()
    }

    /// Vertex-to-vertex adjacency lists.
    pub fn adjacency(&self) -> Vec<Vec<u32>> {
        vertex_adjacency(self.vertices.len(), &self.faces)
    }
}

fn unit_or_z(n: Vec3) -> Vec3 {
    let unit = n.normalize_or_zero();
    if unit == Vec3::ZERO {
        Vec3::Z
    } else {
        unit
    }
}

/// Bounds of the finite points, `None` when there are none.
pub fn bounding_box(points: &[Vec3]) -> Option<(Vec3, Vec3)> {
    points
        .iter()
        .filter(|p| p.is_finite())
        .fold(None, |acc, &p| match acc {
            None => Some((p, p)),
            Some((min, max)) => Some((min.min(p), max.max(p))),
        })
}

/// Shifts face indices so that the smallest one is 0.
pub fn rebase_faces(faces: &mut [[u32; 3]]) {
    let Some(min) = faces.iter().flatten().copied().min() else {
        return;
    };
    if min != 0 {
        log::debug!("rebasing faces by {min}");
        for face in faces.iter_mut() {
            for i in face.iter_mut() {
                *i -= min;
            }
        }
    }
}

/// Checks that every face index addresses a vertex.
pub fn validate_faces(faces: &[[u32; 3]], n_vertices: usize) -> Result<()> {
    if let Some(bad) = faces.iter().flatten().find(|&&i| i as usize >= n_vertices) {
        return Err(VisbrainError::invalid(format!(
            "face index {bad} out of range for {n_vertices} vertices"
        )));
    }
    Ok(())
}

/// Unit face normals from the cross product of the first two edges.
pub fn face_normals(vertices: &[Vec3], faces: &[[u32; 3]]) -> Vec<Vec3> {
    faces
        .iter()
        .map(|f| {
            let v0 = vertices[f[0] as usize];
            let e1 = vertices[f[1] as usize] - v0;
            let e2 = vertices[f[2] as usize] - v0;
            e1.cross(e2).normalize_or_zero()
        })
        .collect()
}

/// Area-weighted vertex normals. Isolated vertices get `+z`.
pub fn vertex_normals(vertices: &[Vec3], faces: &[[u32; 3]]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; vertices.len()];
    for f in faces {
        let v0 = vertices[f[0] as usize];
        // Unnormalized cross product is twice the area times the normal.
        let n = (vertices[f[1] as usize] - v0).cross(vertices[f[2] as usize] - v0);
        for &i in f {
            normals[i as usize] += n;
        }
    }
    normals.into_iter().map(unit_or_z).collect()
}

/// Sorted, deduplicated neighbor lists derived from the faces.
pub fn vertex_adjacency(n_vertices: usize, faces: &[[u32; 3]]) -> Vec<Vec<u32>> {
    let mut adjacency = vec![Vec::new(); n_vertices];
    for f in faces {
        for (a, b) in [(f[0], f[1]), (f[1], f[2]), (f[2], f[0])] {
            adjacency[a as usize].push(b);
            adjacency[b as usize].push(a);
        }
    }
    for neighbors in &mut adjacency {
        neighbors.sort_unstable();
        neighbors.dedup();
    }
    adjacency
}

/// Vertices within `steps` edges of `seed` (the seed included), in
/// breadth-first order.
pub fn neighborhood(adjacency: &[Vec<u32>], seed: u32, steps: usize) -> Vec<u32> {
    if seed as usize >= adjacency.len() {
        return Vec::new();
    }
    let mut depth: HashMap<u32, usize> = HashMap::from([(seed, 0)]);
    let mut order = vec![seed];
    let mut queue = VecDeque::from([seed]);
    while let Some(v) = queue.pop_front() {
        let d = depth[&v];
        if d == steps {
            continue;
        }
        for &n in &adjacency[v as usize] {
            if !depth.contains_key(&n) {
                depth.insert(n, d + 1);
                order.push(n);
                queue.push_back(n);
            }
        }
    }
    order
}

/// Unit icosphere with `subdivisions` levels of 4-to-1 refinement.
#[allow(clippy::cast_possible_truncation)]
pub fn icosphere(subdivisions: u32) -> (Vec<Vec3>, Vec<[u32; 3]>) {
    let t = (1.0 + 5.0_f32.sqrt()) / 2.0;
    let mut vertices: Vec<Vec3> = [
        (-1.0, t, 0.0),
        (1.0, t, 0.0),
        (-1.0, -t, 0.0),
        (1.0, -t, 0.0),
        (0.0, -1.0, t),
        (0.0, 1.0, t),
        (0.0, -1.0, -t),
        (0.0, 1.0, -t),
        (t, 0.0, -1.0),
        (t, 0.0, 1.0),
        (-t, 0.0, -1.0),
        (-t, 0.0, 1.0),
    ]
    .iter()
    .map(|&(x, y, z)| Vec3::new(x, y, z).normalize())
    .collect();
    let mut faces: Vec<[u32; 3]> = vec![
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    for _ in 0..subdivisions {
        let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
        let mut midpoint = |a: u32, b: u32, vertices: &mut Vec<Vec3>| -> u32 {
            let key = (a.min(b), a.max(b));
            *midpoints.entry(key).or_insert_with(|| {
                let m = ((vertices[a as usize] + vertices[b as usize]) * 0.5).normalize();
                vertices.push(m);
                (vertices.len() - 1) as u32
            })
        };
        let mut refined = Vec::with_capacity(faces.len() * 4);
        for [a, b, c] in faces {
            let ab = midpoint(a, b, &mut vertices);
            let bc = midpoint(b, c, &mut vertices);
            let ca = midpoint(c, a, &mut vertices);
            refined.extend([[a, ab, ca], [b, bc, ab], [c, ca, bc], [ab, bc, ca]]);
        }
        faces = refined;
    }
    (vertices, faces)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> (Vec<Vec3>, Vec<[u32; 3]>) {
        let v = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        (v, vec![[0, 1, 2], [0, 2, 3]])
    }

    #[test]
    fn test_rebase_faces() {
        let mut faces = vec![[1, 2, 3], [1, 3, 4]];
        rebase_faces(&mut faces);
        assert_eq!(faces, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn test_new_rebases_and_validates() {
        let (v, _) = quad();
        let mesh = TriMesh::new(v.clone(), vec![[1, 2, 3], [1, 3, 4]], None).unwrap();
        assert_eq!(mesh.faces[0], [0, 1, 2]);
        assert!(TriMesh::new(v, vec![[0, 1, 9]], None).is_err());
    }

    #[test]
    fn test_vertex_normals_are_unit() {
        let (v, f) = quad();
        let normals = vertex_normals(&v, &f);
        for n in normals {
            assert!((n - Vec3::Z).length() < 1e-6);
        }
        let (v, f) = icosphere(2);
        for n in vertex_normals(&v, &f) {
            assert!((n.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_icosphere_counts() {
        let (v, f) = icosphere(1);
        assert_eq!(v.len(), 42);
        assert_eq!(f.len(), 80);
        for p in v {
            assert!((p.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_neighborhood_depth() {
        // A path 0-1-2-3 built from two triangles sharing 1-2.
        let faces = vec![[0, 1, 2], [1, 2, 3]];
        let adj = vertex_adjacency(4, &faces);
        assert_eq!(adj[0], vec![1, 2]);
        assert_eq!(neighborhood(&adj, 0, 0), vec![0]);
        let mut one = neighborhood(&adj, 0, 1);
        one.sort_unstable();
        assert_eq!(one, vec![0, 1, 2]);
        assert_eq!(neighborhood(&adj, 0, 2).len(), 4);
        assert!(neighborhood(&adj, 17, 2).is_empty());
    }

    #[test]
    fn test_append_offsets_faces() {
        let (v, f) = quad();
        let mut a = TriMesh::new(v.clone(), f.clone(), None).unwrap();
        let b = TriMesh::new(v, f, None).unwrap();
        let range = a.append(&b);
        assert_eq!(range, 2..4);
        assert_eq!(a.faces[2], [4, 5, 6]);
    }

    #[test]
    fn test_bounding_box_skips_nan() {
        let pts = [Vec3::new(f32::NAN, 0.0, 0.0), Vec3::ONE, Vec3::splat(-1.0)];
        assert_eq!(bounding_box(&pts), Some((Vec3::splat(-1.0), Vec3::ONE)));
        assert_eq!(bounding_box(&[]), None);
    }
}
