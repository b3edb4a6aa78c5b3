//! Affine helpers and anatomical coordinate conversions.

#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use glam::{Mat3, Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Anatomical coordinate system of a set of positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateSystem {
    #[default]
    Mni,
    Talairach,
}

impl CoordinateSystem {
    /// Converts `p` from this system to MNI.
    pub fn to_mni(self, p: Vec3) -> Vec3 {
        match self {
            Self::Mni => p,
            Self::Talairach => tal2mni(p),
        }
    }
}

/// Builds an affine from row-major rows, the way headers are written.
pub fn affine_from_rows(rows: [[f32; 4]; 4]) -> Mat4 {
    Mat4::from_cols_array_2d(&rows).transpose()
}

/// Row-major rows of an affine.
pub fn affine_to_rows(m: Mat4) -> [[f32; 4]; 4] {
    m.transpose().to_cols_array_2d()
}

/// The inverse of `hdr`, or `None` when it is singular.
pub fn invert_affine(hdr: Mat4) -> Option<Mat4> {
    let det = hdr.determinant();
    if !det.is_finite() || det.abs() < 1e-12 {
        return None;
    }
    Some(hdr.inverse())
}

/// Nearest voxel of world position `p` given the inverse header, or `None`
/// when it falls outside `shape`.
pub fn world_to_voxel(hdr_inv: Mat4, p: Vec3, shape: [usize; 3]) -> Option<[usize; 3]> {
    let v = hdr_inv.transform_point3(p).round();
    if !v.is_finite() {
        return None;
    }
    let mut out = [0_usize; 3];
    for (axis, slot) in out.iter_mut().enumerate() {
        let c = v[axis];
        if c < 0.0 || c >= shape[axis] as f32 {
            return None;
        }
        *slot = c as usize;
    }
    Some(out)
}

/// World position of voxel `(i, j, k)`.
#[allow(clippy::cast_precision_loss)]
pub fn voxel_to_world(hdr: Mat4, voxel: [usize; 3]) -> Vec3 {
    hdr.transform_point3(Vec3::new(voxel[0] as f32, voxel[1] as f32, voxel[2] as f32))
}

/// Talairach to MNI (Brett's piecewise transform): a different linear map
/// is used above and below the AC plane.
pub fn tal2mni(p: Vec3) -> Vec3 {
    brett_matrix(p.z).inverse() * p
}

/// Forward MNI to Talairach, the inverse of [`tal2mni`].
pub fn mni2tal(p: Vec3) -> Vec3 {
    brett_matrix(p.z) * p
}

fn brett_matrix(z: f32) -> Mat3 {
    let rows = if z < 0.0 {
        [[0.99, 0.0, 0.0], [0.0, 0.9688, 0.0420], [0.0, -0.0485, 0.8390]]
    } else {
        [[0.99, 0.0, 0.0], [0.0, 0.9688, 0.0460], [0.0, -0.0485, 0.9189]]
    };
    Mat3::from_cols_array_2d(&rows).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_round_trip() {
        let rows = [[2.0, 0.0, 0.0, -90.0], [0.0, 2.0, 0.0, -126.0], [0.0, 0.0, 2.0, -72.0], [0.0, 0.0, 0.0, 1.0]];
        let m = affine_from_rows(rows);
        assert_eq!(m.transform_point3(Vec3::ZERO), Vec3::new(-90.0, -126.0, -72.0));
        assert_eq!(affine_to_rows(m), rows);
    }

    #[test]
    fn test_world_to_voxel() {
        let inv = invert_affine(Mat4::IDENTITY).unwrap();
        assert_eq!(world_to_voxel(inv, Vec3::new(1.2, 0.9, 1.4), [3, 3, 3]), Some([1, 1, 1]));
        assert_eq!(world_to_voxel(inv, Vec3::new(3.0, 0.0, 0.0), [3, 3, 3]), None);
        assert_eq!(world_to_voxel(inv, Vec3::new(-0.7, 0.0, 0.0), [3, 3, 3]), None);
        assert!(invert_affine(Mat4::ZERO).is_none());
    }

    #[test]
    fn test_tal2mni() {
        let tal = Vec3::new(10.0, 20.0, 30.0);
        let mni = tal2mni(tal);
        assert!((mni.x - 10.0 / 0.99).abs() < 1e-4);
        assert!((mni2tal(mni) - tal).length() < 1e-3);
        let below = Vec3::new(0.0, 0.0, -20.0);
        assert!((mni2tal(tal2mni(below)) - below).length() < 1e-3);
    }
}
