//! Surface and ROI templates.
//!
//! Two templates are built in and always available: the `sphere` surface
//! (an ellipsoidal icosphere split into hemispheres) and the `demo` atlas.
//! Other templates are JSON files under the data directory:
//! `templates/<name>.json` for surfaces and `roi/<name>.json` for atlases.

use std::fs;
use std::path::{Path, PathBuf};

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use visbrain_core::mesh::{icosphere, rebase_faces, vertex_normals};
use visbrain_core::options::{roi_dir, templates_dir};
use visbrain_core::transform::{affine_from_rows, affine_to_rows};
use visbrain_core::{LabelTable, Result, TriMesh, Volume, VisbrainError};

/// Name of the built-in surface.
pub const SPHERE_TEMPLATE: &str = "sphere";
/// Name of the built-in atlas.
pub const DEMO_ATLAS: &str = "demo";

/// A surface template as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceTemplate {
    pub vertices: Vec<Vec3>,
    pub faces: Vec<[u32; 3]>,
    #[serde(default)]
    pub normals: Option<Vec<Vec3>>,
    /// `true` for left-hemisphere vertices.
    #[serde(default)]
    pub lr_index: Option<Vec<bool>>,
}

impl SurfaceTemplate {
    /// The built-in ellipsoid, roughly the extent of an MNI brain.
    pub fn sphere() -> Self {
        let (unit, faces) = icosphere(3);
        let radii = Vec3::new(65.0, 80.0, 60.0);
        let vertices: Vec<Vec3> = unit.iter().map(|v| *v * radii + Vec3::new(0.0, -18.0, 12.0)).collect();
        let lr_index = vertices.iter().map(|v| v.x <= 0.0).collect();
        let normals = vertex_normals(&vertices, &faces);
        Self {
            vertices,
            faces,
            normals: Some(normals),
            lr_index: Some(lr_index),
        }
    }

    /// Loads a template by name: the built-in sphere or a JSON file from the
    /// templates directory.
    pub fn load(name: &str) -> Result<Self> {
        if name == SPHERE_TEMPLATE {
            return Ok(Self::sphere());
        }
        Self::load_from(&template_path(&templates_dir(), name))
    }

    /// Loads a template from a JSON file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| VisbrainError::Template(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&text).map_err(|e| VisbrainError::Template(format!("cannot decode {}: {e}", path.display())))
    }

    /// Like [`SurfaceTemplate::load`], falling back to the sphere.
    pub fn load_or_sphere(name: &str) -> Self {
        Self::load(name).unwrap_or_else(|err| {
            log::warn!("{err}; using the built-in '{SPHERE_TEMPLATE}' template");
            Self::sphere()
        })
    }

    /// Builds a template from a mesh.
    pub fn from_mesh(mesh: &TriMesh, lr_index: Option<Vec<bool>>) -> Self {
        Self {
            vertices: mesh.vertices.clone(),
            faces: mesh.faces.clone(),
            normals: Some(mesh.normals.clone()),
            lr_index,
        }
    }

    /// Validated mesh of the template.
    pub fn to_mesh(&self) -> Result<TriMesh> {
        TriMesh::new(self.vertices.clone(), self.faces.clone(), self.normals.clone())
    }

    /// Writes the template to `path`. Faces are rebased to 0 and normals
    /// recomputed first.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let mut faces = self.faces.clone();
        rebase_faces(&mut faces);
        let normals = vertex_normals(&self.vertices, &faces);
        let out = Self {
            vertices: self.vertices.clone(),
            faces,
            normals: Some(normals),
            lr_index: self.lr_index.clone(),
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string(&out)?)?;
        log::info!("surface template saved to {}", path.display());
        Ok(())
    }

    /// Saves under `name` in the templates directory.
    pub fn save(&self, name: &str) -> Result<PathBuf> {
        let path = template_path(&templates_dir(), name);
        self.save_to(&path)?;
        Ok(path)
    }
}

/// An atlas as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiTemplate {
    pub vol: Volume<i32>,
    pub labels: LabelTable,
    /// Voxel to world affine, row-major.
    pub hdr: [[f32; 4]; 4],
}

impl RoiTemplate {
    /// The built-in atlas: two hemispheric shells and a midline block on a
    /// 4 mm grid.
    #[allow(clippy::cast_precision_loss)]
    pub fn demo() -> Self {
        let n = 21;
        let hdr = Mat4::from_scale_rotation_translation(Vec3::splat(4.0), glam::Quat::IDENTITY, Vec3::splat(-40.0));
        let mut vol = Volume::filled([n, n, n], 0_i32);
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    let p = hdr.transform_point3(Vec3::new(i as f32, j as f32, k as f32));
                    let label = if p.x.abs() <= 8.0 && p.y.abs() <= 12.0 && p.z.abs() <= 12.0 {
                        3
                    } else if p.length() <= 36.0 && p.x < -8.0 {
                        1
                    } else if p.length() <= 36.0 && p.x > 8.0 {
                        2
                    } else {
                        0
                    };
                    if label != 0 {
                        // In bounds by construction.
                        let _ = vol.set(i, j, k, label);
                    }
                }
            }
        }
        let labels = LabelTable::new(
            vec!["label".to_string(), "hemisphere".to_string()],
            vec![1, 2, 3],
            vec![
                vec!["Left cortex".to_string(), "left".to_string()],
                vec!["Right cortex".to_string(), "right".to_string()],
                vec!["Midline".to_string(), "both".to_string()],
            ],
        );
        Self {
            vol,
            labels: labels.unwrap_or_default(),
            hdr: affine_to_rows(hdr),
        }
    }

    /// Loads an atlas: the built-in demo or a JSON file from the ROI
    /// directory.
    pub fn load(name: &str) -> Result<Self> {
        if name == DEMO_ATLAS {
            return Ok(Self::demo());
        }
        let path = template_path(&roi_dir(), name);
        let text = fs::read_to_string(&path)
            .map_err(|e| VisbrainError::Template(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&text).map_err(|e| VisbrainError::Template(format!("cannot decode {}: {e}", path.display())))
    }

    /// Like [`RoiTemplate::load`], falling back to the demo atlas.
    pub fn load_or_demo(name: &str) -> Self {
        Self::load(name).unwrap_or_else(|err| {
            log::warn!("{err}; using the built-in '{DEMO_ATLAS}' atlas");
            Self::demo()
        })
    }

    pub fn hdr(&self) -> Mat4 {
        affine_from_rows(self.hdr)
    }

    /// Writes the atlas to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string(self)?)?;
        log::info!("ROI template saved to {}", path.display());
        Ok(())
    }
}

fn template_path(dir: &Path, name: &str) -> PathBuf {
    if name.ends_with(".json") {
        dir.join(name)
    } else {
        dir.join(format!("{name}.json"))
    }
}

/// Names of the available surface templates, built-in first.
pub fn available_surfaces() -> Vec<String> {
    available_in(&templates_dir(), SPHERE_TEMPLATE)
}

/// Names of the available atlases, built-in first.
pub fn available_atlases() -> Vec<String> {
    available_in(&roi_dir(), DEMO_ATLAS)
}

fn available_in(dir: &Path, builtin: &str) -> Vec<String> {
    let mut names = vec![builtin.to_string()];
    if let Ok(entries) = fs::read_dir(dir) {
        let mut found: Vec<String> = entries
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|e| e == "json"))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .filter(|n| n != builtin)
            .collect();
        found.sort();
        names.extend(found);
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_hemispheres() {
        let sphere = SurfaceTemplate::sphere();
        assert_eq!(sphere.vertices.len(), 642);
        assert_eq!(sphere.faces.len(), 1280);
        let lr = sphere.lr_index.as_ref().unwrap();
        assert!(lr.iter().any(|&l| l) && lr.iter().any(|&l| !l));
        for (v, &left) in sphere.vertices.iter().zip(lr) {
            assert_eq!(left, v.x <= 0.0);
        }
        assert!(sphere.to_mesh().is_ok());
    }

    #[test]
    fn test_save_rebases_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tri.json");
        let template = SurfaceTemplate {
            vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            faces: vec![[1, 2, 3]],
            normals: None,
            lr_index: None,
        };
        template.save_to(&path).unwrap();
        let loaded = SurfaceTemplate::load_from(&path).unwrap();
        assert_eq!(loaded.faces, vec![[0, 1, 2]]);
        assert_eq!(loaded.normals.unwrap().len(), 3);
    }

    #[test]
    fn test_unreadable_template_is_a_template_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(SurfaceTemplate::load_from(&path), Err(VisbrainError::Template(_))));
        assert!(matches!(
            SurfaceTemplate::load_from(&dir.path().join("missing.json")),
            Err(VisbrainError::Template(_))
        ));
    }

    #[test]
    fn test_demo_atlas() {
        let atlas = RoiTemplate::demo();
        assert_eq!(atlas.vol.shape(), [21, 21, 21]);
        for label in [1, 2, 3] {
            assert!(atlas.vol.data().contains(&label), "label {label} missing");
            assert!(atlas.labels.contains(label));
        }
        // Voxel (10, 10, 10) is the world origin.
        assert_eq!(atlas.hdr().transform_point3(Vec3::splat(10.0)), Vec3::ZERO);
        assert_eq!(atlas.vol.get(10, 10, 10), Some(3));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.json");
        atlas.save_to(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let back: RoiTemplate = serde_json::from_str(&text).unwrap();
        assert_eq!(back, atlas);
    }
}
