//! Projection of source activity onto surface vertices.

use serde::{Deserialize, Serialize};
use visbrain_core::{Monitor, PointIndex, Result, VisbrainError, VisbrainObject};

use super::{is_left, SourceObj};
use crate::brain::BrainObj;

/// Number of vertices processed between two progress reports.
const BATCH_SIZE: usize = 4096;

/// What a projection writes on each vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionKind {
    /// Mean data of the contributing sources.
    #[default]
    Modulation,
    /// Number of contributing sources.
    Repartition,
}

impl ProjectionKind {
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "modulation" => Ok(Self::Modulation),
            "repartition" => Ok(Self::Repartition),
            other => Err(VisbrainError::invalid(format!(
                "unknown projection '{other}', use modulation or repartition"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectOptions {
    pub kind: ProjectionKind,
    /// Maximum source to vertex distance, inclusive.
    pub radius: f32,
    /// When `false`, a source only reaches vertices of its own hemisphere,
    /// with `x <= 0` on the left as in [`SourceSelect::Left`](super::SourceSelect::Left).
    pub contribute: bool,
}

impl Default for ProjectOptions {
    fn default() -> Self {
        Self {
            kind: ProjectionKind::Modulation,
            radius: 10.0,
            contribute: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionStatus {
    Painted,
    /// No vertex had a contributing source; every value is NaN.
    NoContributors,
}

/// Values written on the surface by [`project_sources`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionResult {
    /// One value per vertex, NaN where nothing was projected.
    pub values: Vec<f32>,
    pub kind: ProjectionKind,
    pub status: ProjectionStatus,
    pub n_painted: usize,
}

/// Projects the visible, unmasked sources onto the vertices of `brain`.
///
/// Each vertex collects the sources within `radius`. Modulation stores
/// their mean data, repartition their count; vertices without contributor
/// get NaN. The values become the brain's projection overlay, colored with
/// the sources' color state. Progress is reported per batch of vertices and
/// cancellation is checked between batches.
#[allow(clippy::cast_precision_loss)]
pub fn project_sources(
    source: &SourceObj,
    brain: &mut BrainObj,
    options: &ProjectOptions,
    monitor: &mut Monitor<'_>,
) -> Result<ProjectionResult> {
    if !(options.radius >= 0.0) {
        return Err(VisbrainError::invalid(format!(
            "projection radius must be >= 0, got {}",
            options.radius
        )));
    }
    let data = match (options.kind, source.data()) {
        (ProjectionKind::Modulation, None) => {
            return Err(VisbrainError::invalid("modulation needs source data"));
        }
        (_, data) => data,
    };

    let keep = source.visible_and_not_masked();
    let contributors: Vec<usize> = (0..source.n_sources()).filter(|&j| keep[j]).collect();
    let points: Vec<_> = contributors.iter().map(|&j| source.xyz()[j]).collect();
    let index = PointIndex::new(&points, options.radius.max(1.0));

    let vertices = brain.vertices();
    let n = vertices.len();
    let mut values = vec![f32::NAN; n];
    let mut n_painted = 0;
    for start in (0..n).step_by(BATCH_SIZE) {
        monitor.check()?;
        let end = (start + BATCH_SIZE).min(n);
        for (v, value) in vertices[start..end].iter().zip(&mut values[start..end]) {
            let found = index
                .within(*v, options.radius)
                .into_iter()
                .map(|k| contributors[k as usize])
                .filter(|&j| options.contribute || is_left(source.xyz()[j].x) == is_left(v.x));
            let (mut count, mut sum) = (0_usize, 0.0_f32);
            for j in found {
                count += 1;
                if let Some(data) = data {
                    sum += data[j];
                }
            }
            if count > 0 {
                n_painted += 1;
                *value = match options.kind {
                    ProjectionKind::Modulation => sum / count as f32,
                    ProjectionKind::Repartition => count as f32,
                };
            }
        }
        monitor.report(end, n, "projection");
    }

    let status = if n_painted == 0 {
        log::warn!(
            "no source of '{}' within {} of '{}'",
            source.name(),
            options.radius,
            brain.name()
        );
        ProjectionStatus::NoContributors
    } else {
        ProjectionStatus::Painted
    };
    log::debug!("{:?} painted {n_painted}/{n} vertices", options.kind);
    source.source_color_state().borrow_mut().set_data_range(&values);
    brain.set_projection_overlay(values.clone(), source.source_color_state().clone())?;
    Ok(ProjectionResult {
        values,
        kind: options.kind,
        status,
        n_painted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{SourceSelect, VisibleOptions};
    use crate::templates::SurfaceTemplate;
    use glam::Vec3;
    use proptest::prelude::*;

    fn brain_at(vertices: Vec<Vec3>) -> BrainObj {
        let template = SurfaceTemplate {
            vertices,
            faces: vec![],
            normals: None,
            lr_index: None,
        };
        BrainObj::from_template("b", &template).unwrap()
    }

    #[test]
    fn test_modulation_means() {
        let mut brain = brain_at(vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(4.0, 0.0, 0.0), Vec3::new(50.0, 0.0, 0.0)]);
        let source = SourceObj::new("s", vec![Vec3::new(1.0, 0.0, 0.0), Vec3::new(3.0, 0.0, 0.0)])
            .unwrap()
            .with_data(vec![2.0, 4.0])
            .unwrap();
        let options = ProjectOptions {
            radius: 5.0,
            contribute: true,
            ..ProjectOptions::default()
        };
        let result = project_sources(&source, &mut brain, &options, &mut Monitor::none()).unwrap();
        assert_eq!(&result.values[..2], &[3.0, 3.0]);
        assert!(result.values[2].is_nan());
        assert_eq!(result.n_painted, 2);
        assert_eq!(brain.projection_overlay().unwrap().len(), 3);
    }

    #[test]
    fn test_masked_sources_do_not_contribute() {
        let mut brain = brain_at(vec![Vec3::X]);
        let mut source = SourceObj::new("s", vec![Vec3::X]).unwrap().with_data(vec![1.0]).unwrap();
        source.set_mask(vec![true]).unwrap();
        let result = project_sources(&source, &mut brain, &ProjectOptions::default(), &mut Monitor::none()).unwrap();
        assert_eq!(result.status, ProjectionStatus::NoContributors);
        assert!(result.values.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_modulation_needs_data_and_radius() {
        let mut brain = brain_at(vec![Vec3::X]);
        let source = SourceObj::new("s", vec![Vec3::X]).unwrap();
        assert!(project_sources(&source, &mut brain, &ProjectOptions::default(), &mut Monitor::none()).is_err());
        let options = ProjectOptions {
            kind: ProjectionKind::Repartition,
            radius: -1.0,
            ..ProjectOptions::default()
        };
        assert!(project_sources(&source, &mut brain, &options, &mut Monitor::none()).is_err());
    }

    #[test]
    fn test_midline_counts_as_left() {
        let mut brain = brain_at(vec![Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)]);
        let source = SourceObj::new("s", vec![Vec3::ZERO]).unwrap().with_data(vec![2.0]).unwrap();
        let result = project_sources(&source, &mut brain, &ProjectOptions::default(), &mut Monitor::none()).unwrap();
        assert_eq!(result.values[0], 2.0);
        assert!(result.values[1].is_nan());

        let mut source = source;
        source.set_visible_sources(SourceSelect::Left, &VisibleOptions::default()).unwrap();
        assert_eq!(source.visible(), &[true]);
    }

    #[test]
    fn test_cancelled_projection() {
        let mut brain = brain_at(vec![Vec3::X]);
        let source = SourceObj::new("s", vec![Vec3::X]).unwrap().with_data(vec![1.0]).unwrap();
        let cancel = || true;
        let mut monitor = Monitor::none().with_cancel(&cancel);
        let result = project_sources(&source, &mut brain, &ProjectOptions::default(), &mut monitor);
        assert!(matches!(result, Err(VisbrainError::Cancelled)));
    }

    fn points() -> impl Strategy<Value = Vec<Vec3>> {
        prop::collection::vec((-30.0_f32..30.0, -30.0_f32..30.0, -30.0_f32..30.0), 1..20)
            .prop_map(|v| v.into_iter().map(|(x, y, z)| Vec3::new(x, y, z)).collect())
    }

    proptest! {
        #[test]
        fn prop_painted_vertices_have_a_close_source(
            vertices in points(),
            sources in points(),
            radius in 1.0_f32..20.0,
        ) {
            let mut brain = brain_at(vertices.clone());
            let data = vec![1.0; sources.len()];
            let source = SourceObj::new("s", sources.clone()).unwrap().with_data(data).unwrap();
            let options = ProjectOptions { radius, contribute: false, ..ProjectOptions::default() };
            let result = project_sources(&source, &mut brain, &options, &mut Monitor::none()).unwrap();
            for (v, value) in vertices.iter().zip(&result.values) {
                let close = sources.iter().any(|s| s.distance(*v) <= radius && is_left(s.x) == is_left(v.x));
                prop_assert_eq!(value.is_finite(), close);
            }
        }
    }
}
