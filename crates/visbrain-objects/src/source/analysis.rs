//! ROI analysis and coloring of sources.

use std::collections::BTreeMap;

use glam::Vec4;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use visbrain_core::error::check_len;
use visbrain_core::{array_to_colormap, Result, VisbrainError, VisbrainObject};

use super::SourceObj;
use crate::analysis::AnalysisTable;
use crate::roi::{LocalizeOptions, RoiObj};

/// Restricts the analysed sources to rows whose `column` holds one of
/// `values`.
#[derive(Debug, Clone, PartialEq)]
pub struct KeepOnly {
    pub column: String,
    pub values: Vec<String>,
}

/// Options of [`SourceObj::analyse_sources`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalysisOptions {
    pub keep_only: Option<KeepOnly>,
    /// Nearest labeled voxel search distance.
    pub distance: Option<f32>,
    pub bad_patterns: Vec<String>,
    pub replace_with: Option<String>,
}

/// How [`SourceObj::color_sources`] picks colors.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorBy {
    /// The source data through the source color state.
    Data,
    /// One seeded random color per distinct value of an analysis column.
    RandomPerLabel { column: String, seed: u64 },
    /// Explicit colors per value of an analysis column. Sources with another
    /// value keep the default color, or are hidden with `hide_others`.
    Custom {
        column: String,
        colors: BTreeMap<String, Vec4>,
        hide_others: bool,
    },
}

impl SourceObj {
    /// Looks up every source in each ROI and joins the tables. With more
    /// than one ROI the columns are prefixed with the ROI name.
    ///
    /// With `keep_only`, the sources whose row does not match are hidden and
    /// their rows dropped from the returned table.
    pub fn analyse_sources(&mut self, rois: &[&RoiObj], options: &AnalysisOptions) -> Result<AnalysisTable> {
        if rois.is_empty() {
            return Err(VisbrainError::EmptySelection("analyse_sources needs at least one ROI".to_string()));
        }
        let localize = LocalizeOptions {
            system: self.system,
            distance: options.distance,
            bad_patterns: options.bad_patterns.clone(),
            replace_with: options.replace_with.clone(),
        };
        let mut table = AnalysisTable::default();
        for roi in rois {
            let found = roi.localize_sources(&self.xyz, &localize)?;
            let prefix = if rois.len() > 1 {
                format!("{}:", roi.name())
            } else {
                String::new()
            };
            if table.columns().is_empty() {
                table = found;
                table.prefix_columns(&prefix);
            } else {
                table.join(found, &prefix)?;
            }
        }

        if let Some(keep) = &options.keep_only {
            let flags = table.retain_values(&keep.column, &keep.values)?;
            for (visible, keep) in self.visible.iter_mut().zip(flags) {
                *visible &= keep;
            }
            log::debug!(
                "sources '{}': {} kept by {}",
                self.node.name(),
                table.len(),
                keep.column
            );
        }
        self.analysis = Some(table.clone());
        Ok(table)
    }

    /// Recolors the sources.
    pub fn color_sources(&mut self, by: &ColorBy) -> Result<()> {
        let n = self.xyz.len();
        let colors = match by {
            ColorBy::Data => {
                let data = self
                    .data
                    .as_deref()
                    .ok_or_else(|| VisbrainError::invalid("coloring by data needs source data"))?;
                array_to_colormap(data, &self.color_state.borrow())
            }
            ColorBy::RandomPerLabel { column, seed } => {
                let values = self.analysis_column(column)?;
                let mut rng = StdRng::seed_from_u64(*seed);
                let mut palette: BTreeMap<&str, Vec4> = BTreeMap::new();
                for value in &values {
                    palette.insert(value.as_str(), Vec4::ZERO);
                }
                for color in palette.values_mut() {
                    *color = Vec4::new(rng.gen(), rng.gen(), rng.gen(), 1.0);
                }
                values.iter().map(|v| palette[v.as_str()]).collect()
            }
            ColorBy::Custom {
                column,
                colors,
                hide_others,
            } => {
                let values = self.analysis_column(column)?;
                let mut out = Vec::with_capacity(n);
                for (i, value) in values.iter().enumerate() {
                    match colors.get(value) {
                        Some(color) => out.push(*color),
                        None => {
                            if *hide_others {
                                self.visible[i] = false;
                            }
                            out.push(self.color);
                        }
                    }
                }
                out
            }
        };
        check_len(n, colors.len())?;
        self.custom_colors = Some(colors);
        Ok(())
    }

    /// Column of the last analysis, one value per source. Sources dropped by
    /// `keep_only` read as an empty string.
    fn analysis_column(&self, column: &str) -> Result<Vec<String>> {
        let table = self
            .analysis
            .as_ref()
            .ok_or_else(|| VisbrainError::invalid("run analyse_sources before coloring by label"))?;
        let mut values = vec![String::new(); self.xyz.len()];
        for (&i, value) in table.source_index().iter().zip(table.column(column)?) {
            values[i] = value.to_string();
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::RoiTemplate;
    use glam::Vec3;

    fn sources() -> SourceObj {
        SourceObj::new(
            "s",
            vec![Vec3::new(-20.0, 0.0, 0.0), Vec3::new(20.0, 0.0, 0.0), Vec3::ZERO, Vec3::splat(200.0)],
        )
        .unwrap()
    }

    #[test]
    fn test_analyse_single_roi() {
        let roi = RoiObj::from_template("demo", RoiTemplate::demo()).unwrap();
        let mut s = sources();
        let table = s.analyse_sources(&[&roi], &AnalysisOptions::default()).unwrap();
        assert_eq!(table.columns(), &["label", "hemisphere"]);
        assert_eq!(
            table.column("label").unwrap(),
            vec!["Left cortex", "Right cortex", "Midline", crate::analysis::NOT_FOUND]
        );
        assert!(s.analysis().is_some());
    }

    #[test]
    fn test_analyse_prefixes_and_keep_only() {
        let a = RoiObj::from_template("a", RoiTemplate::demo()).unwrap();
        let b = RoiObj::from_template("b", RoiTemplate::demo()).unwrap();
        let mut s = sources();
        let options = AnalysisOptions {
            keep_only: Some(KeepOnly {
                column: "a:hemisphere".into(),
                values: vec!["left".into(), "right".into()],
            }),
            ..AnalysisOptions::default()
        };
        let table = s.analyse_sources(&[&a, &b], &options).unwrap();
        assert_eq!(table.columns().len(), 4);
        assert_eq!(table.columns()[2], "b:label");
        assert_eq!(table.source_index(), &[0, 1]);
        assert_eq!(s.visible(), &[true, true, false, false]);
        assert!(s.analyse_sources(&[], &AnalysisOptions::default()).is_err());
    }

    #[test]
    fn test_color_random_per_label_is_seeded() {
        let roi = RoiObj::from_template("demo", RoiTemplate::demo()).unwrap();
        let mut s = sources();
        s.analyse_sources(&[&roi], &AnalysisOptions::default()).unwrap();
        let by = ColorBy::RandomPerLabel {
            column: "hemisphere".into(),
            seed: 7,
        };
        s.color_sources(&by).unwrap();
        let first = s.colors();
        s.color_sources(&by).unwrap();
        assert_eq!(first, s.colors());
        assert_ne!(first[0], first[1]);
    }

    #[test]
    fn test_color_custom_hides_others() {
        let roi = RoiObj::from_template("demo", RoiTemplate::demo()).unwrap();
        let mut s = sources();
        s.analyse_sources(&[&roi], &AnalysisOptions::default()).unwrap();
        let red = Vec4::new(1.0, 0.0, 0.0, 1.0);
        s.color_sources(&ColorBy::Custom {
            column: "label".into(),
            colors: BTreeMap::from([("Midline".to_string(), red)]),
            hide_others: true,
        })
        .unwrap();
        assert_eq!(s.visible(), &[false, false, true, false]);
        assert_eq!(s.colors()[2], red);
    }

    #[test]
    fn test_color_by_data() {
        let mut s = sources();
        assert!(s.color_sources(&ColorBy::Data).is_err());
        s.set_data(vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        s.color_sources(&ColorBy::Data).unwrap();
        let colors = s.colors();
        assert_ne!(colors[0], colors[3]);
        assert!(s.color_sources(&ColorBy::RandomPerLabel { column: "label".into(), seed: 0 }).is_err());
    }
}
