//! Per-source label tables produced by ROI lookups.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use visbrain_core::{Result, VisbrainError};

/// Value recorded for sources that fall outside every labeled voxel.
pub const NOT_FOUND: &str = "Not found";
/// Default replacement for labels matching a bad pattern.
pub const NO_LABEL: &str = "No label";

/// One row of textual columns per source.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    /// Index of the source each row describes.
    source: Vec<usize>,
}

impl AnalysisTable {
    /// Builds a table whose row `i` describes source `i`.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if let Some(row) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(VisbrainError::SizeMismatch {
                expected: columns.len(),
                actual: row.len(),
            });
        }
        let source = (0..rows.len()).collect();
        Ok(Self { columns, rows, source })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Source index of every row.
    pub fn source_index(&self) -> &[usize] {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_position(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| VisbrainError::invalid(format!("no column '{name}' in {:?}", self.columns)))
    }

    /// Values of a column, row order.
    pub fn column(&self, name: &str) -> Result<Vec<&str>> {
        let col = self.column_position(name)?;
        Ok(self.rows.iter().map(|r| r[col].as_str()).collect())
    }

    /// Distinct values of a column, sorted.
    pub fn unique(&self, name: &str) -> Result<Vec<String>> {
        let set: BTreeSet<&str> = self.column(name)?.into_iter().collect();
        Ok(set.into_iter().map(str::to_string).collect())
    }

    /// Rewrites every cell of `column` containing any of `patterns`.
    pub fn replace_matching(&mut self, column: &str, patterns: &[String], replace_with: &str) -> Result<usize> {
        let col = self.column_position(column)?;
        let mut replaced = 0;
        for row in &mut self.rows {
            if patterns.iter().any(|p| !p.is_empty() && row[col].contains(p.as_str())) {
                row[col] = replace_with.to_string();
                replaced += 1;
            }
        }
        Ok(replaced)
    }

    /// Keeps the rows whose `column` value is one of `values`; returns the
    /// per-row keep flags of the table before filtering.
    pub fn retain_values(&mut self, column: &str, values: &[String]) -> Result<Vec<bool>> {
        let col = self.column_position(column)?;
        let keep: Vec<bool> = self.rows.iter().map(|r| values.contains(&r[col])).collect();
        let mut flags = keep.iter();
        self.rows.retain(|_| *flags.next().unwrap_or(&false));
        let mut flags = keep.iter();
        self.source.retain(|_| *flags.next().unwrap_or(&false));
        Ok(keep)
    }

    /// Appends the columns of `other` (same row count) with a prefix.
    pub fn join(&mut self, other: AnalysisTable, prefix: &str) -> Result<()> {
        if self.columns.is_empty() && self.rows.is_empty() {
            *self = other;
            return Ok(());
        }
        visbrain_core::error::check_len(self.rows.len(), other.rows.len())?;
        self.columns
            .extend(other.columns.iter().map(|c| format!("{prefix}{c}")));
        for (row, extra) in self.rows.iter_mut().zip(other.rows) {
            row.extend(extra);
        }
        Ok(())
    }

    /// Prefixes every column name.
    pub fn prefix_columns(&mut self, prefix: &str) {
        for c in &mut self.columns {
            *c = format!("{prefix}{c}");
        }
    }
}

impl fmt::Display for AnalysisTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "source\t{}", self.columns.join("\t"))?;
        for (i, row) in self.source.iter().zip(&self.rows) {
            writeln!(f, "{i}\t{}", row.join("\t"))?;
        }
        Ok(())
    }
}
