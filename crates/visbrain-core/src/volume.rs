//! Dense 3-D volumes and label tables.
//!
//! Volumes are stored in C order: voxel `(i, j, k)` lives at
//! `(i * ny + j) * nz + k`, the same layout the isosurface extractor reads.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VisbrainError};

/// Axis of a volume, also used to name cross-section planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// First axis, slices are `[i, :, :]`.
    Sagittal,
    /// Second axis, slices are `[:, j, :]`.
    Coronal,
    /// Third axis, slices are `[:, :, k]`.
    Axial,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::Sagittal, Axis::Coronal, Axis::Axial];

    pub fn index(self) -> usize {
        match self {
            Self::Sagittal => 0,
            Self::Coronal => 1,
            Self::Axial => 2,
        }
    }
}

/// A dense 3-D array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume<T> {
    shape: [usize; 3],
    data: Vec<T>,
}

impl<T: Copy> Volume<T> {
    /// Wraps `data` (C order). Fails when the length does not match `shape`.
    pub fn new(shape: [usize; 3], data: Vec<T>) -> Result<Self> {
        let expected = shape.iter().product::<usize>();
        if data.len() != expected {
            return Err(VisbrainError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// A volume filled with `value`.
    pub fn filled(shape: [usize; 3], value: T) -> Self {
        Self {
            shape,
            data: vec![value; shape.iter().product()],
        }
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat offset of voxel `(i, j, k)`, unchecked.
    #[inline]
    pub fn offset(&self, i: usize, j: usize, k: usize) -> usize {
        (i * self.shape[1] + j) * self.shape[2] + k
    }

    /// The voxel at `(i, j, k)`, or `None` outside the volume.
    pub fn get(&self, i: usize, j: usize, k: usize) -> Option<T> {
        (i < self.shape[0] && j < self.shape[1] && k < self.shape[2]).then(|| self.data[self.offset(i, j, k)])
    }

    pub fn set(&mut self, i: usize, j: usize, k: usize, value: T) -> Result<()> {
        if i >= self.shape[0] || j >= self.shape[1] || k >= self.shape[2] {
            return Err(VisbrainError::invalid(format!(
                "voxel ({i}, {j}, {k}) outside volume of shape {:?}",
                self.shape
            )));
        }
        let o = self.offset(i, j, k);
        self.data[o] = value;
        Ok(())
    }

    /// Applies `f` to every voxel.
    pub fn map<U: Copy>(&self, f: impl Fn(T) -> U) -> Volume<U> {
        Volume {
            shape: self.shape,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// A 2-D slice through `axis` at `index`, as `(width, height, values)`.
    ///
    /// Rows run along the first remaining axis and columns along the second,
    /// so `values[r * width + c]`.
    pub fn slice(&self, axis: Axis, index: usize) -> Option<(usize, usize, Vec<T>)> {
        let [nx, ny, nz] = self.shape;
        if index >= self.shape[axis.index()] {
            return None;
        }
        let out = match axis {
            Axis::Sagittal => {
                let mut v = Vec::with_capacity(ny * nz);
                for j in 0..ny {
                    for k in 0..nz {
                        v.push(self.data[self.offset(index, j, k)]);
                    }
                }
                (nz, ny, v)
            }
            Axis::Coronal => {
                let mut v = Vec::with_capacity(nx * nz);
                for i in 0..nx {
                    for k in 0..nz {
                        v.push(self.data[self.offset(i, index, k)]);
                    }
                }
                (nz, nx, v)
            }
            Axis::Axial => {
                let mut v = Vec::with_capacity(nx * ny);
                for i in 0..nx {
                    for j in 0..ny {
                        v.push(self.data[self.offset(i, j, index)]);
                    }
                }
                (ny, nx, v)
            }
        };
        Some(out)
    }

    /// Returns a copy padded with `pad` voxels of `value` on every side.
    pub fn padded(&self, pad: usize, value: T) -> Self {
        let [nx, ny, nz] = self.shape;
        let shape = [nx + 2 * pad, ny + 2 * pad, nz + 2 * pad];
        let mut out = Self::filled(shape, value);
        for i in 0..nx {
            for j in 0..ny {
                let src = self.offset(i, j, 0);
                let dst = out.offset(i + pad, j + pad, pad);
                out.data[dst..dst + nz].copy_from_slice(&self.data[src..src + nz]);
            }
        }
        out
    }
}

impl Volume<f32> {
    /// Maximum intensity projection along `axis`, as `(width, height, values)`.
    pub fn max_projection(&self, axis: Axis) -> (usize, usize, Vec<f32>) {
        let n = self.shape[axis.index()];
        let mut acc: Option<(usize, usize, Vec<f32>)> = None;
        for index in 0..n {
            if let Some((w, h, s)) = self.slice(axis, index) {
                match &mut acc {
                    None => acc = Some((w, h, s)),
                    Some((_, _, a)) => {
                        for (m, v) in a.iter_mut().zip(s) {
                            *m = m.max(v);
                        }
                    }
                }
            }
        }
        acc.unwrap_or((0, 0, Vec::new()))
    }
}

/// Separable box smoothing with a `size`-voxel window of weight `1 / size`
/// per axis. Borders are zero-padded and the output keeps the input shape,
/// centered like a "same" convolution. Axes of length 1 are left alone.
///
/// The total is preserved as long as the data stays `size / 2` voxels away
/// from the borders; pad with [`Volume::padded`] first otherwise.
pub fn box_smooth(volume: &Volume<f32>, size: usize) -> Volume<f32> {
    if size <= 1 {
        return volume.clone();
    }
    let mut data = volume.data.clone();
    let shape = volume.shape;
    let strides = [shape[1] * shape[2], shape[2], 1];
    for axis in (0..3).filter(|&a| shape[a] > 1) {
        data = smooth_axis(&data, shape, strides, axis, size);
    }
    Volume { shape, data }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn smooth_axis(data: &[f32], shape: [usize; 3], strides: [usize; 3], axis: usize, size: usize) -> Vec<f32> {
    let n = shape[axis] as isize;
    let stride = strides[axis];
    let weight = 1.0 / size as f32;
    // "same" alignment: output i sums inputs i - left ..= i - left + size - 1.
    let left = (size as isize - 1) - (size as isize - 1) / 2;
    let mut out = vec![0.0_f32; data.len()];
    for (base, o) in out.iter_mut().enumerate() {
        let pos = ((base / stride) % shape[axis]) as isize;
        let line_start = base - pos as usize * stride;
        let from = (pos - left).max(0);
        let to = (pos - left + size as isize - 1).min(n - 1);
        let mut sum = 0.0;
        for p in from..=to {
            sum += data[line_start + p as usize * stride];
        }
        *o = sum * weight;
    }
    out
}

/// The label table of a parcellated volume: one row of textual columns per
/// integer label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelTable {
    columns: Vec<String>,
    index: Vec<i32>,
    rows: Vec<Vec<String>>,
}

impl LabelTable {
    /// Builds a table. `index` and `rows` must have the same length and every
    /// row must have one entry per column.
    pub fn new(columns: Vec<String>, index: Vec<i32>, rows: Vec<Vec<String>>) -> Result<Self> {
        if columns.is_empty() {
            return Err(VisbrainError::invalid("a label table needs at least one column"));
        }
        if index.len() != rows.len() {
            return Err(VisbrainError::SizeMismatch {
                expected: index.len(),
                actual: rows.len(),
            });
        }
        if let Some(row) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(VisbrainError::SizeMismatch {
                expected: columns.len(),
                actual: row.len(),
            });
        }
        Ok(Self { columns, index, rows })
    }

    /// A single-column table named `label`.
    pub fn from_labels(index: Vec<i32>, labels: Vec<String>) -> Result<Self> {
        Self::new(
            vec!["label".to_string()],
            index,
            labels.into_iter().map(|l| vec![l]).collect(),
        )
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn index(&self) -> &[i32] {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, label: i32) -> bool {
        self.index.contains(&label)
    }

    /// Column position by name.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// The row of `label`.
    pub fn row(&self, label: i32) -> Option<&[String]> {
        self.index
            .iter()
            .position(|&l| l == label)
            .map(|i| self.rows[i].as_slice())
    }

    /// Iterates over `(label, row)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, &[String])> {
        self.index.iter().copied().zip(self.rows.iter().map(Vec::as_slice))
    }
}
