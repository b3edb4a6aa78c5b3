//! Uniform-grid spatial index for radius and nearest-neighbor queries.
//!
//! Points are hashed into cubic cells of a fixed size. Radius queries scan
//! the cells overlapping the query ball; nearest queries grow a shell of
//! cells until no closer point can exist.

#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

use std::collections::HashMap;

use glam::Vec3;

type CellKey = (i32, i32, i32);

/// A static set of points bucketed into cubic cells.
#[derive(Debug, Clone)]
pub struct PointIndex {
    cell: f32,
    points: Vec<Vec3>,
    cells: HashMap<CellKey, Vec<u32>>,
    lo: CellKey,
    hi: CellKey,
}

impl PointIndex {
    /// Indexes `points` with the given cell size. Non-finite points are
    /// never returned by queries.
    pub fn new(points: &[Vec3], cell_size: f32) -> Self {
        let cell = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };
        let mut cells: HashMap<CellKey, Vec<u32>> = HashMap::new();
        let mut lo = (i32::MAX, i32::MAX, i32::MAX);
        let mut hi = (i32::MIN, i32::MIN, i32::MIN);
        for (i, p) in points.iter().enumerate() {
            if !p.is_finite() {
                continue;
            }
            let key = cell_of(*p, cell);
            lo = (lo.0.min(key.0), lo.1.min(key.1), lo.2.min(key.2));
            hi = (hi.0.max(key.0), hi.1.max(key.1), hi.2.max(key.2));
            cells.entry(key).or_default().push(i as u32);
        }
        Self {
            cell,
            points: points.to_vec(),
            cells,
            lo,
            hi,
        }
    }

    /// Picks a cell size so that each cell holds a handful of points.
    pub fn with_auto_cell(points: &[Vec3]) -> Self {
        let cell = crate::mesh::bounding_box(points)
            .map(|(min, max)| {
                let extent = (max - min).max_element();
                let per_axis = (points.len() as f32).cbrt().max(1.0);
                extent / per_axis
            })
            .filter(|c| *c > 0.0)
            .unwrap_or(1.0);
        Self::new(points, cell)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn point(&self, index: u32) -> Vec3 {
        self.points[index as usize]
    }

    /// Indices of the points with `|p - q| <= radius`, in ascending order.
    pub fn within(&self, query: Vec3, radius: f32) -> Vec<u32> {
        let mut found = Vec::new();
        if !query.is_finite() || radius < 0.0 || self.cells.is_empty() {
            return found;
        }
        let a = cell_of(query - Vec3::splat(radius), self.cell);
        let b = cell_of(query + Vec3::splat(radius), self.cell);
        let r2 = radius * radius;
        for x in a.0.max(self.lo.0)..=b.0.min(self.hi.0) {
            for y in a.1.max(self.lo.1)..=b.1.min(self.hi.1) {
                for z in a.2.max(self.lo.2)..=b.2.min(self.hi.2) {
                    if let Some(bucket) = self.cells.get(&(x, y, z)) {
                        found.extend(
                            bucket
                                .iter()
                                .filter(|&&i| self.points[i as usize].distance_squared(query) <= r2),
                        );
                    }
                }
            }
        }
        found.sort_unstable();
        found
    }

    /// Index of and distance to the closest point.
    pub fn nearest(&self, query: Vec3) -> Option<(u32, f32)> {
        if !query.is_finite() || self.cells.is_empty() {
            return None;
        }
        let c = cell_of(query, self.cell);
        let max_ring = [
            (c.0 - self.lo.0).abs(),
            (self.hi.0 - c.0).abs(),
            (c.1 - self.lo.1).abs(),
            (self.hi.1 - c.1).abs(),
            (c.2 - self.lo.2).abs(),
            (self.hi.2 - c.2).abs(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0);

        let mut best: Option<(u32, f32)> = None;
        for ring in 0..=max_ring {
            if let Some((_, d)) = best {
                // Every point in this ring is at least (ring - 1) cells away.
                if (ring - 1) as f32 * self.cell > d {
                    break;
                }
            }
            for_each_in_ring(c, ring, |key| {
                if let Some(bucket) = self.cells.get(&key) {
                    for &i in bucket {
                        let d = self.points[i as usize].distance(query);
                        if best.map_or(true, |(bi, bd)| d < bd || (d == bd && i < bi)) {
                            best = Some((i, d));
                        }
                    }
                }
            });
        }
        best
    }
}

fn cell_of(p: Vec3, cell: f32) -> CellKey {
    let q = (p / cell).floor();
    (q.x as i32, q.y as i32, q.z as i32)
}

/// Calls `f` on every cell at Chebyshev distance exactly `ring` from `c`.
fn for_each_in_ring(c: CellKey, ring: i32, mut f: impl FnMut(CellKey)) {
    for dx in -ring..=ring {
        for dy in -ring..=ring {
            let on_shell = dx.abs() == ring || dy.abs() == ring;
            if on_shell {
                for dz in -ring..=ring {
                    f((c.0 + dx, c.1 + dy, c.2 + dz));
                }
            } else {
                f((c.0 + dx, c.1 + dy, c.2 - ring));
                if ring > 0 {
                    f((c.0 + dx, c.1 + dy, c.2 + ring));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_within_radius() {
        let pts = [Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), Vec3::new(20.0, 0.0, 0.0)];
        let index = PointIndex::new(&pts, 5.0);
        assert_eq!(index.within(Vec3::new(1.0, 0.0, 0.0), 5.0), vec![0]);
        assert_eq!(index.within(Vec3::new(5.0, 0.0, 0.0), 5.0), vec![0, 1]);
        assert!(index.within(Vec3::new(100.0, 0.0, 0.0), 5.0).is_empty());
    }

    #[test]
    fn test_nearest_skips_nan() {
        let pts = [Vec3::splat(f32::NAN), Vec3::new(3.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0)];
        let index = PointIndex::with_auto_cell(&pts);
        let (i, d) = index.nearest(Vec3::ZERO).unwrap();
        assert_eq!(i, 2);
        assert!((d - 1.0).abs() < 1e-6);
        assert!(PointIndex::new(&[], 1.0).nearest(Vec3::ZERO).is_none());
    }

    proptest! {
        #[test]
        fn prop_matches_brute_force(
            pts in proptest::collection::vec((-50.0f32..50.0, -50.0f32..50.0, -50.0f32..50.0), 1..60),
            q in (-60.0f32..60.0, -60.0f32..60.0, -60.0f32..60.0),
            r in 0.0f32..30.0,
            cell in 0.5f32..20.0,
        ) {
            let pts: Vec<Vec3> = pts.into_iter().map(|(x, y, z)| Vec3::new(x, y, z)).collect();
            let q = Vec3::new(q.0, q.1, q.2);
            let index = PointIndex::new(&pts, cell);

            let brute: Vec<u32> = (0..pts.len() as u32)
                .filter(|&i| pts[i as usize].distance_squared(q) <= r * r)
                .collect();
            prop_assert_eq!(index.within(q, r), brute);

            let best = pts.iter().map(|p| p.distance(q)).fold(f32::INFINITY, f32::min);
            let (_, d) = index.nearest(q).unwrap();
            prop_assert!((d - best).abs() < 1e-4);
        }
    }
}
