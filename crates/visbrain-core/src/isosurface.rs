//! Isosurface extraction with marching cubes.
//!
//! The extractor walks the volume one z-slab at a time, caching the vertex
//! created on each crossed grid edge so that neighboring cells share it.
//! Vertices come out in voxel-index space; callers map them to world
//! coordinates with the volume affine.

#![allow(
    clippy::unreadable_literal,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]

use glam::Vec3;

use crate::error::{Result, VisbrainError};
use crate::mesh::{vertex_normals, TriMesh};
use crate::progress::Monitor;
use crate::volume::Volume;

/// The 12 cube edges as `(axis, corner offset)`. The edge runs from the
/// corner at `offset` to the next corner along `axis`. Corner `c` of a cell
/// sits at `(c & 1, (c >> 1) & 1, (c >> 2) & 1)`.
const EDGES: [(usize, [u32; 3]); 12] = [
    (0, [0, 0, 0]),
    (0, [0, 1, 0]),
    (0, [0, 0, 1]),
    (0, [0, 1, 1]),
    (1, [0, 0, 0]),
    (1, [1, 0, 0]),
    (1, [0, 0, 1]),
    (1, [1, 0, 1]),
    (2, [0, 0, 0]),
    (2, [1, 0, 0]),
    (2, [0, 1, 0]),
    (2, [1, 1, 0]),
];

/// Extracts the surface `field == isoval`.
///
/// Every dimension must be at least 2. The monitor is polled once per
/// z-slab.
pub fn marching_cubes(field: &Volume<f32>, isoval: f32, monitor: &mut Monitor<'_>) -> Result<TriMesh> {
    let [nx, ny, nz] = field.shape();
    if nx < 2 || ny < 2 || nz < 2 {
        return Err(VisbrainError::invalid(format!(
            "isosurface extraction needs every dimension >= 2, got {:?}",
            field.shape()
        )));
    }
    let size = [nx as u32, ny as u32, nz as u32];
    let data = field.data();

    let mut vertices: Vec<Vec3> = Vec::new();
    let mut faces: Vec<[u32; 3]> = Vec::new();
    // Vertex index per edge axis at each (x, y) of the two live z layers.
    let mut slab: Vec<[u32; 3]> = vec![[0; 3]; nx * ny * 2];
    let mut corners = [0.0_f32; 8];
    let mut cell_edges = [0_u32; 12];

    for z in 0..size[2] - 1 {
        monitor.check()?;
        for y in 0..size[1] - 1 {
            for x in 0..size[0] - 1 {
                let mut config = 0_usize;
                for (c, value) in corners.iter_mut().enumerate() {
                    let (dx, dy, dz) = corner_offset(c);
                    *value = data[grid_index(x + dx, y + dy, z + dz, size)] - isoval;
                    if *value < 0.0 {
                        config |= 1 << c;
                    }
                }
                if config == 0 || config == 255 {
                    continue;
                }

                let cell = [x, y, z];
                for (e, &(axis, offset)) in EDGES.iter().enumerate() {
                    let at = [x + offset[0], y + offset[1], z + offset[2]];
                    // Edges on the low faces of the cell were created by a
                    // neighbor, except on the volume boundary.
                    let owned = (0..3).all(|d| d == axis || offset[d] == 1 || cell[d] == 0);
                    let slot = slab_index(at, size);
                    if owned {
                        let a = corner_id(offset);
                        let b = a | (1 << axis);
                        let (va, vb) = (corners[a], corners[b]);
                        if (va < 0.0) != (vb < 0.0) {
                            let mut v = Vec3::new(at[0] as f32, at[1] as f32, at[2] as f32);
                            v[axis] += va / (va - vb);
                            slab[slot][axis] = vertices.len() as u32;
                            vertices.push(v);
                        }
                    }
                    cell_edges[e] = slab[slot][axis];
                }

                let tris = MC_TRIS[config];
                let n_triangles = (tris & 0xF) as usize;
                for t in 0..n_triangles {
                    let mut face = [0_u32; 3];
                    for (corner, slot) in face.iter_mut().enumerate() {
                        let shift = 4 + 4 * (3 * t + corner);
                        *slot = cell_edges[((tris >> shift) & 0xF) as usize];
                    }
                    faces.push(face);
                }
            }
        }
    }

    let normals = vertex_normals(&vertices, &faces);
    Ok(TriMesh {
        vertices,
        faces,
        normals,
    })
}

#[inline]
fn corner_offset(c: usize) -> (u32, u32, u32) {
    ((c & 1) as u32, ((c >> 1) & 1) as u32, ((c >> 2) & 1) as u32)
}

#[inline]
fn corner_id(offset: [u32; 3]) -> usize {
    (offset[0] | (offset[1] << 1) | (offset[2] << 2)) as usize
}

/// C-order index `(i * ny + j) * nz + k`.
#[inline]
fn grid_index(i: u32, j: u32, k: u32, size: [u32; 3]) -> usize {
    ((i as usize) * (size[1] as usize) + (j as usize)) * (size[2] as usize) + (k as usize)
}

/// Slab slot of an edge origin; z alternates between two layers.
#[inline]
fn slab_index(at: [u32; 3], size: [u32; 3]) -> usize {
    (size[0] as usize) * (size[1] as usize) * ((at[2] as usize) % 2) + (at[1] as usize) * (size[0] as usize) + (at[0] as usize)
}

/// Triangle table, one `u64` per corner configuration: the low nibble is
/// the triangle count, then one nibble per triangle corner naming the edge.
#[rustfmt::skip]
static MC_TRIS: [u64; 256] = [
    0, 33793, 36945, 159668546,
    18961, 144771090, 5851666, 595283255635,
    20913, 67640146, 193993474, 655980856339,
    88782242, 736732689667, 797430812739, 194554754,
    26657, 104867330, 136709522, 298069416227,
    109224258, 8877909667, 318136408323, 1567994331701604,
    189884450, 350847647843, 559958167731, 3256298596865604,
    447393122899, 651646838401572, 2538311371089956, 737032694307,
    29329, 43484162, 91358498, 374810899075,
    158485010, 178117478419, 88675058979, 433581536604804,
    158486962, 649105605635, 4866906995, 3220959471609924,
    649165714851, 3184943915608436, 570691368417972, 595804498035,
    124295042, 431498018963, 508238522371, 91518530,
    318240155763, 291789778348404, 1830001131721892, 375363605923,
    777781811075, 1136111028516116, 3097834205243396, 508001629971,
    2663607373704004, 680242583802939237, 333380770766129845, 179746658,
    42545, 138437538, 93365810, 713842853011,
    73602098, 69575510115, 23964357683, 868078761575828,
    28681778, 713778574611, 250912709379, 2323825233181284,
    302080811955, 3184439127991172, 1694042660682596, 796909779811,
    176306722, 150327278147, 619854856867, 1005252473234484,
    211025400963, 36712706, 360743481544788, 150627258963,
    117482600995, 1024968212107700, 2535169275963444, 4734473194086550421,
    628107696687956, 9399128243, 5198438490361643573, 194220594,
    104474994, 566996932387, 427920028243, 2014821863433780,
    492093858627, 147361150235284, 2005882975110676, 9671606099636618005,
    777701008947, 3185463219618820, 482784926917540, 2900953068249785909,
    1754182023747364, 4274848857537943333, 13198752741767688709, 2015093490989156,
    591272318771, 2659758091419812, 1531044293118596, 298306479155,
    408509245114388, 210504348563, 9248164405801223541, 91321106,
    2660352816454484, 680170263324308757, 8333659837799955077, 482966828984116,
    4274926723105633605, 3184439197724820, 192104450, 15217,
    45937, 129205250, 129208402, 529245952323,
    169097138, 770695537027, 382310500883, 2838550742137652,
    122763026, 277045793139, 81608128403, 1991870397907988,
    362778151475, 2059003085103236, 2132572377842852, 655681091891,
    58419234, 239280858627, 529092143139, 1568257451898804,
    447235128115, 679678845236084, 2167161349491220, 1554184567314086709,
    165479003923, 1428768988226596, 977710670185060, 10550024711307499077,
    1305410032576132, 11779770265620358997, 333446212255967269, 978168444447012,
    162736434, 35596216627, 138295313843, 891861543990356,
    692616541075, 3151866750863876, 100103641866564, 6572336607016932133,
    215036012883, 726936420696196, 52433666, 82160664963,
    2588613720361524, 5802089162353039525, 214799000387, 144876322,
    668013605731, 110616894681956, 1601657732871812, 430945547955,
    3156382366321172, 7644494644932993285, 3928124806469601813, 3155990846772900,
    339991010498708, 10743689387941597493, 5103845475, 105070898,
    3928064910068824213, 156265010, 1305138421793636, 27185,
    195459938, 567044449971, 382447549283, 2175279159592324,
    443529919251, 195059004769796, 2165424908404116, 1554158691063110021,
    504228368803, 1436350466655236, 27584723588724, 1900945754488837749,
    122971970, 443829749251, 302601798803, 108558722,
    724700725875, 43570095105972, 2295263717447940, 2860446751369014181,
    2165106202149444, 69275726195, 2860543885641537797, 2165106320445780,
    2280890014640004, 11820349930268368933, 8721082628082003989, 127050770,
    503707084675, 122834978, 2538193642857604, 10129,
    801441490467, 2923200302876740, 1443359556281892, 2901063790822564949,
    2728339631923524, 7103874718248233397, 12775311047932294245, 95520290,
    2623783208098404, 1900908618382410757, 137742672547, 2323440239468964,
    362478212387, 727199575803140, 73425410, 34337,
    163101314, 668566030659, 801204361987, 73030562,
    591509145619, 162574594, 100608342969108, 5553,
    724147968595, 1436604830452292, 176259090, 42001,
    143955266, 2385, 18433, 0,
];

#[cfg(test)]
mod tests {
    use super::*;

    fn field(shape: [usize; 3], f: impl Fn(Vec3) -> f32) -> Volume<f32> {
        let mut data = Vec::with_capacity(shape.iter().product());
        for i in 0..shape[0] {
            for j in 0..shape[1] {
                for k in 0..shape[2] {
                    data.push(f(Vec3::new(i as f32, j as f32, k as f32)));
                }
            }
        }
        Volume::new(shape, data).unwrap()
    }

    #[test]
    fn test_constant_fields_are_empty() {
        for value in [1.0, -1.0] {
            let vol = Volume::filled([3, 3, 3], value);
            let mesh = marching_cubes(&vol, 0.0, &mut Monitor::none()).unwrap();
            assert!(mesh.is_empty());
        }
    }

    #[test]
    fn test_single_corner() {
        let mut data = vec![1.0_f32; 8];
        data[0] = -1.0;
        let vol = Volume::new([2, 2, 2], data).unwrap();
        let mesh = marching_cubes(&vol, 0.0, &mut Monitor::none()).unwrap();
        assert_eq!(mesh.n_faces(), 1);
        assert_eq!(mesh.n_vertices(), 3);
        for v in &mesh.vertices {
            assert!((v.length() - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_sphere() {
        let n = 20;
        let center = Vec3::splat(n as f32 / 2.0);
        let radius = n as f32 / 4.0;
        let vol = field([n, n, n], |p| (p - center).length() - radius);
        let mesh = marching_cubes(&vol, 0.0, &mut Monitor::none()).unwrap();

        assert!(mesh.n_faces() > 100);
        assert_eq!(mesh.vertices.len(), mesh.normals.len());
        for f in &mesh.faces {
            assert!(f.iter().all(|&i| (i as usize) < mesh.vertices.len()));
        }
        for v in &mesh.vertices {
            assert!(((*v - center).length() - radius).abs() < 1.0);
        }
        for n in &mesh.normals {
            assert!((n.length() - 1.0).abs() < 0.01);
        }
    }

    #[test]
    fn test_shape_checked() {
        let vol = Volume::filled([1, 4, 4], 0.0_f32);
        assert!(marching_cubes(&vol, 0.0, &mut Monitor::none()).is_err());
    }

    #[test]
    fn test_cancelled() {
        let vol = field([6, 6, 6], |p| p.x - 2.5);
        let cancel = || true;
        let mut monitor = Monitor::none().with_cancel(&cancel);
        assert!(matches!(
            marching_cubes(&vol, 0.0, &mut monitor),
            Err(VisbrainError::Cancelled)
        ));
    }
}
