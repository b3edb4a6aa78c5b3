//! Property tests for the invariants the objects guarantee.

use proptest::prelude::*;
use visbrain::*;
use visbrain_core::transform::voxel_to_world;
use visbrain_objects::{LocalizeOptions, RoiTemplate, SelectOptions};

const CMAPS: &[&str] = &["viridis", "hot", "jet", "coolwarm", "gray_r", "plasma"];

fn positions(max: usize) -> impl Strategy<Value = Vec<Vec3>> {
    prop::collection::vec((-80.0_f32..80.0, -100.0_f32..70.0, -50.0_f32..80.0), 1..max)
        .prop_map(|v| v.into_iter().map(|(x, y, z)| Vec3::new(x, y, z)).collect())
}

fn painted(values: &[f32]) -> Vec<bool> {
    values.iter().map(|v| v.is_finite()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_color_mapping_is_idempotent(
        data in prop::collection::vec(prop_oneof![Just(f32::NAN), -1e3_f32..1e3], 0..64),
        cmap in prop::sample::select(CMAPS),
    ) {
        let state = ColorState::named(cmap);
        let first = array_to_colormap(&data, &state);
        let second = array_to_colormap(&data, &state);
        let bits = |colors: &[Vec4]| colors.iter().map(|c| c.to_array().map(f32::to_bits)).collect::<Vec<_>>();
        prop_assert_eq!(bits(&first), bits(&second));
    }

    #[test]
    fn prop_masking_never_paints_more(
        sources in positions(12),
        mask_a in prop::collection::vec(any::<bool>(), 12),
        extra in prop::collection::vec(any::<bool>(), 12),
        radius in 5.0_f32..30.0,
        contribute in any::<bool>(),
    ) {
        let n = sources.len();
        let template = visbrain_objects::SurfaceTemplate::sphere();
        let options = ProjectOptions {
            kind: ProjectionKind::Repartition,
            radius,
            contribute,
        };

        let run = |mask: Vec<bool>| {
            let mut brain = BrainObj::from_template("brain", &template).unwrap();
            let mut source = SourceObj::new("s", sources.clone()).unwrap();
            source.set_mask(mask).unwrap();
            project_sources(&source, &mut brain, &options, &mut Monitor::none()).unwrap().values
        };
        let mask_a: Vec<bool> = mask_a[..n].to_vec();
        let mask_b: Vec<bool> = mask_a.iter().zip(&extra).map(|(a, e)| *a || *e).collect();
        let less = painted(&run(mask_a));
        let more = painted(&run(mask_b));
        for (with_fewer_masked, with_more_masked) in less.iter().zip(&more) {
            prop_assert!(!with_more_masked || *with_fewer_masked);
        }
    }

    #[test]
    fn prop_colorbar_mirrors_its_source(
        cmap in prop::sample::select(CMAPS),
        lo in -100.0_f32..0.0,
        width in 0.5_f32..100.0,
        under in any::<bool>(),
    ) {
        let brain = BrainObj::new("brain", "sphere").unwrap();
        let mut cbar = ColorbarObj::new("cbar").unwrap();
        cbar.update_from(&brain).unwrap();
        let state = brain.color_state().unwrap();
        {
            let mut s = state.borrow_mut();
            s.set_cmap(Cmap::named(cmap));
            s.set_clim(Some((lo, lo + width))).unwrap();
            s.set_under(under.then_some(Vec4::new(1.0, 0.0, 0.0, 1.0)));
        }
        let expected = colormap_to_glsl(&state.borrow(), DEFAULT_LUT_LEN).unwrap();
        prop_assert_eq!(cbar.lut().unwrap(), expected);
        prop_assert_eq!(cbar.repaint_count(), 2);
    }

    #[test]
    fn prop_roi_lookup_round_trips(i in 0_usize..21, j in 0_usize..21, k in 0_usize..21) {
        let template = RoiTemplate::demo();
        let label = template.vol.get(i, j, k).unwrap();
        prop_assume!(label != 0 && template.labels.contains(label));
        let expected = template.labels.row(label).unwrap().to_vec();
        let roi = RoiObj::from_template("demo", template).unwrap();

        let xyz = voxel_to_world(roi.hdr(), [i, j, k]);
        let table = roi.localize_sources(&[xyz], &LocalizeOptions::default()).unwrap();
        prop_assert_eq!(&table.rows()[0], &expected);
    }

    #[test]
    fn prop_combiner_keeps_insertion_order(names in prop::collection::hash_set("[a-z]{1,8}", 1..10)) {
        let names: Vec<String> = names.into_iter().collect();
        let objects = names.iter().map(|n| SourceObj::new(n.as_str(), vec![Vec3::ZERO]).unwrap());
        let combiner = Combiner::from_objects("sources", objects).unwrap();
        prop_assert_eq!(combiner.get_list_of_objects(), names.iter().map(String::as_str).collect::<Vec<_>>());
        let iterated: Vec<&str> = combiner.iter().map(VisbrainObject::name).collect();
        prop_assert_eq!(iterated, names.iter().map(String::as_str).collect::<Vec<_>>());
    }
}

#[test]
fn isosurface_is_stable_across_selections() {
    let mut roi = RoiObj::new("demo", "demo").unwrap();
    let options = SelectOptions::default();
    roi.select_roi(&[1, 3], &options, &mut Monitor::none()).unwrap();
    let first = (roi.mesh().n_faces(), roi.mesh().bounding_box());
    roi.select_roi(&[2], &options, &mut Monitor::none()).unwrap();
    roi.select_roi(&[1, 3], &options, &mut Monitor::none()).unwrap();
    assert_eq!(first, (roi.mesh().n_faces(), roi.mesh().bounding_box()));
}
