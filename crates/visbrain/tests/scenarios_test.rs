//! End-to-end scenarios: hemisphere masking, projection, ROI lookup,
//! thresholded colormaps and print-size screenshots.

use visbrain::*;
use visbrain_core::transform::affine_to_rows;
use visbrain_core::LabelTable;
use visbrain_objects::{LocalizeOptions, ProjectionStatus, RoiTemplate, SurfaceTemplate, NOT_FOUND};

/// A surface made of isolated vertices, one per position.
fn point_brain(vertices: Vec<Vec3>) -> BrainObj {
    let template = SurfaceTemplate {
        vertices,
        faces: Vec::new(),
        normals: None,
        lr_index: None,
    };
    BrainObj::from_template("points", &template).unwrap()
}

#[test]
fn scenario_a_hemisphere_mask() {
    let template = SurfaceTemplate::sphere();
    let lr_index = template.lr_index.clone().unwrap();
    let mut brain = BrainObj::from_template("brain", &template).unwrap();
    let before = brain.vertex_colors();

    brain.set_hemisphere(Hemisphere::Left);
    let after = brain.vertex_colors();
    for ((is_left, old), new) in lr_index.iter().zip(&before).zip(&after) {
        if *is_left {
            assert_eq!(new.w, old.w);
        } else {
            assert_eq!(new.w, 0.0);
        }
    }
    assert!(lr_index.iter().any(|l| *l) && lr_index.iter().any(|l| !*l));
}

#[test]
fn scenario_b_projection_modulation() {
    let positions = vec![Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), Vec3::new(20.0, 0.0, 0.0)];
    let mut brain = point_brain(positions.clone());
    let sources = SourceObj::new("s", positions).unwrap().with_data(vec![1.0, 2.0, 3.0]).unwrap();
    let options = ProjectOptions {
        radius: 5.0,
        ..ProjectOptions::default()
    };
    let result = project_sources(&sources, &mut brain, &options, &mut Monitor::none()).unwrap();
    assert_eq!(result.values, vec![1.0, 2.0, 3.0]);
    assert_eq!(result.status, ProjectionStatus::Painted);
    assert_eq!(brain.projection_overlay().unwrap(), &[1.0, 2.0, 3.0]);
}

#[test]
fn scenario_c_projection_repartition_same_hemisphere() {
    let mut brain = point_brain(vec![Vec3::new(-5.0, 0.0, 0.0)]);
    let sources = SourceObj::new("s", vec![Vec3::new(5.0, 0.0, 0.0), Vec3::new(-4.0, 0.0, 0.0)]).unwrap();
    let options = ProjectOptions {
        kind: ProjectionKind::Repartition,
        radius: 10.0,
        contribute: false,
    };
    let result = project_sources(&sources, &mut brain, &options, &mut Monitor::none()).unwrap();
    assert_eq!(result.values, vec![1.0]);

    let options = ProjectOptions {
        contribute: true,
        ..options
    };
    let result = project_sources(&sources, &mut brain, &options, &mut Monitor::none()).unwrap();
    assert_eq!(result.values, vec![2.0]);
}

#[test]
fn scenario_d_roi_lookup() {
    let mut vol = Volume::filled([3, 3, 3], 0);
    vol.set(1, 1, 1, 7).unwrap();
    let labels = LabelTable::from_labels(vec![7], vec!["CenterLabel".to_string()]).unwrap();
    let roi = RoiObj::from_template(
        "roi",
        RoiTemplate {
            vol,
            labels,
            hdr: affine_to_rows(Mat4::IDENTITY),
        },
    )
    .unwrap();
    let table = roi
        .localize_sources(&[Vec3::ONE, Vec3::splat(2.0)], &LocalizeOptions::default())
        .unwrap();
    assert_eq!(table.column("label").unwrap(), vec!["CenterLabel", NOT_FOUND]);
}

#[test]
fn scenario_e_colormap_with_thresholds() {
    let red = Vec4::new(1.0, 0.0, 0.0, 1.0);
    let blue = Vec4::new(0.0, 0.0, 1.0, 1.0);
    let mut state = ColorState::named("viridis");
    state.set_clim(Some((0.0, 1.0))).unwrap();
    state.set_vmin(Some(0.2)).unwrap().set_under(Some(red));
    state.set_vmax(Some(0.8)).unwrap().set_over(Some(blue));

    let colors = array_to_colormap(&[0.0, 0.5, 1.0], &state);
    assert_eq!(colors[0], red);
    assert_eq!(colors[2], blue);

    let viridis = ColorMapRegistry::builtin().resolve("viridis");
    let (low, high) = (viridis.sample(0.0), viridis.sample(1.0));
    let middle = colors[1].truncate();
    assert!(middle.distance(low) > 0.1 && middle.distance(high) > 0.1);
    assert!((middle - viridis.sample(0.5)).abs().max_element() < 0.02);
}

#[test]
fn scenario_f_print_size_screenshot() {
    let mut scene = SceneObj::new(SceneOptions {
        size: (800, 600),
        ..SceneOptions::default()
    });
    let brain = BrainObj::new("brain", "sphere").unwrap();
    scene.add_to_subplot(brain, 0, 0, &SubplotOptions::default()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("print.png");
    let options = ScreenshotOptions {
        size: SizeRequest::PrintSize {
            size: (10.0, 5.0),
            dpi: 300.0,
            unit: Unit::Cm,
        },
        ..ScreenshotOptions::default()
    };
    let img = scene.screenshot(&path, &options).unwrap();
    let expected = 10.0 / 2.54 * 300.0;
    assert!((f64::from(img.width()) - expected).abs() <= 1.0);
    let aspect = f64::from(img.width()) / f64::from(img.height());
    assert!((aspect - 800.0 / 600.0).abs() < 0.01);
    assert_eq!(scene.size(), (800, 600));

    let saved = image::open(&path).unwrap();
    assert_eq!((saved.width(), saved.height()), img.dimensions());
}
