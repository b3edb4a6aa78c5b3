//! Renders complete scenes without a display and checks the encoded output.

use visbrain::*;

fn brain_scene() -> SceneObj {
    let mut brain = BrainObj::new("brain", "sphere").unwrap();
    let sources = SourceObj::new("s", vec![Vec3::new(-30.0, 0.0, 20.0), Vec3::new(25.0, 10.0, -5.0)])
        .unwrap()
        .with_data(vec![1.0, 4.0])
        .unwrap();
    let options = ProjectOptions {
        radius: 20.0,
        ..ProjectOptions::default()
    };
    project_sources(&sources, &mut brain, &options, &mut Monitor::none()).unwrap();
    let cbar = ColorbarObj::from_object("cbar", &sources).unwrap();

    let mut scene = SceneObj::new(SceneOptions::default());
    scene.add_to_subplot(brain, 0, 0, &SubplotOptions::default()).unwrap();
    scene.add_to_subplot(sources, 0, 0, &SubplotOptions::default()).unwrap();
    scene.add_to_subplot(cbar, 0, 1, &SubplotOptions::default()).unwrap();
    scene
}

fn content_columns(img: &image::RgbaImage, x0: u32, x1: u32) -> usize {
    let background = *img.get_pixel(0, 0);
    (x0..x1)
        .filter(|&x| (0..img.height()).any(|y| *img.get_pixel(x, y) != background))
        .count()
}

#[test]
fn both_subplots_draw_something() {
    let mut scene = brain_scene();
    let img = scene.render().unwrap();
    assert_eq!(img.dimensions(), scene.size());

    let left = scene.viewport(0, 0).unwrap();
    let right = scene.viewport(0, 1).unwrap();
    assert!(content_columns(&img, left.x, left.x + left.width) > 10);
    assert!(content_columns(&img, right.x, right.x + right.width) > 0);
}

#[test]
fn transparent_png_keeps_alpha() {
    let mut scene = brain_scene();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("transparent.png");
    let options = ScreenshotOptions {
        transparent: true,
        ..ScreenshotOptions::default()
    };
    scene.screenshot(&path, &options).unwrap();

    let saved = image::open(&path).unwrap().to_rgba8();
    assert_eq!(saved.get_pixel(0, 0)[3], 0);
    assert!(saved.pixels().any(|p| p[3] == 255));
    assert_eq!(scene.bgcolor(), SceneOptions::default().bgcolor);
}

#[test]
fn jpeg_and_tiff_outputs() {
    let mut scene = brain_scene();
    let dir = tempfile::tempdir().unwrap();
    let options = ScreenshotOptions {
        size: SizeRequest::Factor(0.5),
        ..ScreenshotOptions::default()
    };

    let jpg = dir.path().join("half.jpg");
    let img = scene.screenshot(&jpg, &options).unwrap();
    assert_eq!(img.dimensions(), (400, 300));
    let decoded = image::open(&jpg).unwrap();
    assert!(!decoded.color().has_alpha());
    assert_eq!((decoded.width(), decoded.height()), (400, 300));

    let tif = dir.path().join("half.tif");
    scene.screenshot(&tif, &options).unwrap();
    assert_eq!(image::open(&tif).unwrap().width(), 400);

    assert!(scene.screenshot(&dir.path().join("half.gifx"), &options).is_err());
}
