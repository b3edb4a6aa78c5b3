//! Command line front-end.
//!
//! Usage:
//!   visbrain render --template sphere --sources sources.json \
//!       --radius 15 --rotation left --colorbar -o brain.png
//!
//!   visbrain render -o print.png --print-size 10 5 --dpi 300 --unit cm --autocrop
//!
//!   visbrain render --software -o cpu.png
//!
//!   visbrain info
//!
//! A sources file is a JSON object `{"xyz": [[x, y, z], ...], "data": [...],
//! "text": [...]}` where `data` and `text` are optional.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use visbrain::scene::{ScreenshotOptions, SubplotOptions};
use visbrain::{
    init_logging, project_sources, BrainObj, Cmap, ColorMapRegistry, ColorbarObj, Hemisphere, Monitor, ProjectOptions,
    ProjectionKind, Rotation, SceneObj, SceneOptions, SizeRequest, SourceObj, Unit, Vec3,
};
use visbrain_core::data_dir;
use visbrain_objects::{available_atlases, available_surfaces};

#[derive(Parser, Debug)]
#[command(name = "visbrain", author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a brain template, optionally with projected sources, to an image
    Render(RenderArgs),
    /// List colormaps, templates and the data directory
    Info,
}

#[derive(clap::Args, Debug)]
struct RenderArgs {
    /// Surface template name
    #[arg(short, long, default_value = "sphere")]
    template: String,

    /// JSON file with source positions and optional data
    #[arg(short, long)]
    sources: Option<PathBuf>,

    /// Projection radius (0 disables the projection)
    #[arg(long, default_value = "10")]
    radius: f32,

    /// Projection output: modulation or repartition
    #[arg(long, default_value = "modulation")]
    kind: String,

    /// Let sources reach vertices of the other hemisphere
    #[arg(long)]
    contribute: bool,

    /// Hemisphere to show: left, right or both
    #[arg(long, default_value = "both")]
    hemisphere: String,

    /// Camera rotation: top, bottom, left, right, front or back
    #[arg(short, long)]
    rotation: Option<String>,

    /// Colormap of the source data
    #[arg(long, default_value = "viridis")]
    cmap: String,

    /// Colormap limits
    #[arg(long, num_args = 2, value_names = ["LO", "HI"])]
    clim: Option<Vec<f32>>,

    /// Add a colorbar next to the brain
    #[arg(long)]
    colorbar: bool,

    /// Canvas size in pixels
    #[arg(long, num_args = 2, value_names = ["WIDTH", "HEIGHT"])]
    size: Option<Vec<u32>>,

    /// Output image (png, tif or jpg)
    #[arg(short, long, default_value = "visbrain.png")]
    output: PathBuf,

    /// Print size, in --unit
    #[arg(long, num_args = 2, value_names = ["WIDTH", "HEIGHT"], conflicts_with = "factor")]
    print_size: Option<Vec<f32>>,

    /// Resolution of the print size
    #[arg(long, default_value = "300")]
    dpi: f32,

    /// Unit of the print size: cm, mm, inch or pixel
    #[arg(long, default_value = "cm")]
    unit: Unit,

    /// Multiple of the canvas size
    #[arg(long)]
    factor: Option<f32>,

    /// Crop the image to its content
    #[arg(long)]
    autocrop: bool,

    /// Transparent background (png and tif only)
    #[arg(long)]
    transparent: bool,

    /// Draw on the CPU even when a GPU is available
    #[arg(long)]
    software: bool,
}

#[derive(Deserialize, Debug)]
struct SourceFile {
    xyz: Vec<[f32; 3]>,
    #[serde(default)]
    data: Option<Vec<f32>>,
    #[serde(default)]
    text: Option<Vec<String>>,
}

fn load_sources(path: &Path) -> visbrain::Result<SourceObj> {
    let file: SourceFile = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    let xyz = file.xyz.into_iter().map(Vec3::from_array).collect();
    let mut sources = SourceObj::new("sources", xyz)?;
    if let Some(data) = file.data {
        sources = sources.with_data(data)?;
    }
    sources.set_text(file.text)?;
    Ok(sources)
}

fn size_request(args: &RenderArgs) -> SizeRequest {
    match (&args.print_size, args.factor) {
        (Some(size), _) => SizeRequest::PrintSize {
            size: (size[0], size[1]),
            dpi: args.dpi,
            unit: args.unit,
        },
        (None, Some(factor)) => SizeRequest::Factor(factor),
        (None, None) => SizeRequest::Natural,
    }
}

fn render(args: &RenderArgs) -> visbrain::Result<()> {
    let mut options = SceneOptions::default();
    if let Some(size) = &args.size {
        options.size = (size[0], size[1]);
    }
    let mut scene = if args.software {
        SceneObj::software(options)
    } else {
        SceneObj::new(options)
    };

    let mut brain = BrainObj::new("brain", &args.template)?;
    brain.set_hemisphere(Hemisphere::from_name(&args.hemisphere)?);
    let rotation = args.rotation.as_deref().map(Rotation::from_name).transpose()?;

    let sources = args.sources.as_deref().map(load_sources).transpose()?;
    let mut colorbar = None;
    if let Some(sources) = &sources {
        {
            let mut state = sources.source_color_state().borrow_mut();
            state.set_cmap(Cmap::named(args.cmap.as_str()));
            if let Some(clim) = &args.clim {
                state.set_clim(Some((clim[0], clim[1])))?;
            }
        }
        if args.radius > 0.0 {
            let project = ProjectOptions {
                kind: ProjectionKind::from_name(&args.kind)?,
                radius: args.radius,
                contribute: args.contribute,
            };
            let result = project_sources(sources, &mut brain, &project, &mut Monitor::none())?;
            log::info!("{} of {} vertices painted", result.n_painted, brain.n_vertices());
        }
        if args.colorbar {
            colorbar = Some(ColorbarObj::from_object("colorbar", sources)?);
        }
    } else if args.colorbar {
        colorbar = Some(ColorbarObj::from_object("colorbar", &brain)?);
    }

    let mut brain_options = SubplotOptions::default();
    brain_options.rotate = rotation;
    scene.add_to_subplot(brain, 0, 0, &brain_options)?;
    if let Some(sources) = sources {
        scene.add_to_subplot(sources, 0, 0, &SubplotOptions::default())?;
    }
    if let Some(colorbar) = colorbar {
        let cbar_options = SubplotOptions {
            width_max: Some(scene.size().0 / 5),
            ..SubplotOptions::default()
        };
        scene.add_to_subplot(colorbar, 0, 1, &cbar_options)?;
    }

    let screenshot = ScreenshotOptions {
        size: size_request(args),
        autocrop: args.autocrop,
        transparent: args.transparent,
        ..ScreenshotOptions::default()
    };
    let img = scene.screenshot(&args.output, &screenshot)?;
    println!("{} ({}x{})", args.output.display(), img.width(), img.height());
    Ok(())
}

fn info() {
    println!("data directory: {}", data_dir().display());
    println!("colormaps: {}", ColorMapRegistry::builtin().names().join(", "));
    println!("surfaces: {}", available_surfaces().join(", "));
    println!("atlases: {}", available_atlases().join(", "));
}

fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();
    let result = match &args.command {
        Command::Render(render_args) => render(render_args),
        Command::Info => {
            info();
            Ok(())
        }
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
