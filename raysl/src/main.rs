use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser as ClapParser, Subcommand};

use raysl::error::SourceLocation;
use raysl::parser::Parser as SceneParser;
use raysl::scene::Scene;
use raysl::tracer::ImageTracer;

#[derive(ClapParser, Debug)]
#[clap(name = "raysl", version, about = "A scene-description interpreter and ray-casting renderer")]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a scene-description file and render it to a PFM image.
    Render {
        /// Path to the `.sl` scene description.
        scene: PathBuf,

        /// Path the rendered PFM image is written to.
        output: PathBuf,

        /// Declare a number identifier on the command line, shadowable by
        /// a script-level SET. May be repeated.
        #[clap(long = "declare-float", value_name = "NAME=VALUE")]
        declare_float: Vec<String>,

        /// Override the image width declared by the scene (if any).
        #[clap(long)]
        width: Option<u32>,

        /// Override the image height declared by the scene (if any).
        #[clap(long)]
        height: Option<u32>,

        /// Number of worker threads rayon uses to render, defaults to the
        /// available parallelism.
        #[clap(short = 'j', long)]
        threads: Option<usize>,
    },

    /// Tone-map a PFM image down to an 8-bit LDR image.
    Pfm2ldr {
        /// Path to the input PFM image.
        input: PathBuf,

        /// Path the LDR image (e.g. `.png`) is written to.
        output: PathBuf,

        /// Multiplicative factor applied before luminosity normalization.
        #[clap(long, default_value_t = 0.2)]
        factor: f32,

        /// Gamma correction exponent applied after clamping.
        #[clap(long, default_value_t = 1.0)]
        gamma: f32,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Render { scene, output, declare_float, width, height, threads } => {
            render(&scene, &output, &declare_float, width, height, threads)
        }
        Command::Pfm2ldr { input, output, factor, gamma } => pfm2ldr(&input, &output, factor, gamma),
    }
}

fn render(
    scene_path: &PathBuf,
    output_path: &PathBuf,
    declare_float: &[String],
    width: Option<u32>,
    height: Option<u32>,
    threads: Option<usize>,
) -> Result<()> {
    if let Some(n) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .context("failed to configure the rayon thread pool")?;
    }

    let source = std::fs::read_to_string(scene_path)
        .with_context(|| format!("could not read scene file {scene_path:?}"))?;
    let source_name = scene_path.to_string_lossy().into_owned();

    let mut scene = Scene::new();
    declare_command_line_overrides(&mut scene, declare_float)?;

    let mut dump_sink = io::stdout();
    let mut parser = SceneParser::new(&source, &source_name, &mut scene);
    parser
        .parse_scene(&mut dump_sink)
        .map_err(|e| anyhow::anyhow!("{}", e.pretty_print(&source)))
        .context("failed to parse scene")?;

    let camera = scene.camera.into_inner().unwrap_or_default();
    let renderer = scene.renderer.into_inner().unwrap_or_default();
    let tracer_settings = scene.tracer.into_inner().unwrap_or_default();
    let mut image = scene.image.into_inner().unwrap_or_else(|| geo::HdrImage::new(1, 1));

    if let (Some(w), Some(h)) = (width, height) {
        image = geo::HdrImage::new(w, h);
    } else if width.is_some() || height.is_some() {
        bail!("--width and --height must be given together");
    }

    log::info!("rendering {scene_path:?} -> {output_path:?}");
    ImageTracer::new(&scene.world, &scene.lights, &camera, &renderer, &tracer_settings).render(&mut image);

    let out = File::create(output_path).with_context(|| format!("could not create {output_path:?}"))?;
    let mut writer = BufWriter::new(out);
    geo::pfm::write_pfm(&mut writer, &image).with_context(|| format!("could not write {output_path:?}"))?;

    Ok(())
}

fn pfm2ldr(input_path: &PathBuf, output_path: &PathBuf, factor: f32, gamma: f32) -> Result<()> {
    let f = File::open(input_path).with_context(|| format!("could not open {input_path:?}"))?;
    let mut reader = BufReader::new(f);
    let mut image = geo::pfm::read_pfm(&mut reader).with_context(|| format!("could not read {input_path:?}"))?;

    image.normalize(factor, None);
    image.clamp();

    let width = image.width();
    let height = image.height();
    let mut ldr = image::RgbImage::new(width, height);

    for (x, y, color) in image.pixels() {
        let to_byte = |c: f32| ((c.powf(1.0 / gamma)).clamp(0.0, 1.0) * 255.0).round() as u8;
        ldr.put_pixel(x, y, image::Rgb([to_byte(color.r), to_byte(color.g), to_byte(color.b)]));
    }

    ldr.save(output_path).with_context(|| format!("could not write {output_path:?}"))?;
    Ok(())
}

/// Parse `--declare-float NAME=VALUE` flags into the scene's IdTable at
/// the synthetic command-line source location, so a script-level `SET`
/// of the same name silently shadows them.
fn declare_command_line_overrides(scene: &mut Scene, declare_float: &[String]) -> Result<()> {
    for entry in declare_float {
        let (name, value) = entry
            .split_once('=')
            .with_context(|| format!("--declare-float expects NAME=VALUE, got {entry:?}"))?;
        let value: f64 = value
            .parse()
            .with_context(|| format!("--declare-float value for {name:?} is not a number: {value:?}"))?;

        scene
            .table
            .declare_number(name, value, SourceLocation::command_line())
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("could not declare {name:?} from the command line"))?;
    }
    Ok(())
}
