// flowsim - Run a voxel scene headless and dump PNG frames
//
// Pipeline:
//   1. Load scene text, build grids
//   2. Step the solver, pausing every K ticks to snapshot
//   3. Color the wet surface (brown dry -> blue deep), crop the padding ring
//   4. Write frame_NNNNNN.png and log flow/volume stats
//
// Usage: cargo run --bin flowsim -- <scene.txt> [--ticks N] [--every K] [--params FILE] [--out DIR] [--scale S]

mod color;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use flow_engine::render::{self, DEFAULT_REDRAW_INTERVAL, should_redraw};
use flow_engine::scene::{DirectorySource, SceneLoader};
use flow_engine::{GridError, GridState, LoadError, ParamsError, SimParams, Simulation};
use image::{Rgb, RgbImage};
use log::{error, info};
use thiserror::Error;

const WET_THRESHOLD: f32 = 0.001;

#[derive(Debug, Error)]
enum CliError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("load: {0}")]
    Load(#[from] LoadError),
    #[error("{0}")]
    Params(#[from] ParamsError),
    #[error("solver: {0}")]
    Grid(#[from] GridError),
    #[error("png: {0}")]
    Image(#[from] image::ImageError),
    #[error("bad scene path {0}")]
    ScenePath(String),
}

struct Options {
    scene: PathBuf,
    ticks: u64,
    every: u64,
    params: Option<PathBuf>,
    out: PathBuf,
    scale: u32,
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!(
            "Usage: {} <scene.txt> [--ticks N] [--every K] [--params FILE] [--out DIR] [--scale S]",
            args[0]
        );
        std::process::exit(1);
    }

    // Parse arguments
    let mut opts = Options {
        scene: PathBuf::from(&args[1]),
        ticks: 500,
        every: DEFAULT_REDRAW_INTERVAL,
        params: None,
        out: PathBuf::from("frames"),
        scale: 8,
    };

    let mut i = 2;
    while i < args.len() {
        let value = args.get(i + 1);
        match args[i].as_str() {
            "--ticks" => { opts.ticks = value.and_then(|s| s.parse().ok()).unwrap_or(500); i += 2; }
            "--every" => { opts.every = value.and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_REDRAW_INTERVAL); i += 2; }
            "--params" => { opts.params = value.map(PathBuf::from); i += 2; }
            "--out" => { opts.out = value.map(PathBuf::from).unwrap_or(opts.out); i += 2; }
            "--scale" => { opts.scale = value.and_then(|s| s.parse().ok()).unwrap_or(8).max(1); i += 2; }
            _ => i += 1,
        }
    }

    if let Err(e) = run(&opts) {
        error!("{}", e);
        eprintln!("flowsim: {}", e);
        std::process::exit(1);
    }
}

fn run(opts: &Options) -> Result<(), CliError> {
    let params = match &opts.params {
        Some(path) => SimParams::from_json(&fs::read_to_string(path)?)?,
        None => SimParams::default(),
    };

    let (source, scene_id) = scene_source(&opts.scene)?;
    println!("Loading {}...", opts.scene.display());
    let scene = SceneLoader::default().load_from(&source, &scene_id)?;
    let mut sim = Simulation::new(scene, params)?;
    info!("{}x{} grid, {:?}", sim.state().rows(), sim.state().cols(), sim.params());

    fs::create_dir_all(&opts.out)?;

    while sim.tick() < opts.ticks {
        if should_redraw(sim.tick(), opts.every) {
            snapshot(sim.state(), &opts.out, opts.scale)?;
        }
        sim.advance_one_tick()?;
    }
    snapshot(sim.state(), &opts.out, opts.scale)?;

    println!("Done! {} ticks, frames in {}", sim.tick(), opts.out.display());
    Ok(())
}

/// Split `dir/name.ext` into a directory source and the scene id `name`.
fn scene_source(path: &Path) -> Result<(DirectorySource, String), CliError> {
    let bad = || CliError::ScenePath(path.display().to_string());
    let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(bad)?;
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut source = DirectorySource::new(dir);
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        source = source.with_extension(ext);
    }
    Ok((source, stem.to_string()))
}

fn snapshot(state: &GridState, out: &Path, scale: u32) -> Result<(), CliError> {
    let surface = render::wet_surface(state, WET_THRESHOLD);
    let vmax = state.max_depth().max(0.5);

    // Drop the padding ring when there is an interior to show
    let (m, n) = surface.dim();
    let crop = if m > 2 && n > 2 { 1 } else { 0 };
    let (h, w) = ((m - 2 * crop) as u32, (n - 2 * crop) as u32);

    let img = RgbImage::from_fn(w * scale, h * scale, |x, y| {
        let cell = [(y / scale) as usize + crop, (x / scale) as usize + crop];
        Rgb(color::depth_color(surface[cell], vmax).to_rgb())
    });

    let path = out.join(format!("frame_{:06}.png", state.tick()));
    img.save(&path)?;

    let max_flow = state.max_flow().max(WET_THRESHOLD);
    info!(
        "step {} maxF={:.3} volume={:.3} -> {}",
        state.tick(),
        max_flow,
        state.total_water(),
        path.display()
    );
    Ok(())
}
