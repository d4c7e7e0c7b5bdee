use std::{num::NonZeroU32, path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use indicatif::ProgressBar;
use lavatracer::{RenderConfig, render};

/// Render the meshes described by a JSON scene file into a PNG.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Scene configuration file.
    config: PathBuf,

    /// Output image, overrides the config file.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Samples per pixel, overrides the config file.
    #[arg(short, long)]
    samples: Option<NonZeroU32>,

    /// Print more details, may be repeated.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) -> anyhow::Result<()> {
    use simplelog::LevelFilter::{Debug, Info, Off, Trace};
    simplelog::WriteLogger::init(
        match verbose {
            0 => Info,
            1 => Debug,
            _ => Trace,
        },
        simplelog::ConfigBuilder::new()
            .set_target_level(Off)
            .set_location_level(Off)
            .build(),
        std::io::stderr(),
    )?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let mut config = RenderConfig::load(&args.config)?;
    if let Some(output) = args.output {
        config.output = output;
    }
    if let Some(samples) = args.samples {
        config.sample_count = samples;
    }

    let camera = config.camera()?;
    let environment = config.environment()?;
    let scene = config.load_scene()?;
    for (index, mesh) in scene.meshes().iter_enumerated() {
        log::info!(
            "Mesh {}: {} triangles, {}",
            index.raw(),
            mesh.triangle_count(),
            mesh.bvh().statistics()
        );
        if log::log_enabled!(log::Level::Trace) {
            let mut outline = String::new();
            mesh.bvh().write_tree(&mut outline)?;
            log::trace!("Hierarchy of mesh {}:\n{outline}", index.raw());
        }
    }

    let bar = ProgressBar::no_length();
    let mut render_progress = render(
        Arc::new(scene),
        environment,
        camera,
        config.render_settings(),
        |_| {},
        {
            let bar = bar.clone();
            move |_, progress| {
                bar.update(|ps| {
                    ps.set_len(progress.total as u64);
                    ps.set_pos(progress.finished as u64)
                })
            }
        },
    )?;
    bar.set_length(render_progress.progress().total as u64);

    render_progress.wait()?;
    bar.finish();

    let counters = render_progress.counters();
    log::info!(
        "{} rays, {} hits, {:.1} nodes and {:.1} triangles per ray",
        counters.rays,
        counters.hits,
        counters.nodes_visited as f64 / counters.rays.max(1) as f64,
        counters.triangles_tested as f64 / counters.rays.max(1) as f64,
    );

    render_progress
        .image()
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .save(&config.output)
        .with_context(|| format!("Failed to save {}", config.output.display()))?;
    log::info!("Saved {}", config.output.display());

    Ok(())
}
