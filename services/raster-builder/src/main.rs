//! raster-builder command line.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use pyramid::PyramidReport;
use raster_builder::{LeafSource, Pipeline, TilingConfig, WebTileReport};
use storage::FileTileStore;

#[derive(Parser, Debug)]
#[command(name = "raster-builder")]
#[command(about = "Rasterize tiled GeoJSON into a GeoTIFF pyramid and web image tiles")]
struct Args {
    /// Tiling configuration (YAML, or JSON by extension)
    #[arg(short, long, env = "RASTER_BUILDER_CONFIG")]
    config: PathBuf,

    /// Output root; rasters go to geotiff/, images to web_tiles/
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Worker threads (default: one per core)
    #[arg(long, env = "RASTER_BUILDER_THREADS")]
    threads: Option<usize>,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every stage
    Build {
        /// Root of the leaf GeoJSON tiles
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Rasterize the leaf tiles only
    Rasterize {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Build parents from stored leaf rasters
    Pyramid,
    /// Render web tiles from stored rasters
    WebTiles,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure worker threads")?;
    }

    let config = TilingConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    info!(
        tms = config.tms.identifier(),
        min_zoom = config.z_range.min,
        max_zoom = config.z_range.max,
        bands = ?config.statistics.iter().map(|s| s.band_name()).collect::<Vec<_>>(),
        "Loaded configuration"
    );

    let store = FileTileStore::new(&args.output);
    let pipeline = Pipeline::new(&config, &store);
    let leaf_zoom = config.z_range.max;

    let ok = match &args.command {
        Command::Build { input } => {
            let (rasters, images) = pipeline.build(&LeafSource::new(input, leaf_zoom))?;
            summarize_rasters(&rasters) & summarize_images(&images)
        }
        Command::Rasterize { input } => {
            summarize_rasters(&pipeline.rasterize(&LeafSource::new(input, leaf_zoom))?)
        }
        Command::Pyramid => summarize_rasters(&pipeline.pyramid()?),
        Command::WebTiles => summarize_images(&pipeline.web_tiles()?),
    };

    let (rasters, images, bytes) = store.stats().snapshot();
    info!(rasters, images, bytes, output = %store.root().display(), "Done");

    if !ok {
        bail!("some tiles failed, see the log for details");
    }
    Ok(())
}

fn init_tracing(args: &Args) {
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(true);
    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn summarize_rasters(report: &PyramidReport) -> bool {
    info!(
        built = report.built.len(),
        empty = report.empty.len(),
        failed = report.failed.len(),
        partial = report.warnings.len(),
        "Raster stage finished"
    );
    report.is_success()
}

fn summarize_images(report: &WebTileReport) -> bool {
    info!(
        tiles = report.tiles,
        images = report.images,
        failed = report.failed.len(),
        "Web tile stage finished"
    );
    report.is_success()
}
