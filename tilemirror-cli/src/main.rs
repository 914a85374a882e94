//! TileMirror CLI - Command-line interface
//!
//! Mirrors the tiles covering a bounding box for a range of zoom levels and
//! optionally stitches each level into a georeferenced mosaic.

mod error;
mod progress;

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use tilemirror::clock::SystemClock;
use tilemirror::config::ConfigFile;
use tilemirror::coord::GeoBoundingBox;
use tilemirror::logging;
use tilemirror::mosaic::{Georeferencer, SystemCommandRunner};
use tilemirror::provider::{ProviderConfig, ReqwestClient};
use tilemirror::schedule::{DutyCycle, ExecutionMode};
use tilemirror::session::{MirrorSession, SessionConfig};

use error::CliError;
use progress::ProgressObserver;

#[derive(Parser, Debug)]
#[command(name = "tilemirror", version)]
#[command(
    about = "Mirror slippy-map tiles to disk and stitch georeferenced mosaics",
    long_about = None
)]
struct Args {
    /// Western edge in decimal degrees
    #[arg(short = 'l', long, default_value_t = -179.999999, allow_hyphen_values = true)]
    longitude_min: f64,

    /// Eastern edge in decimal degrees
    #[arg(short = 'r', long, default_value_t = 179.999999, allow_hyphen_values = true)]
    longitude_max: f64,

    /// Southern edge in decimal degrees
    #[arg(short = 'b', long, default_value_t = -84.999999, allow_hyphen_values = true)]
    latitude_min: f64,

    /// Northern edge in decimal degrees
    #[arg(short = 't', long, default_value_t = 84.999999, allow_hyphen_values = true)]
    latitude_max: f64,

    /// Lowest zoom level to mirror
    #[arg(short = 'z', long, default_value_t = 0)]
    z_min: u8,

    /// Highest zoom level to mirror
    #[arg(short = 'x', long, default_value_t = 10)]
    z_max: u8,

    /// Built-in provider name, or a custom name used with --url
    #[arg(short = 'p', long, default_value = "google.road")]
    provider: String,

    /// Stitch a georeferenced mosaic for each zoom level
    #[arg(short = 'm', long)]
    mosaic: bool,

    /// Also append log output to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Tile URL template for a custom provider, with {x}, {y} and {z}
    #[arg(long)]
    url: Option<String>,

    /// Tile path template for a custom provider, relative to the output root
    #[arg(long)]
    output_tile: Option<String>,

    /// Mosaic path template for a custom provider, with {z}, {x_min}, {x_max}, {y_min}, {y_max}
    #[arg(long)]
    output_mosaic: Option<String>,

    /// Directory that tile and mosaic paths are relative to [default: ./OfflineMap]
    #[arg(long)]
    output_root: Option<PathBuf>,

    /// Concurrent downloads; 1 downloads sequentially [default: 1]
    #[arg(long)]
    workers: Option<usize>,

    /// Seconds of downloading per duty cycle [default: 120]
    #[arg(long)]
    active_window: Option<u64>,

    /// Seconds of pause per duty cycle; 0 disables throttling [default: 30]
    #[arg(long)]
    idle_window: Option<u64>,

    /// Configuration file [default: <config dir>/tilemirror/config.ini]
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            process::exit(1);
        }
    };

    if let Err(e) = run(args) {
        e.exit();
    }
}

fn run(args: Args) -> Result<(), CliError> {
    let _logging_guard =
        logging::init_logging(args.log_file.as_deref()).map_err(CliError::LoggingInit)?;

    let file = match &args.config {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };

    let config = session_config(&args, &file)?;
    let provider = ProviderConfig::select(
        &args.provider,
        args.url.clone(),
        args.output_tile.clone(),
        args.output_mosaic.clone(),
    )?;
    let client = ReqwestClient::with_timeout(Duration::from_secs(file.download.timeout))?;
    let georef = Georeferencer::with_programs(
        SystemCommandRunner,
        file.georef.transform_program.clone(),
        file.georef.translate_program.clone(),
    );

    let session = MirrorSession::new(config, &provider, client, SystemClock::new(), georef)?;
    session.run(&ProgressObserver::new())?;

    info!("Done.");
    Ok(())
}

/// Merges command-line flags over the configuration file.
fn session_config(args: &Args, file: &ConfigFile) -> Result<SessionConfig, CliError> {
    let bbox = GeoBoundingBox::new(
        args.longitude_min,
        args.longitude_max,
        args.latitude_min,
        args.latitude_max,
    )?;

    let active = args.active_window.unwrap_or(file.download.active_window);
    let idle = args.idle_window.unwrap_or(file.download.idle_window);
    let duty_cycle = DutyCycle::new(Duration::from_secs(active), Duration::from_secs(idle))
        .map_err(|e| CliError::InvalidArgument(e.to_string()))?;

    let workers = args.workers.unwrap_or(file.download.workers);
    if workers == 0 {
        return Err(CliError::InvalidArgument(
            "--workers must be at least 1".to_string(),
        ));
    }

    let mut config = SessionConfig::new(bbox, args.z_min, args.z_max);
    config.mosaic = args.mosaic;
    config.output_root = args
        .output_root
        .clone()
        .unwrap_or_else(|| file.output.root.clone());
    config.duty_cycle = duty_cycle;
    config.execution = ExecutionMode::from_workers(workers);
    Ok(config)
}
