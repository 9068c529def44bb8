//! ROMS regridding service.
//!
//! Runs one regridding job: a source history store is moved onto either a
//! terrain-following child grid or a fixed-depth grid, and a JSON summary
//! is printed on completion.

mod job;

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use roms_regrid::{
    regrid, regrid_to_fixed_depth, FixedDepthTarget, Grid, StoreConfig, ZarrStore,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use job::{parse_records, Job, Target};

#[derive(Parser, Debug)]
#[command(name = "regridder")]
#[command(about = "Regrid ROMS output between grids")]
struct Args {
    /// Job file path
    #[arg(short, long, default_value = "/etc/regridder/job.yaml")]
    job: String,

    /// Records to process, comma separated (default: job setting or all)
    #[arg(short, long)]
    records: Option<String>,

    /// Worker pool size (default: job or REGRID_WORKERS setting)
    #[arg(short, long, env = "REGRID_WORKERS")]
    workers: Option<usize>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true);
    if args.json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    let job = Job::load(&args.job)?;
    let config = job.config();
    let mut options = job.options.clone();
    if let Some(records) = &args.records {
        options.records = Some(parse_records(records)?);
    }
    if let Some(workers) = args.workers {
        options.worker_count = workers;
    }

    let workers = match options.worker_count {
        0 => config.worker_count,
        n => n,
    };
    info!(
        job = %args.job,
        source = %job.source.path.display(),
        workers,
        "Starting regridding job"
    );
    let start = Instant::now();

    let source = open(&job.source.path, &config.store)?;
    let source_grid = load_grid(job.source.grid_path(), &job.source.name, &config.store)?;

    let summary = match &job.target {
        Target::Grid(store) => {
            let destination_grid = load_grid(store.grid_path(), &store.name, &config.store)?;
            let mut output = open(&store.path, &config.store)?;
            regrid(config.clone(), &source_grid, &destination_grid, &source, &mut output, options)?
        }
        Target::FixedDepth { path, name, depths } => {
            let mut output = open(path, &config.store)?;
            let target = FixedDepthTarget {
                name: name.clone(),
                grid: None,
                depths: depths.clone(),
            };
            regrid_to_fixed_depth(config.clone(), &source_grid, &source, &mut output, &target, options)?
        }
    };

    info!(
        records = summary.records,
        fields = summary.fields.len(),
        weights_from_cache = summary.weights_from_cache,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Regridding job completed"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

fn open(path: &std::path::Path, config: &StoreConfig) -> Result<ZarrStore> {
    ZarrStore::open(path, config.clone())
        .with_context(|| format!("Failed to open store: {}", path.display()))
}

fn load_grid(path: &std::path::Path, name: &str, config: &StoreConfig) -> Result<Grid> {
    let store = open(path, config)?;
    Grid::from_store(&store, name).with_context(|| format!("Failed to load grid {}", name))
}
