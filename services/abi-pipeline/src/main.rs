//! GOES ABI scene pipeline.
//!
//! Fetches a scenario's L1b files from the NOAA bucket and turns them into
//! products:
//! - Raw channels and RGB composites loaded lazily
//! - Resampled onto a common grid
//! - Exported as tiled, compressed GeoTIFFs with overviews
//! - Optionally cropped to a lon/lat box and rendered to PNG

mod run_config;
mod workflow;

use std::path::{Path, PathBuf};

use acquisition::{fetch_scenario, find_local_files, AcquisitionError, DownloadConfig, Scenario};
use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use geotiff_writer::ExportOptions;
use scene::{PipelineConfig, ResampleMethod};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use run_config::{Overrides, RunFile, RunPlan};

#[derive(Parser, Debug)]
#[command(name = "abi-pipeline")]
#[command(about = "Fetch, resample, export and render GOES ABI L1b scenes")]
struct Cli {
    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download a scenario's files
    Fetch(FetchArgs),
    /// List the raw and composite products available from local files
    Info(DataArgs),
    /// Load, resample, export, crop and render
    Run(RunArgs),
}

#[derive(Args, Debug, Clone)]
struct DataArgs {
    /// Scenario name [default: us_midlatitude_cyclone]
    #[arg(long, env = "ABI_SCENARIO")]
    scenario: Option<Scenario>,

    /// Directory holding (or receiving) the scenario's files
    #[arg(long, env = "ABI_DATA_DIR", default_value = "data/abi")]
    data_dir: PathBuf,
}

impl DataArgs {
    fn scenario(&self) -> Scenario {
        self.scenario.unwrap_or(Scenario::UsMidlatitudeCyclone)
    }
}

#[derive(Args, Debug)]
struct FetchArgs {
    #[command(flatten)]
    data: DataArgs,

    /// Maximum concurrent downloads
    #[arg(long, default_value = "4")]
    max_concurrent: usize,

    /// Maximum retry attempts per file
    #[arg(long, default_value = "5")]
    max_retries: u32,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    data: DataArgs,

    /// YAML run file; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for GeoTIFF and PNG output
    #[arg(long, env = "ABI_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Products to load: names (C01, true_color) or wavelengths in µm
    #[arg(long, value_delimiter = ',')]
    products: Vec<String>,

    /// Resampler: native, nearest or bilinear
    #[arg(long)]
    resampler: Option<ResampleMethod>,

    /// YAML area definition to resample onto instead of the coarsest grid
    #[arg(long)]
    area: Option<PathBuf>,

    /// Crop box "west,south,east,north" in degrees
    #[arg(long, allow_hyphen_values = true)]
    bbox: Option<String>,

    /// Products to render to PNG
    #[arg(long, value_delimiter = ',')]
    render: Vec<String>,

    /// JSON file with extra or overriding enhancement definitions
    #[arg(long, env = "ABI_ENHANCEMENTS")]
    enhancements: Option<PathBuf>,

    /// Fail instead of downloading when files are missing
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json)?;

    match cli.command {
        Command::Fetch(args) => fetch(args).await,
        Command::Info(args) => info_command(args).await,
        Command::Run(args) => run(args).await,
    }
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

async fn fetch(args: FetchArgs) -> Result<()> {
    let config = DownloadConfig {
        max_concurrent: args.max_concurrent,
        max_retries: args.max_retries,
        ..DownloadConfig::in_dir(&args.data.data_dir)
    };
    let scenario = args.data.scenario();
    info!(scenario = %scenario, dir = %args.data.data_dir.display(), "Fetching scenario");

    let files = fetch_scenario(scenario, &config).await?;
    for file in &files {
        println!("{}", file.display());
    }
    Ok(())
}

/// Local files of the scenario, downloading them unless `offline`.
async fn ensure_files(scenario: Scenario, data_dir: &Path, offline: bool) -> Result<Vec<PathBuf>> {
    match find_local_files(scenario, data_dir) {
        Ok(files) => {
            info!(files = files.len(), dir = %data_dir.display(), "Using local files");
            Ok(files)
        }
        Err(AcquisitionError::IncompleteListing { found, .. }) if !offline => {
            warn!(found, "Local files incomplete, fetching scenario");
            let config = DownloadConfig::in_dir(data_dir);
            Ok(fetch_scenario(scenario, &config).await?)
        }
        Err(e) => Err(e)
            .with_context(|| format!("Scenario files not available in {}", data_dir.display())),
    }
}

async fn info_command(args: DataArgs) -> Result<()> {
    let scenario = args.scenario();
    let files = find_local_files(scenario, &args.data_dir)
        .with_context(|| format!("No complete scenario in {}", args.data_dir.display()))?;
    let (datasets, composites) =
        tokio::task::spawn_blocking(move || workflow::describe(&files)).await??;

    println!("Scenario: {}", scenario);
    println!("Datasets ({}):", datasets.len());
    for name in datasets {
        println!("  {}", name);
    }
    println!("Composites ({}):", composites.len());
    for name in composites {
        println!("  {}", name);
    }
    Ok(())
}

async fn run(args: RunArgs) -> Result<()> {
    let file = match &args.config {
        Some(path) => RunFile::from_file(path)?,
        None => RunFile::default(),
    };
    let overrides = Overrides {
        scenario: args.data.scenario,
        products: args.products,
        resampler: args.resampler,
        area: args.area,
        bbox: args.bbox,
        render: args.render,
        enhancements: args.enhancements,
    };
    let plan = RunPlan::resolve(file, overrides)?;

    let pipeline_config = PipelineConfig::from_env();
    pipeline_config
        .validate()
        .map_err(|e| anyhow!("Invalid pipeline configuration: {}", e))?;
    let export_options = ExportOptions::from_env();
    export_options
        .validate()
        .context("Invalid GeoTIFF options")?;

    let files = ensure_files(plan.scenario, &args.data.data_dir, args.offline).await?;

    info!(
        scenario = %plan.scenario,
        products = plan.products.len(),
        workers = pipeline_config.num_workers,
        output = %args.output_dir.display(),
        "Starting run"
    );
    let output_dir = args.output_dir;
    let summary = tokio::task::spawn_blocking(move || {
        workflow::run(&plan, &files, &output_dir, pipeline_config, &export_options)
    })
    .await??;

    println!("Evaluated: {}", summary.loaded.join(", "));
    if !summary.missing.is_empty() {
        println!("Missing: {}", summary.missing.join(", "));
    }
    for path in summary
        .exported
        .iter()
        .chain(&summary.cropped)
        .chain(&summary.rendered)
    {
        println!("Wrote {}", path.display());
    }
    if !summary.failures.is_empty() {
        warn!(count = summary.failures.len(), "Run finished with failures");
        for failure in &summary.failures {
            println!("Failed: {}", failure);
        }
    }
    Ok(())
}
