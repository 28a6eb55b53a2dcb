//! Daily batch entry point.
//!
//! Exit status: 0 on success, 1 when a required stage (or the configuration)
//! failed, 2 when the run completed but an optional stage failed.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use ocean_pipeline::config::RunConfig;
use ocean_pipeline::{
    metrics, production_collaborators, ConfigOverrides, Credentials, Orchestrator, RawConfig, RunContext,
};

#[derive(Parser, Debug)]
#[command(name = "ocean-pipeline")]
#[command(about = "Daily ocean surface topography mapping and along-track validation")]
struct Args {
    /// Run configuration (YAML)
    #[arg(short, long, env = "PIPELINE_CONFIG")]
    config: PathBuf,

    /// Final date of the run window (default: today, UTC)
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Seed for the QA track sample
    #[arg(long)]
    seed: Option<u64>,

    /// Root of the input/output/scratch/maps directory layout
    #[arg(long, env = "PIPELINE_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Print the resolved window, paths and stage plan, then exit
    #[arg(long)]
    dry_run: bool,

    /// Serve Prometheus metrics on this address
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Serialize)]
struct DryRun<'a> {
    experiment: &'a str,
    init_date: NaiveDate,
    final_date: NaiveDate,
    day_count: i64,
    bbox: (f64, f64, f64, f64),
    datasets: Vec<&'a str>,
    input_dir: PathBuf,
    boundary_file: PathBuf,
    output_dir: PathBuf,
    scratch_dir: PathBuf,
    maps_dir: PathBuf,
    stages: Vec<&'static str>,
}

fn dry_run(config: &RunConfig, orchestrator: &Orchestrator) -> Result<()> {
    let paths = orchestrator.paths();
    let plan = DryRun {
        experiment: &config.experiment,
        init_date: config.window.init_date,
        final_date: config.window.final_date,
        day_count: config.window.day_count(),
        bbox: config.bbox.as_tuple(),
        datasets: config.datasets.iter().map(|d| d.id.as_str()).collect(),
        input_dir: paths.input_dir(),
        boundary_file: paths.filled_boundary_file(),
        output_dir: paths.output_dir(),
        scratch_dir: paths.scratch_dir(),
        maps_dir: paths.maps_dir(),
        stages: orchestrator.plan().stages().iter().map(|k| k.as_str()).collect(),
    };
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .json()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let overrides = ConfigOverrides {
        final_date: args.date,
        seed: args.seed,
        work_dir: args.work_dir.clone(),
    };
    let config = RawConfig::load(&args.config)
        .and_then(|raw| raw.validate(&overrides, Utc::now().date_naive()))
        .with_context(|| format!("Invalid configuration {}", args.config.display()))?;
    let config = Arc::new(config);

    let credentials = Arc::new(Credentials::from_env());
    credentials.for_destination(config.stages.destination)?;
    info!(providers = ?credentials.available(), "Credentials loaded");

    if let Some(addr) = args.metrics_addr {
        metrics::install_exporter(addr)?;
        info!(addr = %addr, "Prometheus metrics exporter initialized");
    }

    let cancel = CancellationToken::new();
    let ctx = RunContext::new(
        config.clone(),
        credentials,
        netcdf_io::default_backend(),
        production_collaborators(&config)?,
        cancel.clone(),
    );
    let orchestrator = Orchestrator::new(ctx);

    if args.dry_run {
        return dry_run(&config, &orchestrator);
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            cancel.cancel();
        }
    });

    let summary = orchestrator.execute().await;
    let code = summary.exit_code();
    match summary.into_result() {
        Ok(summary) if code == 2 => {
            error!(
                failed = ?summary.optional_failures().iter().map(|k| k.as_str()).collect::<Vec<_>>(),
                "Run completed with optional stage failures"
            );
            std::process::exit(2);
        }
        Ok(_) => {
            info!("Run completed");
            Ok(())
        }
        Err(failure) => {
            error!(
                stage = failure.stage.as_str(),
                experiment = %failure.experiment,
                date = %failure.date,
                resource = ?failure.resource_path(),
                error = %failure.source,
                "Run failed"
            );
            Err(failure.into())
        }
    }
}
