//! Pick Reader
//!
//! Reads the pick numbers off the latest results screenshot on a wall-clock
//! schedule and publishes complete, validated sets.

use anyhow::{Result, anyhow};
use chrono::Local;
use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use pick_reader::capture::{CaptureSource, FileCapture};
use pick_reader::error::PipelineError;
use pick_reader::pipeline::{Pipeline, build_publisher, build_recognizer, config};
use pick_reader::publish::StateStore;
use pick_reader::{logging, paths};

#[derive(Parser)]
#[command(name = "pick-reader")]
#[command(about = "Reads pick numbers from results screenshots and publishes them")]
#[command(version)]
struct Args {
    /// Config file (default: config.json next to the executable)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Screenshot to read instead of the configured capture path
    #[arg(long)]
    image: Option<PathBuf>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Debug logging and debug artifacts
    #[arg(long)]
    debug: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = paths::ensure_directories() {
        eprintln!("Failed to create output directories: {}", e);
    }
    let initial = if args.debug { LevelFilter::Debug } else { LevelFilter::Info };
    if let Err(e) = logging::init(initial, Some(paths::get_logs_dir())) {
        eprintln!("Failed to install logger: {}", e);
    }

    // Log panics instead of losing them on a detached console
    std::panic::set_hook(Box::new(|info| {
        log::error!("[PANIC] {}", info);
    }));

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config_path = args.config.clone().unwrap_or_else(config::default_config_path);
    let mut config = config::init_config(&config_path).clone();
    if args.debug {
        config.debug_artifacts = true;
    } else {
        logging::set_level(config.log_level());
    }

    let recognizer = build_recognizer(&config.recognizer)?;
    let (publisher, store) = build_publisher(&config.publisher)?;
    if let Some(store) = &store {
        spawn_result_logger(store);
    }

    let capture_path = args
        .image
        .clone()
        .or_else(|| config.capture_path.clone())
        .unwrap_or_else(paths::get_capture_path);
    let capture = FileCapture::new(&capture_path);
    log::info!("Reading captures from {}", capture_path.display());

    let pipeline = Pipeline::new(config, recognizer, publisher);

    if args.once {
        return run_once(&pipeline, &capture);
    }
    run_schedule(&pipeline, &capture)
}

/// One cycle; anything short of an accepted publish is a failure.
fn run_once(pipeline: &Pipeline, capture: &dyn CaptureSource) -> Result<()> {
    let report = pipeline.run_cycle(capture)?;
    match report.publish {
        Ok(results) => {
            log::info!(
                "P2={} P3={} P4={} P5={}",
                results.p2,
                results.p3,
                results.p4,
                results.p5
            );
            Ok(())
        }
        Err(e) => Err(anyhow!(e)),
    }
}

fn run_schedule(pipeline: &Pipeline, capture: &dyn CaptureSource) -> Result<()> {
    let schedule = &pipeline.config().schedule;
    loop {
        let now = Local::now().naive_local();
        let Some((next, wait)) = schedule.wait_from(now) else {
            return Err(anyhow!("Schedule has no valid run times: {:?}", schedule));
        };
        log::info!("Next cycle at {}", next.format("%Y-%m-%d %H:%M"));
        thread::sleep(wait);

        match pipeline.run_cycle(capture) {
            Ok(report) if report.published() => log::info!("Cycle published: {}", report.summary()),
            Ok(report) => log::info!("Cycle not published: {}", report.summary()),
            Err(PipelineError::AlreadyRunning) => log::warn!("Previous cycle still running, skipped"),
            Err(e) => log::warn!("Cycle aborted: {}", e),
        }
    }
}

/// Logs every accepted set from the store's subscription.
fn spawn_result_logger(store: &Arc<StateStore>) {
    if let Some(latest) = store.latest() {
        log::info!(
            "Last published at {}: P2={} P3={} P4={} P5={}",
            latest.at,
            latest.p2,
            latest.p3,
            latest.p4,
            latest.p5
        );
    }
    let updates = store.subscribe();
    thread::spawn(move || {
        for results in updates {
            log::info!("results:update from {} at {}", results.source, results.at);
        }
    });
}
