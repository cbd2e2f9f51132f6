mod config;
mod driver;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use crate::config::DriverConfig;
use crate::driver::Driver;

#[derive(Parser)]
#[command(name = "vibe-sched", about = "Drive the adaptive event scheduler headlessly")]
struct Args {
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of ticks to run
    #[arg(long)]
    ticks: Option<u64>,

    /// Logical time units per tick
    #[arg(long)]
    step: Option<u64>,

    /// Fixed system load in [0, 1]
    #[arg(long, conflicts_with = "ramp")]
    load: Option<f32>,

    /// Ramp load from 0 to 1 over the run
    #[arg(long)]
    ramp: bool,

    /// Events requested per tick (0 uses the configured ceiling)
    #[arg(long)]
    budget: Option<u32>,

    /// Print the effective configuration and exit
    #[arg(long)]
    dump_config: bool,

    /// Write the effective configuration to the config path and exit
    #[arg(long, conflicts_with = "dump_config")]
    write_config: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn apply(&self, cfg: &mut DriverConfig) {
        if let Some(ticks) = self.ticks {
            cfg.driver.ticks = ticks;
        }
        if let Some(step) = self.step {
            cfg.driver.step = step;
        }
        if let Some(load) = self.load {
            cfg.driver.load = load;
            cfg.driver.ramp = false;
        }
        if self.ramp {
            cfg.driver.ramp = true;
        }
        if let Some(budget) = self.budget {
            cfg.driver.budget = budget;
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let path = args.config.clone().unwrap_or_else(config::default_config_path);
    let mut cfg = if args.config.is_some() {
        match config::try_load(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                error!("{e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        config::load_from_file(&path)
    };
    args.apply(&mut cfg);

    if let Err(e) = cfg.validate() {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    if args.dump_config {
        return match config::to_toml(&cfg) {
            Ok(text) => {
                print!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("{e}");
                ExitCode::FAILURE
            }
        };
    }

    if args.write_config {
        return match config::save_to_file(&path, &cfg) {
            Ok(()) => {
                info!("Wrote {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("{e}");
                ExitCode::FAILURE
            }
        };
    }

    let mut driver = match Driver::new(&cfg) {
        Ok(d) => d,
        Err(e) => {
            error!("Failed to set up scheduler: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Running {} ticks of {} units (capacity {}, budget {})",
        cfg.driver.ticks,
        cfg.driver.step,
        driver.scheduler().queue().capacity(),
        cfg.driver.budget
    );
    let summary = driver.run();
    let stats = summary.stats;
    info!(
        "{} vblanks, {} hblanks, {} input polls, {} audio bytes, {} notices",
        summary.vblanks, summary.hblanks, summary.input_polls, summary.audio_bytes, summary.notices
    );
    info!(
        "Processed {} events over {} ticks, avg {:?}/tick, {} still queued",
        stats.total_processed, stats.ticks, stats.avg_processing_time, stats.queued
    );

    ExitCode::SUCCESS
}
