pub mod cli;
pub mod core;
pub mod providers;

use crate::core::FundMonitor;
use crate::core::config::AppConfig;
use anyhow::Result;
use tracing::{debug, info};

pub enum AppCommand {
    /// Run one refresh cycle and print it
    Cycle,
    /// Refresh on the configured interval; optionally follow one instrument's
    /// intraday series and stop after a number of cycles
    Watch {
        series: Option<String>,
        cycles: Option<usize>,
    },
    /// Print the intraday series of one instrument
    Series { code: String },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Fundwatch starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let monitor = FundMonitor::from_config(config)?;

    match command {
        AppCommand::Cycle => cli::cycle::run(&monitor).await,
        AppCommand::Watch { series, cycles } => {
            cli::watch::run(&monitor, series.as_deref(), cycles).await
        }
        AppCommand::Series { code } => cli::series::run(&monitor, &code).await,
    }
}
