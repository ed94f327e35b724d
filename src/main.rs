use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use fundwatch::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for fundwatch::AppCommand {
    fn from(cmd: Commands) -> fundwatch::AppCommand {
        match cmd {
            Commands::Cycle => fundwatch::AppCommand::Cycle,
            Commands::Watch { series, cycles } => fundwatch::AppCommand::Watch { series, cycles },
            Commands::Series { code } => fundwatch::AppCommand::Series { code },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Estimate the fund's change once and show the holdings
    Cycle,
    /// Keep refreshing the estimate on the configured interval
    Watch {
        /// Also show the intraday series of this instrument code
        #[arg(short, long)]
        series: Option<String>,
        /// Stop after this many refreshes
        #[arg(short = 'n', long)]
        cycles: Option<usize>,
    },
    /// Show the intraday price series of one instrument
    Series {
        /// Instrument code, e.g. 688619
        code: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => fundwatch::cli::setup::setup(),
        Some(cmd) => fundwatch::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
