use anyhow::Result;
use clap::{Parser, Subcommand};
use portfolio_harness::config::CliOverrides;
use portfolio_harness::logging::{LogFormat, init_tracing};
use std::path::PathBuf;
use std::process::ExitCode;

mod cmd;

#[derive(Parser)]
#[command(name = "portfolio-harness")]
#[command(
    version,
    about = "Dual-channel test harness for long-running portfolio analysis jobs"
)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to harness.toml (default: ./harness.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Analysis server base URL. Overrides harness.toml and HARNESS_BASE_URL.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Per-scenario timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Pause between scenarios in seconds
    #[arg(long, global = true)]
    pub cooldown: Option<u64>,

    /// Portfolio types for `probe` and `demo` (comma-separated)
    #[arg(long, global = true, value_delimiter = ',')]
    pub portfolio_types: Option<Vec<String>>,

    /// Rely on the push channel only (no status polling)
    #[arg(long, global = true)]
    pub no_poll: bool,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            config_path: self.config.clone(),
            base_url: self.base_url.clone(),
            timeout_secs: self.timeout,
            cooldown_secs: self.cooldown,
            portfolio_types: self.portfolio_types.clone(),
            no_poll: self.no_poll,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the scenario matrix and print a summary
    Run {
        /// Also write the results as JSON to this path
        #[arg(long)]
        json_report: Option<PathBuf>,

        /// Hide progress bars
        #[arg(short, long)]
        quiet: bool,
    },
    /// Run one analysis over the REST endpoints only
    Probe,
    /// Interactive session against the server
    Demo,
    /// View or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default harness.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let _guard = match init_tracing(cli.verbose, cli.log_format, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    match dispatch(&cli).await {
        Ok(status) => status.exit_code(),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: &Cli) -> Result<cmd::RunStatus> {
    match &cli.command {
        Commands::Run { json_report, quiet } => {
            cmd::cmd_run(cli, json_report.as_deref(), *quiet).await
        }
        Commands::Probe => cmd::cmd_probe(cli).await,
        Commands::Demo => cmd::cmd_demo(cli).await,
        Commands::Config { command } => cmd::cmd_config(cli, command.clone()),
    }
}
