//! Configuration view and initialization commands (`portfolio-harness config`).

use anyhow::Result;
use console::style;
use portfolio_harness::config::Config;
use portfolio_harness::harness_config::{CONFIG_FILE_NAME, HarnessToml};
use std::path::PathBuf;

use super::super::{Cli, ConfigCommands};
use super::RunStatus;

pub fn cmd_config(cli: &Cli, command: Option<ConfigCommands>) -> Result<RunStatus> {
    match command {
        None | Some(ConfigCommands::Show) => {
            let config = Config::load(&cli.overrides())?;
            println!("# Source: {}", config.source_display());
            println!("# Effective values (file -> env -> CLI)");
            println!();
            print!("{}", config.to_toml_string()?);
        }
        Some(ConfigCommands::Validate) => {
            let config = Config::load(&cli.overrides())?;
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("{} Configuration is valid.", style("✓").green());
            } else {
                println!("Configuration warnings:");
                for warning in &warnings {
                    println!("  - {}", warning);
                }
                return Ok(RunStatus::Failed);
            }
        }
        Some(ConfigCommands::Init { force }) => {
            let path = cli
                .config
                .clone()
                .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
            if path.exists() && !force {
                println!("{} already exists.", path.display());
                println!("Use --force to overwrite it.");
                return Ok(RunStatus::Passed);
            }

            HarnessToml::starter().save(&path)?;

            println!("Created {}", path.display());
            println!();
            println!("You can now customize:");
            println!("  - [server] base_url");
            println!("  - [run] timeouts, cooldown, calculation_type");
            println!("  - [polling] interval and retry policy");
            println!("  - [[scenarios]] the test matrix");
        }
    }

    Ok(RunStatus::Passed)
}
