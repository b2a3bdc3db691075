//! REST-only smoke test (`portfolio-harness probe`).

use anyhow::Result;
use console::style;
use portfolio_harness::config::Config;
use portfolio_harness::errors::HarnessError;
use portfolio_harness::orchestrator::{ChannelMode, Scenario};
use portfolio_harness::report::render_summary;

use super::super::Cli;
use super::RunStatus;
use super::run::{build_orchestrator, status_of, warn_unknown_types};

pub async fn cmd_probe(cli: &Cli) -> Result<RunStatus> {
    let config = Config::load(&cli.overrides())?;
    warn_unknown_types(&config.portfolio_types);

    let types: Vec<&str> = config.portfolio_types.iter().map(String::as_str).collect();
    let scenario = Scenario::new("REST endpoint probe", &types).with_mode(ChannelMode::PullOnly);

    println!(
        "{} {} [{}]",
        style("Probing").bold(),
        style(&config.base_url).cyan(),
        config.portfolio_types.join(", ")
    );

    let orchestrator = build_orchestrator(&config)?;
    let run = match orchestrator.run(std::slice::from_ref(&scenario)).await {
        Ok(run) => run,
        Err(HarnessError::ServerUnreachable { url, detail }) => {
            eprintln!("{} Cannot reach {}: {}", style("✗").red(), url, detail);
            return Ok(RunStatus::ServerUnreachable);
        }
    };

    print!("{}", render_summary(&run));
    Ok(status_of(&run))
}
