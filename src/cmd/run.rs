//! Scenario matrix execution (`portfolio-harness run`).

use anyhow::{Context, Result};
use console::style;
use portfolio_harness::config::{Config, all_known};
use portfolio_harness::errors::HarnessError;
use portfolio_harness::orchestrator::{Orchestrator, TestRun};
use portfolio_harness::pull::HttpPullChannel;
use portfolio_harness::push::WsConnector;
use portfolio_harness::report::render_summary;
use portfolio_harness::ui::RunDisplay;
use std::path::Path;
use std::sync::Arc;

use super::super::Cli;
use super::RunStatus;

/// Wire the real adapters into an orchestrator.
pub fn build_orchestrator(config: &Config) -> Result<Orchestrator> {
    let pull = HttpPullChannel::new(&config.base_url, config.request_timeout)?;
    let push = WsConnector::new(config.base_url.clone());
    Ok(Orchestrator::new(
        config.orchestrator.clone(),
        Arc::new(pull),
        Arc::new(push),
    ))
}

pub async fn cmd_run(cli: &Cli, json_report: Option<&Path>, quiet: bool) -> Result<RunStatus> {
    let config = Config::load(&cli.overrides())?;
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    println!(
        "{} {} scenario(s) against {}",
        style("Portfolio analysis harness:").bold(),
        config.scenarios.len(),
        style(&config.base_url).cyan()
    );

    let mut orchestrator = build_orchestrator(&config)?;
    let display = (!quiet).then(|| Arc::new(RunDisplay::new(config.scenarios.len() as u64, cli.verbose)));
    if let Some(display) = &display {
        orchestrator = orchestrator
            .with_run_observer(display.clone())
            .with_tracker_observer(display.clone());
    }

    let outcome = orchestrator.run(&config.scenarios).await;
    if let Some(display) = &display {
        display.finish();
    }

    let run = match outcome {
        Ok(run) => run,
        Err(HarnessError::ServerUnreachable { url, detail }) => {
            eprintln!(
                "{} Cannot reach the analysis server at {}: {}",
                style("✗").red(),
                url,
                detail
            );
            eprintln!("Start the server first, or point --base-url at it.");
            return Ok(RunStatus::ServerUnreachable);
        }
    };

    println!();
    print!("{}", render_summary(&run));

    if let Some(path) = json_report {
        write_json_report(&run, path)?;
        println!("JSON report written to {}", path.display());
    }

    Ok(status_of(&run))
}

pub fn status_of(run: &TestRun) -> RunStatus {
    if run.all_succeeded() {
        RunStatus::Passed
    } else {
        RunStatus::Failed
    }
}

fn write_json_report(run: &TestRun, path: &Path) -> Result<()> {
    #[derive(serde::Serialize)]
    struct Report<'a> {
        summary: portfolio_harness::orchestrator::RunSummary,
        #[serde(flatten)]
        run: &'a TestRun,
    }

    let report = Report {
        summary: run.summary(),
        run,
    };
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    Ok(())
}

/// Warn about portfolio types the server is not known to accept.
pub fn warn_unknown_types(types: &[String]) {
    if !all_known(types) {
        tracing::warn!(?types, "Selection contains unknown portfolio types; the server may reject it");
    }
}
