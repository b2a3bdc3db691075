use anyhow::{Context, Result, bail};
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::harness_config::{CONFIG_FILE_NAME, HarnessToml, KNOWN_PORTFOLIO_TYPES};
use crate::orchestrator::{OrchestratorConfig, PollSettings, Scenario};

/// Command-line overrides, the last configuration layer.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub cooldown_secs: Option<u64>,
    pub portfolio_types: Option<Vec<String>>,
    pub no_poll: bool,
}

/// Runtime configuration for the harness.
///
/// Bridges the file/env layers in [`HarnessToml`] with CLI overrides and
/// resolves everything into the types the adapters and orchestrator take.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: Url,
    pub request_timeout: Duration,
    pub orchestrator: OrchestratorConfig,
    pub scenarios: Vec<Scenario>,
    /// Selection for single-task commands (`probe`, `demo`).
    pub portfolio_types: Vec<String>,
    /// Where the file layer was read from, if it existed.
    pub source: Option<PathBuf>,
    /// The merged file + env layers, for `config show`.
    toml: HarnessToml,
}

impl Config {
    /// Load `harness.toml` (if present), apply the process environment and
    /// then `overrides`.
    pub fn load(overrides: &CliOverrides) -> Result<Self> {
        let path = overrides
            .config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
        if overrides.config_path.is_some() && !path.exists() {
            bail!("Config file not found: {}", path.display());
        }
        let mut toml = HarnessToml::load_or_default(&path)?;
        toml.apply_env(|key| std::env::var(key).ok())?;

        let source = path.exists().then_some(path);
        Self::resolve(toml, overrides, source)
    }

    /// Apply `overrides` on top of an already-merged file/env layer.
    pub fn resolve(
        mut toml: HarnessToml,
        overrides: &CliOverrides,
        source: Option<PathBuf>,
    ) -> Result<Self> {
        if let Some(url) = &overrides.base_url {
            toml.server.base_url = url.clone();
        }
        if let Some(secs) = overrides.timeout_secs {
            toml.run.scenario_timeout_secs = secs;
        }
        if let Some(secs) = overrides.cooldown_secs {
            toml.run.cooldown_secs = secs;
        }
        if overrides.no_poll {
            toml.polling.enabled = false;
        }

        let base_url = parse_base_url(&toml.server.base_url)?;

        let portfolio_types = match &overrides.portfolio_types {
            Some(types) => validate_portfolio_types(types)?,
            None => toml.run.portfolio_types.clone(),
        };

        let polling = PollSettings::default()
            .with_enabled(toml.polling.enabled)
            .with_interval(Duration::from_millis(toml.polling.interval_ms))
            .with_max_consecutive_failures(toml.polling.max_consecutive_failures)
            .with_retry_delay(Duration::from_millis(toml.polling.retry_delay_ms));

        let orchestrator = OrchestratorConfig::default()
            .with_scenario_timeout(Duration::from_secs(toml.run.scenario_timeout_secs))
            .with_cooldown(Duration::from_secs(toml.run.cooldown_secs))
            .with_settle_delay(Duration::from_millis(toml.run.settle_delay_ms))
            .with_calculation_type(&toml.run.calculation_type)
            .with_polling(polling);

        Ok(Self {
            base_url,
            request_timeout: Duration::from_secs(toml.server.request_timeout_secs),
            orchestrator,
            scenarios: toml.scenarios(),
            portfolio_types,
            source,
            toml,
        })
    }

    /// The effective configuration rendered as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        let mut effective = self.toml.clone();
        effective.server.base_url = self.base_url.to_string();
        effective.run.portfolio_types = self.portfolio_types.clone();
        effective.scenarios = self.scenarios.clone();
        toml::to_string_pretty(&effective).context("Failed to serialize configuration")
    }

    /// Validate configuration and return warnings.
    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }

    pub fn source_display(&self) -> String {
        self.source
            .as_deref()
            .map(Path::display)
            .map(|p| p.to_string())
            .unwrap_or_else(|| "(built-in defaults)".to_string())
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).with_context(|| format!("Invalid base URL '{raw}'"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => bail!("Base URL must be http or https, got '{other}'"),
    }
}

fn validate_portfolio_types(types: &[String]) -> Result<Vec<String>> {
    let types: Vec<String> = types
        .iter()
        .flat_map(|t| t.split(','))
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    if types.is_empty() {
        bail!("At least one portfolio type is required");
    }
    Ok(types)
}

/// Whether every type in `types` is one the server is known to accept.
pub fn all_known(types: &[String]) -> bool {
    types
        .iter()
        .all(|t| KNOWN_PORTFOLIO_TYPES.contains(&t.as_str()))
}
