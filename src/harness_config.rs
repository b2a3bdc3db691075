//! Configuration file format for the harness.
//!
//! Settings are layered: `harness.toml` → environment → CLI. This module
//! owns the first two layers; [`crate::config::Config`] applies the CLI
//! layer and resolves everything into runtime types.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! base_url = "http://localhost:8000"
//! request_timeout_secs = 10
//!
//! [run]
//! scenario_timeout_secs = 60
//! cooldown_secs = 3
//! settle_delay_ms = 1000
//! calculation_type = "full_analysis"
//! portfolio_types = ["stocks", "bonds", "crypto", "real_estate"]
//!
//! [polling]
//! enabled = true
//! interval_ms = 2000
//! max_consecutive_failures = 3
//! retry_delay_ms = 500
//!
//! [[scenarios]]
//! name = "Quick Test - Stocks Only"
//! portfolio_types = ["stocks"]
//! expected_duration = "5-8 seconds"
//! mode = "dual"
//! timeout_ms = 30000     # optional, overrides scenario_timeout_secs
//! ```

use crate::orchestrator::poller::{
    DEFAULT_MAX_CONSECUTIVE_FAILURES, DEFAULT_POLL_INTERVAL_MS, DEFAULT_RETRY_DELAY_MS,
};
use crate::orchestrator::{
    DEFAULT_CALCULATION_TYPE, DEFAULT_COOLDOWN_SECS, DEFAULT_SCENARIO_TIMEOUT_SECS,
    DEFAULT_SETTLE_DELAY_MS, Scenario, default_scenarios,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "harness.toml";

pub const ENV_BASE_URL: &str = "HARNESS_BASE_URL";
pub const ENV_SCENARIO_TIMEOUT_SECS: &str = "HARNESS_SCENARIO_TIMEOUT_SECS";
pub const ENV_COOLDOWN_SECS: &str = "HARNESS_COOLDOWN_SECS";

/// Portfolio categories the analysis server understands.
pub const KNOWN_PORTFOLIO_TYPES: [&str; 4] = ["stocks", "bonds", "crypto", "real_estate"];

/// Where the analysis server lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout for pull calls.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Run-wide timing and request settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSection {
    #[serde(default = "default_scenario_timeout_secs")]
    pub scenario_timeout_secs: u64,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_calculation_type")]
    pub calculation_type: String,
    /// Selection used by `probe` and `demo` when none is given.
    #[serde(default = "default_portfolio_types")]
    pub portfolio_types: Vec<String>,
}

fn default_scenario_timeout_secs() -> u64 {
    DEFAULT_SCENARIO_TIMEOUT_SECS
}

fn default_cooldown_secs() -> u64 {
    DEFAULT_COOLDOWN_SECS
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

fn default_calculation_type() -> String {
    DEFAULT_CALCULATION_TYPE.to_string()
}

fn default_portfolio_types() -> Vec<String> {
    KNOWN_PORTFOLIO_TYPES.iter().map(|s| s.to_string()).collect()
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            scenario_timeout_secs: default_scenario_timeout_secs(),
            cooldown_secs: default_cooldown_secs(),
            settle_delay_ms: default_settle_delay_ms(),
            calculation_type: default_calculation_type(),
            portfolio_types: default_portfolio_types(),
        }
    }
}

/// Status polling alongside the push channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingSection {
    #[serde(default = "default_polling_enabled")]
    pub enabled: bool,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_polling_enabled() -> bool {
    true
}

fn default_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_max_consecutive_failures() -> u32 {
    DEFAULT_MAX_CONSECUTIVE_FAILURES
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

impl Default for PollingSection {
    fn default() -> Self {
        Self {
            enabled: default_polling_enabled(),
            interval_ms: default_interval_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// The complete harness.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub run: RunSection,
    #[serde(default)]
    pub polling: PollingSection,
    /// Scenario matrix; the built-in three scenarios when empty.
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

impl HarnessToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse harness.toml")
    }

    /// Load `path`, or defaults if the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize harness.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// A fully spelled-out default file, used by `config init`.
    pub fn starter() -> Self {
        Self {
            scenarios: default_scenarios(),
            ..Self::default()
        }
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.server.base_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_SCENARIO_TIMEOUT_SECS) {
            self.run.scenario_timeout_secs = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_SCENARIO_TIMEOUT_SECS} must be seconds, got '{raw}'"))?;
        }
        if let Some(raw) = lookup(ENV_COOLDOWN_SECS) {
            self.run.cooldown_secs = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_COOLDOWN_SECS} must be seconds, got '{raw}'"))?;
        }
        Ok(())
    }

    /// The configured scenarios, or the built-in matrix.
    pub fn scenarios(&self) -> Vec<Scenario> {
        if self.scenarios.is_empty() {
            default_scenarios()
        } else {
            self.scenarios.clone()
        }
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.run.scenario_timeout_secs == 0 {
            warnings.push("scenario_timeout_secs is 0: every scenario will time out".to_string());
        }
        if self.polling.enabled && self.polling.interval_ms == 0 {
            warnings.push("polling.interval_ms is 0: status will be polled in a tight loop".to_string());
        }

        for scenario in &self.scenarios {
            if scenario.portfolio_types.is_empty() {
                warnings.push(format!("Scenario '{}' has no portfolio types", scenario.name));
            }
            for t in &scenario.portfolio_types {
                if !KNOWN_PORTFOLIO_TYPES.contains(&t.as_str()) {
                    warnings.push(format!(
                        "Scenario '{}' uses unknown portfolio type '{}'",
                        scenario.name, t
                    ));
                }
            }
        }

        warnings
    }
}
