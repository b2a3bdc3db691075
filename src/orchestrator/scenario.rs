//! Scenario definitions and their recorded results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which channels a scenario exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelMode {
    /// Push channel plus status polling (default).
    #[default]
    Dual,
    /// Status polling only; no push channel is opened.
    PullOnly,
}

impl std::fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelMode::Dual => write!(f, "dual"),
            ChannelMode::PullOnly => write!(f, "pull_only"),
        }
    }
}

impl std::str::FromStr for ChannelMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "dual" => Ok(ChannelMode::Dual),
            "pull_only" | "pull" => Ok(ChannelMode::PullOnly),
            _ => anyhow::bail!("Invalid channel mode '{}'. Valid values: dual, pull_only", s),
        }
    }
}

/// One configured test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub portfolio_types: Vec<String>,
    /// Informational only, shown when the scenario starts.
    #[serde(default)]
    pub expected_duration: Option<String>,
    #[serde(default)]
    pub mode: ChannelMode,
    /// Overrides the run-wide scenario timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, portfolio_types: &[&str]) -> Self {
        Self {
            name: name.into(),
            portfolio_types: portfolio_types.iter().map(|s| s.to_string()).collect(),
            expected_duration: None,
            mode: ChannelMode::Dual,
            timeout_ms: None,
        }
    }

    pub fn with_expected_duration(mut self, expected: &str) -> Self {
        self.expected_duration = Some(expected.to_string());
        self
    }

    pub fn with_mode(mut self, mode: ChannelMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// The built-in matrix: one small, one medium and one full portfolio run.
pub fn default_scenarios() -> Vec<Scenario> {
    vec![
        Scenario::new("Quick Test - Stocks Only", &["stocks"])
            .with_expected_duration("5-8 seconds"),
        Scenario::new("Medium Test - Stocks & Bonds", &["stocks", "bonds"])
            .with_expected_duration("8-12 seconds"),
        Scenario::new(
            "Full Portfolio Analysis",
            &["stocks", "bonds", "crypto", "real_estate"],
        )
        .with_expected_duration("15-20 seconds"),
    ]
}

/// How a scenario concluded. Exactly one per scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
    Timeout,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::Failure => write!(f, "failure"),
            Outcome::Timeout => write!(f, "timeout"),
        }
    }
}

/// Immutable record of one concluded scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub outcome: Outcome,
    pub duration_ms: u64,
    pub progress_event_count: usize,
    pub final_value: Option<f64>,
    pub error_detail: Option<String>,
    pub task_id: Option<String>,
    /// Highest progress percentage observed on either channel.
    pub max_progress: f64,
}

impl ScenarioResult {
    pub(crate) fn success(
        scenario_name: &str,
        task_id: &str,
        duration: Duration,
        progress_event_count: usize,
        final_value: Option<f64>,
        max_progress: f64,
    ) -> Self {
        Self {
            scenario_name: scenario_name.to_string(),
            outcome: Outcome::Success,
            duration_ms: duration_ms(duration),
            progress_event_count,
            final_value,
            error_detail: None,
            task_id: Some(task_id.to_string()),
            max_progress,
        }
    }

    pub(crate) fn failure(
        scenario_name: &str,
        task_id: Option<&str>,
        error: impl Into<String>,
        duration: Duration,
        progress_event_count: usize,
        max_progress: f64,
    ) -> Self {
        Self {
            scenario_name: scenario_name.to_string(),
            outcome: Outcome::Failure,
            duration_ms: duration_ms(duration),
            progress_event_count,
            final_value: None,
            error_detail: Some(error.into()),
            task_id: task_id.map(str::to_string),
            max_progress,
        }
    }

    pub(crate) fn timeout(
        scenario_name: &str,
        task_id: &str,
        budget: Duration,
        duration: Duration,
        progress_event_count: usize,
        max_progress: f64,
    ) -> Self {
        Self {
            scenario_name: scenario_name.to_string(),
            outcome: Outcome::Timeout,
            duration_ms: duration_ms(duration),
            progress_event_count,
            final_value: None,
            error_detail: Some(format!("Test timeout after {}s", budget.as_secs_f64())),
            task_id: Some(task_id.to_string()),
            max_progress,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Aggregate counts for a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
    /// Percentage in `[0, 100]`; 0 for an empty run.
    pub success_rate: f64,
}

/// Ordered, append-only results of one orchestrator execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRun {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    results: Vec<ScenarioResult>,
}

impl Default for TestRun {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRun {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            results: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, result: ScenarioResult) {
        self.results.push(result);
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn results(&self) -> &[ScenarioResult] {
        &self.results
    }

    pub fn all_succeeded(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(ScenarioResult::is_success)
    }

    pub fn summary(&self) -> RunSummary {
        let total = self.results.len();
        let count = |o: Outcome| self.results.iter().filter(|r| r.outcome == o).count();
        let succeeded = count(Outcome::Success);
        let success_rate = if total == 0 {
            0.0
        } else {
            succeeded as f64 / total as f64 * 100.0
        };
        RunSummary {
            total,
            succeeded,
            failed: count(Outcome::Failure),
            timed_out: count(Outcome::Timeout),
            success_rate,
        }
    }
}
