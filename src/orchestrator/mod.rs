//! Scenario orchestration.
//!
//! The [`Orchestrator`] runs a fixed list of [`Scenario`]s strictly in
//! sequence. Each scenario gets a fresh client identity, its own push
//! channel, one server task and one [`TaskTracker`](crate::tracker::TaskTracker)
//! fed by both channels. The scenario concludes when the tracker settles or
//! its timeout fires, whichever comes first.

pub mod poller;
pub mod runner;
pub mod scenario;

pub use poller::{PollExit, PollSettings, poll_until_settled};
pub use runner::Orchestrator;
pub use scenario::{
    ChannelMode, Outcome, RunSummary, Scenario, ScenarioResult, TestRun, default_scenarios,
};

use std::time::Duration;

/// Default per-scenario timeout (60 seconds).
pub const DEFAULT_SCENARIO_TIMEOUT_SECS: u64 = 60;

/// Default pause between scenarios (3 seconds).
pub const DEFAULT_COOLDOWN_SECS: u64 = 3;

/// Default wait between `Connected` and task start (1 second).
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1000;

/// Default analysis mode sent with every start request.
pub const DEFAULT_CALCULATION_TYPE: &str = "full_analysis";

/// Run-wide orchestration settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub scenario_timeout: Duration,
    pub cooldown: Duration,
    pub settle_delay: Duration,
    pub calculation_type: String,
    pub polling: PollSettings,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            scenario_timeout: Duration::from_secs(DEFAULT_SCENARIO_TIMEOUT_SECS),
            cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
            calculation_type: DEFAULT_CALCULATION_TYPE.to_string(),
            polling: PollSettings::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_scenario_timeout(mut self, timeout: Duration) -> Self {
        self.scenario_timeout = timeout;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_calculation_type(mut self, calculation_type: &str) -> Self {
        self.calculation_type = calculation_type.to_string();
        self
    }

    pub fn with_polling(mut self, polling: PollSettings) -> Self {
        self.polling = polling;
        self
    }
}

/// Run-level instrumentation: scenario boundaries and cooldowns.
pub trait RunObserver: Send + Sync {
    fn on_scenario_started(&self, _index: usize, _total: usize, _scenario: &Scenario) {}

    fn on_scenario_finished(&self, _result: &ScenarioResult) {}

    fn on_cooldown(&self, _pause: Duration) {}
}
