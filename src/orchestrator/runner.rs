//! Sequential scenario runner.
//!
//! Per scenario the runner:
//! 1. Opens the push channel under a fresh identity and waits for `Connected`
//! 2. Lets the connection settle, watching for an early close
//! 3. Starts the task over the pull channel
//! 4. Feeds push progress and status polls into one tracker
//! 5. Concludes on the tracker's signal or the scenario timeout
//!
//! The push channel is closed exactly once on every path after a
//! successful open.

use super::poller::{PollExit, poll_until_settled};
use super::scenario::{ChannelMode, Scenario, ScenarioResult, TestRun};
use super::{OrchestratorConfig, RunObserver};
use crate::errors::HarnessError;
use crate::identity::ClientIdentity;
use crate::protocol::{ServerMessage, total_portfolio_value};
use crate::pull::PullChannel;
use crate::push::{PushChannel, PushConnector, PushEvent};
use crate::tracker::{EventSource, Signal, TaskTracker, TrackerObserver};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub struct Orchestrator {
    config: OrchestratorConfig,
    pull: Arc<dyn PullChannel>,
    push: Arc<dyn PushConnector>,
    run_observers: Vec<Arc<dyn RunObserver>>,
    tracker_observers: Vec<Arc<dyn TrackerObserver>>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        pull: Arc<dyn PullChannel>,
        push: Arc<dyn PushConnector>,
    ) -> Self {
        Self {
            config,
            pull,
            push,
            run_observers: Vec::new(),
            tracker_observers: Vec::new(),
        }
    }

    pub fn with_run_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.run_observers.push(observer);
        self
    }

    /// Attach an observer to every tracker this orchestrator creates.
    pub fn with_tracker_observer(mut self, observer: Arc<dyn TrackerObserver>) -> Self {
        self.tracker_observers.push(observer);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Check the server, then run every scenario in order.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::ServerUnreachable`] when the health check
    /// fails; no scenario is attempted in that case.
    pub async fn run(&self, scenarios: &[Scenario]) -> Result<TestRun, HarnessError> {
        self.pull.check_health().await?;
        Ok(self.run_matrix(scenarios).await)
    }

    /// Run every scenario in order. A failing scenario never stops the matrix.
    pub async fn run_matrix(&self, scenarios: &[Scenario]) -> TestRun {
        let mut run = TestRun::new();
        let total = scenarios.len();

        for (index, scenario) in scenarios.iter().enumerate() {
            for observer in &self.run_observers {
                observer.on_scenario_started(index, total, scenario);
            }

            let result = self.run_scenario(scenario).await;
            info!(
                scenario = %result.scenario_name,
                outcome = %result.outcome,
                duration_ms = result.duration_ms,
                events = result.progress_event_count,
                "Scenario finished"
            );
            for observer in &self.run_observers {
                observer.on_scenario_finished(&result);
            }
            run.record(result);

            if index + 1 < total && !self.config.cooldown.is_zero() {
                for observer in &self.run_observers {
                    observer.on_cooldown(self.config.cooldown);
                }
                tokio::time::sleep(self.config.cooldown).await;
            }
        }

        run.finish();
        run
    }

    /// Run one scenario to its single outcome.
    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioResult {
        let identity = ClientIdentity::generate();
        info!(
            scenario = %scenario.name,
            identity = %identity,
            mode = %scenario.mode,
            portfolio_types = ?scenario.portfolio_types,
            "Starting scenario"
        );

        match scenario.mode {
            ChannelMode::PullOnly => self.drive(scenario, &identity, None).await,
            ChannelMode::Dual => {
                let mut channel = match self.push.open(&identity).await {
                    Ok(channel) => channel,
                    Err(e) => {
                        warn!(scenario = %scenario.name, error = %e, "Push channel did not open");
                        return ScenarioResult::failure(
                            &scenario.name,
                            None,
                            e.to_string(),
                            Duration::ZERO,
                            0,
                            0.0,
                        );
                    }
                };
                let result = self.drive(scenario, &identity, Some(&mut channel)).await;
                channel.close().await;
                result
            }
        }
    }

    async fn drive(
        &self,
        scenario: &Scenario,
        identity: &ClientIdentity,
        mut push: Option<&mut PushChannel>,
    ) -> ScenarioResult {
        if let Some(channel) = push.as_deref_mut()
            && let Err(detail) = self.await_ready(channel).await
        {
            warn!(scenario = %scenario.name, %detail, "Push channel lost before task start");
            return ScenarioResult::failure(&scenario.name, None, detail, Duration::ZERO, 0, 0.0);
        }

        let started = Instant::now();
        let task_id = match self
            .pull
            .start_task(
                identity,
                &scenario.portfolio_types,
                &self.config.calculation_type,
            )
            .await
        {
            Ok(task_id) => task_id,
            Err(e) => {
                warn!(scenario = %scenario.name, error = %e, "Task did not start");
                return ScenarioResult::failure(
                    &scenario.name,
                    None,
                    e.detail(),
                    started.elapsed(),
                    0,
                    0.0,
                );
            }
        };
        info!(scenario = %scenario.name, task_id = %task_id, "Task started");

        let tracker = Arc::new(self.build_tracker(&task_id));

        if let Some(channel) = push.as_deref_mut()
            && let Err(e) = channel.request_status(&task_id)
        {
            debug!(task_id = %task_id, error = %e, "Status request over push not sent");
        }

        let polling = self.config.polling.enabled || push.is_none();
        let poller = polling.then(|| {
            tokio::spawn(poll_until_settled(
                self.pull.clone(),
                tracker.clone(),
                self.config.polling.clone(),
            ))
        });

        let budget = scenario.timeout().unwrap_or(self.config.scenario_timeout);
        let deadline = tokio::time::sleep(budget);
        tokio::pin!(deadline);
        let mut push_live = push.is_some();

        let verdict = loop {
            tokio::select! {
                biased;
                signal = tracker.settled() => break Some(signal),
                () = &mut deadline => break None,
                event = next_push_event(&mut push), if push_live => match event {
                    Some(PushEvent::Message(ServerMessage::Progress(message))) => {
                        if message.task_id != task_id {
                            debug!(
                                expected = %task_id,
                                received = %message.task_id,
                                "Ignoring progress for another task"
                            );
                        } else if let Err(e) = tracker.apply(message.event, EventSource::Push) {
                            debug!(task_id = %task_id, error = %e, "Push event rejected");
                        }
                    }
                    Some(PushEvent::Closed(reason)) | Some(PushEvent::Error(reason)) => {
                        push_live = false;
                        if polling {
                            warn!(task_id = %task_id, %reason, "Push channel lost mid-task, continuing on status polling");
                        } else {
                            warn!(task_id = %task_id, %reason, "Push channel lost mid-task, waiting for timeout");
                        }
                    }
                    Some(_) => {}
                    None => push_live = false,
                },
            }
        };

        if let Some(handle) = poller {
            handle.abort();
            if let Ok(PollExit::GaveUp(e)) = handle.await {
                debug!(task_id = %task_id, error = %e, "Poller had already given up");
            }
        }

        let elapsed = started.elapsed();
        let snapshot = tracker.snapshot();
        let events = snapshot.record.history.len();
        let max_progress = snapshot.max_percentage;

        match verdict {
            Some(Signal::Completed { payload }) => ScenarioResult::success(
                &scenario.name,
                &task_id,
                elapsed,
                events,
                total_portfolio_value(&payload),
                max_progress,
            ),
            Some(Signal::Failed { reason }) => {
                let reason = if reason.is_empty() {
                    "Task failed".to_string()
                } else {
                    reason
                };
                ScenarioResult::failure(
                    &scenario.name,
                    Some(&task_id),
                    reason,
                    elapsed,
                    events,
                    max_progress,
                )
            }
            Some(Signal::Fault(err)) => ScenarioResult::failure(
                &scenario.name,
                Some(&task_id),
                err.to_string(),
                elapsed,
                events,
                max_progress,
            ),
            None => {
                warn!(task_id = %task_id, budget_secs = budget.as_secs(), "Scenario timed out");
                ScenarioResult::timeout(
                    &scenario.name,
                    &task_id,
                    budget,
                    elapsed,
                    events,
                    max_progress,
                )
            }
        }
    }

    /// Wait for `Connected`, then hold for the settle delay. Fails if the
    /// channel goes away in the meantime.
    async fn await_ready(&self, channel: &mut PushChannel) -> Result<(), String> {
        match channel.next_event().await {
            Some(PushEvent::Connected) => {}
            Some(PushEvent::Closed(reason)) => {
                return Err(format!("Push channel closed before start: {reason}"));
            }
            Some(PushEvent::Error(detail)) => {
                return Err(format!("Push channel error before start: {detail}"));
            }
            Some(PushEvent::Message(_)) | None => {
                return Err("Push channel ended before connecting".to_string());
            }
        }

        let settle = tokio::time::sleep(self.config.settle_delay);
        tokio::pin!(settle);
        loop {
            tokio::select! {
                biased;
                event = channel.next_event() => match event {
                    Some(PushEvent::Closed(reason)) => {
                        return Err(format!("Push channel closed before start: {reason}"));
                    }
                    Some(PushEvent::Error(detail)) => {
                        return Err(format!("Push channel error before start: {detail}"));
                    }
                    None => return Err("Push channel ended before start".to_string()),
                    Some(_) => {}
                },
                () = &mut settle => return Ok(()),
            }
        }
    }

    fn build_tracker(&self, task_id: &str) -> TaskTracker {
        self.tracker_observers
            .iter()
            .fold(TaskTracker::new(task_id), |tracker, observer| {
                tracker.with_observer(observer.clone())
            })
    }
}

async fn next_push_event(push: &mut Option<&mut PushChannel>) -> Option<PushEvent> {
    match push {
        Some(channel) => channel.next_event().await,
        None => std::future::pending().await,
    }
}
