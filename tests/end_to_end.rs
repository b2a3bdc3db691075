//! End-to-end runs of the orchestrator over real HTTP and WebSocket
//! adapters against an in-process mock analysis server.

mod common;

use common::{Behaviour, MockServer, unused_base_url};
use portfolio_harness::errors::HarnessError;
use portfolio_harness::orchestrator::{
    ChannelMode, Orchestrator, OrchestratorConfig, Outcome, PollSettings, Scenario,
};
use portfolio_harness::pull::{HttpPullChannel, PullChannel};
use portfolio_harness::push::WsConnector;
use portfolio_harness::report::render_summary;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig::default()
        .with_scenario_timeout(Duration::from_secs(5))
        .with_cooldown(Duration::ZERO)
        .with_settle_delay(Duration::from_millis(50))
        .with_polling(
            PollSettings::default()
                .with_interval(Duration::from_millis(100))
                .with_retry_delay(Duration::from_millis(50)),
        )
}

fn orchestrator(server: &MockServer, config: OrchestratorConfig) -> Orchestrator {
    let url = server.url();
    let pull = HttpPullChannel::new(&url, Duration::from_secs(5)).unwrap();
    Orchestrator::new(config, Arc::new(pull), Arc::new(WsConnector::new(url)))
}

mod dual_channel {
    use super::*;

    #[tokio::test]
    async fn test_completes_with_value_from_push() {
        let Some(server) = MockServer::start(Behaviour::Complete { value: 125_000.0 }).await else {
            return;
        };
        let orch = orchestrator(&server, fast_config());
        let scenario = Scenario::new("single", &["stocks"]);

        let result = orch.run_scenario(&scenario).await;

        assert_eq!(result.outcome, Outcome::Success, "{result:?}");
        assert_eq!(result.final_value, Some(125_000.0));
        assert!(result.progress_event_count >= 1);
        assert_eq!(result.task_id.as_deref(), Some("task-1"));
        assert_eq!(server.wait_for(&server.state.client_closes, 1).await, 1);
        assert!(server.state.pings.load(Ordering::SeqCst) >= 1);
        assert!(server.state.status_requests.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_invalid_portfolio_type_fails_and_closes() {
        let Some(server) = MockServer::start(Behaviour::Complete { value: 1.0 }).await else {
            return;
        };
        let orch = orchestrator(&server, fast_config());
        let scenario = Scenario::new("bad type", &["nonsense"]);

        let result = orch.run_scenario(&scenario).await;

        assert_eq!(result.outcome, Outcome::Failure);
        assert_eq!(
            result.error_detail.as_deref(),
            Some("Invalid portfolio type: nonsense")
        );
        assert!(result.task_id.is_none());
        assert_eq!(server.wait_for(&server.state.client_closes, 1).await, 1);
    }

    #[tokio::test]
    async fn test_completion_without_payload_is_failure() {
        let Some(server) = MockServer::start(Behaviour::MalformedPush).await else {
            return;
        };
        let orch = orchestrator(&server, fast_config());

        let result = orch
            .run_scenario(&Scenario::new("malformed", &["bonds"]))
            .await;

        assert_eq!(result.outcome, Outcome::Failure);
        assert!(
            result
                .error_detail
                .as_deref()
                .is_some_and(|d| d.contains("without a result payload")),
            "{result:?}"
        );
    }

    #[tokio::test]
    async fn test_server_failure_is_reported() {
        let Some(server) = MockServer::start(Behaviour::Fail).await else {
            return;
        };
        let orch = orchestrator(&server, fast_config());

        let result = orch
            .run_scenario(&Scenario::new("failing", &["crypto"]))
            .await;

        assert_eq!(result.outcome, Outcome::Failure);
        assert_eq!(
            result.error_detail.as_deref(),
            Some("Market data provider unavailable")
        );
    }

    #[tokio::test]
    async fn test_stalled_task_times_out() {
        let Some(server) = MockServer::start(Behaviour::Stall).await else {
            return;
        };
        let orch = orchestrator(&server, fast_config());
        let scenario =
            Scenario::new("stalled", &["stocks"]).with_timeout(Duration::from_millis(600));

        let result = orch.run_scenario(&scenario).await;

        assert_eq!(result.outcome, Outcome::Timeout);
        assert!(result.duration_ms >= 600);
        assert!(result.max_progress > 0.0);
        assert_eq!(server.wait_for(&server.state.client_closes, 1).await, 1);
    }

    #[tokio::test]
    async fn test_polling_completes_when_push_is_silent() {
        let Some(server) = MockServer::start(Behaviour::RestOnly { value: 42_000.5 }).await
        else {
            return;
        };
        let orch = orchestrator(&server, fast_config());

        let result = orch
            .run_scenario(&Scenario::new("rest only", &["stocks", "bonds"]))
            .await;

        assert_eq!(result.outcome, Outcome::Success, "{result:?}");
        assert_eq!(result.final_value, Some(42_000.5));
    }
}

mod pull_only {
    use super::*;

    #[tokio::test]
    async fn test_probe_never_opens_push() {
        let Some(server) = MockServer::start(Behaviour::Complete { value: 9_999.0 }).await else {
            return;
        };
        let orch = orchestrator(&server, fast_config());
        let scenario = Scenario::new("probe", &["real_estate"]).with_mode(ChannelMode::PullOnly);

        let result = orch.run_scenario(&scenario).await;

        assert_eq!(result.outcome, Outcome::Success, "{result:?}");
        assert_eq!(result.final_value, Some(9_999.0));
        assert_eq!(server.state.connections.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_task_status_is_404() {
        let Some(server) = MockServer::start(Behaviour::Stall).await else {
            return;
        };
        let pull = HttpPullChannel::new(&server.url(), Duration::from_secs(5)).unwrap();

        let err = pull.fetch_status("missing").await.unwrap_err();

        assert!(err.is_unknown_task());
        assert_eq!(err.detail(), "Task not found");
    }
}

mod matrix {
    use super::*;

    #[tokio::test]
    async fn test_mixed_matrix_summary() {
        let Some(server) = MockServer::start(Behaviour::Complete { value: 50_000.0 }).await
        else {
            return;
        };
        let orch = orchestrator(&server, fast_config());
        let scenarios = vec![
            Scenario::new("one", &["stocks"]),
            Scenario::new("broken", &["tulips"]),
            Scenario::new("two", &["stocks", "bonds"]),
        ];

        let run = orch.run(&scenarios).await.unwrap();

        let names: Vec<_> = run.results().iter().map(|r| r.scenario_name.as_str()).collect();
        assert_eq!(names, vec!["one", "broken", "two"]);
        assert!(!run.all_succeeded());
        let summary = run.summary();
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);

        let rendered = console::strip_ansi_codes(&render_summary(&run)).to_string();
        assert!(rendered.contains("Success Rate: 66.7%"));
        assert!(rendered.contains("value $50,000.00"));
        assert!(rendered.contains("Invalid portfolio type: tulips"));
        assert_eq!(server.wait_for(&server.state.client_closes, 3).await, 3);
    }

    #[tokio::test]
    async fn test_unreachable_server_runs_nothing() {
        let Some(base_url) = unused_base_url().await else {
            return;
        };
        let url = reqwest::Url::parse(&base_url).unwrap();
        let pull = HttpPullChannel::new(&url, Duration::from_secs(2)).unwrap();
        let orch = Orchestrator::new(
            fast_config(),
            Arc::new(pull),
            Arc::new(WsConnector::new(url)),
        );

        let err = orch
            .run(&[Scenario::new("never", &["stocks"])])
            .await
            .unwrap_err();

        assert!(matches!(err, HarnessError::ServerUnreachable { .. }));
    }
}
