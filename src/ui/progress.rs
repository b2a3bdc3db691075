use crate::errors::TrackerError;
use crate::orchestrator::{Outcome, RunObserver, Scenario, ScenarioResult};
use crate::protocol::ProgressEvent;
use crate::report::format_money;
use crate::tracker::{EventSource, Signal, TrackerObserver};
use crate::ui::icons::{CHECK, CLOCK, CROSS, MONEY, PAUSE, RUNNING};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Terminal UI for a harness run, rendered via `indicatif` progress bars.
///
/// Two bars are stacked vertically:
/// - Scenario bar: how many scenarios have concluded
/// - Task bar: percentage of the running task, fed by either channel
///
/// Registered on the orchestrator both as a [`RunObserver`] and as a
/// [`TrackerObserver`].
pub struct RunDisplay {
    multi: MultiProgress,
    scenario_bar: ProgressBar,
    task_bar: ProgressBar,
    verbose: bool,
}

impl RunDisplay {
    pub fn new(total_scenarios: u64, verbose: bool) -> Self {
        let multi = MultiProgress::new();

        let scenario_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let scenario_bar = multi.add(ProgressBar::new(total_scenarios));
        scenario_bar.set_style(scenario_style);
        scenario_bar.set_prefix("Scenarios");

        let task_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} {spinner} [{bar:30.green/white}] {pos:>3}% {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("=> ");

        let task_bar = multi.add(ProgressBar::new(100));
        task_bar.set_style(task_style);
        task_bar.set_prefix("     Task");

        Self {
            multi,
            scenario_bar,
            task_bar,
            verbose,
        }
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the rich UI fails.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Clear both bars once the run is over.
    pub fn finish(&self) {
        self.task_bar.finish_and_clear();
        self.scenario_bar.finish_and_clear();
    }
}

impl RunObserver for RunDisplay {
    fn on_scenario_started(&self, index: usize, total: usize, scenario: &Scenario) {
        self.scenario_bar
            .set_message(style(&scenario.name).yellow().to_string());
        self.task_bar.reset();
        self.task_bar.set_message("connecting...");
        self.task_bar.enable_steady_tick(Duration::from_millis(100));

        let expected = scenario
            .expected_duration
            .as_deref()
            .map(|e| format!(" (expected {e})"))
            .unwrap_or_default();
        self.print_line(format!(
            "{}Test {}/{}: {} [{}]{}",
            RUNNING,
            index + 1,
            total,
            style(&scenario.name).bold(),
            scenario.portfolio_types.join(", "),
            style(expected).dim()
        ));
    }

    fn on_scenario_finished(&self, result: &ScenarioResult) {
        self.task_bar.disable_steady_tick();
        self.scenario_bar.inc(1);

        let secs = result.duration().as_secs_f64();
        let line = match result.outcome {
            Outcome::Success => {
                let value = result
                    .final_value
                    .map(|v| format!(" {}${}", MONEY, format_money(v)))
                    .unwrap_or_default();
                format!(
                    "  {}{} in {:.1}s{}",
                    CHECK,
                    style("completed").green(),
                    secs,
                    value
                )
            }
            Outcome::Failure => format!(
                "  {}{}: {}",
                CROSS,
                style("failed").red(),
                result.error_detail.as_deref().unwrap_or("Unknown error")
            ),
            Outcome::Timeout => format!(
                "  {}{} after {:.1}s",
                CLOCK,
                style("timed out").yellow(),
                secs
            ),
        };
        self.print_line(line);
    }

    fn on_cooldown(&self, pause: Duration) {
        self.task_bar
            .set_message(format!("{}cooling down {}s", PAUSE, pause.as_secs()));
    }
}

impl TrackerObserver for RunDisplay {
    fn on_progress(
        &self,
        _task_id: &str,
        source: EventSource,
        event: &ProgressEvent,
        max_percentage: f64,
    ) {
        self.task_bar.set_position(max_percentage.round() as u64);
        self.task_bar.set_message(format!(
            "{} {}",
            event.current_step,
            style(format!("({}/{}, {})", event.processed_items, event.total_items, source)).dim()
        ));
        if self.verbose {
            self.print_line(format!(
                "    {} [{}] {} {:.1}% {}",
                style("→").dim(),
                source,
                event.status,
                event.progress_percentage,
                style(&event.current_step).dim()
            ));
        }
    }

    fn on_discarded(&self, _task_id: &str, source: EventSource, event: &ProgressEvent) {
        if self.verbose {
            self.print_line(format!(
                "    {} late {} event from {} ignored",
                style("·").dim(),
                event.status,
                source
            ));
        }
    }

    fn on_terminal(&self, _task_id: &str, signal: &Signal) {
        if matches!(signal, Signal::Completed { .. }) {
            self.task_bar.set_position(100);
        }
    }

    fn on_fault(&self, task_id: &str, error: &TrackerError) {
        self.print_line(format!("  {}{} ({})", CROSS, style(error).red(), task_id));
    }
}
