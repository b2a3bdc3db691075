//! Run summary rendering.

use crate::orchestrator::{Outcome, ScenarioResult, TestRun};
use crate::ui::icons::{CHECK, CLOCK, CROSS, PROGRESS, SPARKLE};
use console::style;
use std::fmt::Write;

const RULE_WIDTH: usize = 50;

/// Render a human-readable summary of `run`. Pure: the run is only read.
pub fn render_summary(run: &TestRun) -> String {
    let summary = run.summary();
    let mut out = String::new();
    let rule = "=".repeat(RULE_WIDTH);

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "{}{}", PROGRESS, style("TEST SUMMARY").bold());
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "Total Tests: {}", summary.total);
    let _ = writeln!(out, "{}Successful: {}", CHECK, style(summary.succeeded).green());
    let _ = writeln!(out, "{}Failed: {}", CROSS, style(summary.failed).red());
    let _ = writeln!(out, "{}Timed out: {}", CLOCK, style(summary.timed_out).yellow());
    let _ = writeln!(out, "Success Rate: {:.1}%", summary.success_rate);

    if !run.results().is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Test Details:");
        for result in run.results() {
            let _ = writeln!(out, "  {}", detail_line(result));
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}Manual testing:", SPARKLE);
    let _ = writeln!(out, "  POST /api/portfolio/analyze   start an analysis");
    let _ = writeln!(out, "  GET  /api/portfolio/status/{{task_id}}");
    let _ = writeln!(out, "  GET  /api/portfolio/result/{{task_id}}");
    let _ = writeln!(out, "  WS   /ws/{{user_id}}   send {{\"type\": \"ping\"}}");
    let _ = writeln!(out, "  Run `portfolio-harness demo` for an interactive session.");

    out
}

fn detail_line(result: &ScenarioResult) -> String {
    let secs = result.duration().as_secs_f64();
    match result.outcome {
        Outcome::Success => {
            let value = result
                .final_value
                .map(|v| format!(" - value ${}", format_money(v)))
                .unwrap_or_default();
            format!(
                "{}{}: {:.1}s{}",
                CHECK,
                result.scenario_name,
                secs,
                value
            )
        }
        Outcome::Failure => format!(
            "{}{}: {} ({:.1}s)",
            CROSS,
            result.scenario_name,
            style(result.error_detail.as_deref().unwrap_or("Unknown error")).red(),
            secs
        ),
        Outcome::Timeout => format!(
            "{}{}: {} ({:.1}s, last progress {:.1}%)",
            CLOCK,
            result.scenario_name,
            style(result.error_detail.as_deref().unwrap_or("Timed out")).yellow(),
            secs,
            result.max_progress
        ),
    }
}

/// Two decimals with thousands separators, e.g. `1,234,567.89`.
pub fn format_money(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}
