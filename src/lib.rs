//! Dual-channel test harness for long-running portfolio analysis jobs.
//!
//! A client opens a push channel (WebSocket) scoped to a fresh identity,
//! starts an analysis over the pull channel (REST), and tracks the task to
//! exactly one outcome from whichever channel reports first. The
//! [`orchestrator`] runs a matrix of such scenarios and [`report`] renders
//! the result.

pub mod config;
pub mod errors;
pub mod harness_config;
pub mod identity;
pub mod logging;
pub mod orchestrator;
pub mod protocol;
pub mod pull;
pub mod push;
pub mod report;
pub mod tracker;
pub mod ui;
