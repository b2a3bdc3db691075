//! Single-assignment settlement slot shared by every code path that may
//! resolve a task.

use crate::errors::TrackerError;
use serde_json::Value;
use tokio::sync::watch;

/// The first thing that decided a task's fate.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Completed { payload: Value },
    Failed { reason: String },
    /// The server broke the protocol contract; the task never reached a
    /// terminal state.
    Fault(TrackerError),
}

/// A slot filled at most once. Filling is a compare-and-set under the watch
/// channel's lock; waiters observe the same winning value.
#[derive(Debug)]
pub struct Settlement {
    tx: watch::Sender<Option<Signal>>,
}

impl Default for Settlement {
    fn default() -> Self {
        Self::new()
    }
}

impl Settlement {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Store `signal` if the slot is still empty. Returns whether it won.
    pub fn settle(&self, signal: Signal) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.is_none() {
                *slot = Some(signal);
                true
            } else {
                false
            }
        })
    }

    pub fn peek(&self) -> Option<Signal> {
        self.tx.borrow().clone()
    }

    pub fn is_settled(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Wait for the winning signal. Cancel-safe.
    pub async fn wait(&self) -> Signal {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(signal) = rx.borrow_and_update().clone() {
                return signal;
            }
            // The sender lives as long as `self`, so this cannot fail while we wait.
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
