use super::record::EventSource;
use super::settle::Signal;
use crate::errors::TrackerError;
use crate::protocol::ProgressEvent;

/// Instrumentation hook registered on a tracker at construction.
///
/// Every method has a no-op default; implement only what you need.
/// Callbacks run after the tracker has released its lock.
pub trait TrackerObserver: Send + Sync {
    /// An event was accepted into the record.
    fn on_progress(
        &self,
        _task_id: &str,
        _source: EventSource,
        _event: &ProgressEvent,
        _max_percentage: f64,
    ) {
    }

    /// An event arrived after the record was frozen.
    fn on_discarded(&self, _task_id: &str, _source: EventSource, _event: &ProgressEvent) {}

    /// The tracker reached `Completed` or `Failed`.
    fn on_terminal(&self, _task_id: &str, _signal: &Signal) {}

    /// An event violated the protocol contract.
    fn on_fault(&self, _task_id: &str, _error: &TrackerError) {}
}
