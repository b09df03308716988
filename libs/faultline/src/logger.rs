//! Pluggable logging sink.

use crate::fault::{Fault, UNREPORTED};

/// Side-effecting sink invoked with every first report (and with every
/// override that changed something).
///
/// Any `Fn(&Fault)` closure qualifies; the envelope is readable off the
/// fault at call time. The pipeline invokes the sink synchronously and
/// does not await or retry it.
pub trait LogSink: Send + Sync {
    /// Record one annotated failure.
    fn log(&self, fault: &Fault);
}

impl<F> LogSink for F
where
    F: Fn(&Fault) + Send + Sync,
{
    fn log(&self, fault: &Fault) {
        self(fault);
    }
}

/// Default sink: a `tracing` warn event carrying the stamped name, the
/// serialized envelope, and the failure itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, fault: &Fault) {
        let envelope = fault
            .envelope()
            .and_then(|e| serde_json::to_string(e).ok())
            .unwrap_or_default();
        tracing::warn!(target: "faultline", %envelope, error = %fault, "{}", fault.name().unwrap_or(UNREPORTED));
    }
}
