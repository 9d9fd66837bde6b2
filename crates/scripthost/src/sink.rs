//! Failure reporting endpoints.
//!
//! Every bridge operation that fails hands the failure to the host's sink
//! exactly once and then returns `Err`. The sink decides whether a report
//! halts the caller ([`PanicSink`], the default) or is merely recorded
//! ([`TracingSink`], or any closure).

use std::sync::Arc;

use crate::error::ScriptError;

/// Receives every failure raised by a [`ScriptHost`](crate::ScriptHost).
pub trait ErrorSink: Send + Sync {
    /// Consume one failure report.
    fn report(&self, error: &ScriptError);
}

/// Shared handle to a sink. One sink may serve many hosts.
pub type SharedSink = Arc<dyn ErrorSink>;

impl<F> ErrorSink for F
where
    F: Fn(&ScriptError) + Send + Sync,
{
    fn report(&self, error: &ScriptError) {
        self(error)
    }
}

/// Treats every report as fatal by panicking with the decorated message.
#[derive(Debug, Default, Clone, Copy)]
pub struct PanicSink;

impl ErrorSink for PanicSink {
    fn report(&self, error: &ScriptError) {
        panic!("{error}");
    }
}

/// Downgrades failures to `tracing` error events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, error: &ScriptError) {
        let info = error.info();
        tracing::error!(
            kind = %info.error_type,
            location = info.location.as_deref().unwrap_or(""),
            "{}",
            info.message
        );
    }
}

/// The sink used when a host is built without one.
pub fn default_sink() -> SharedSink {
    Arc::new(PanicSink)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    #[should_panic(expected = "Failed to get script global at 'missing'")]
    fn panic_sink_halts() {
        PanicSink.report(&ScriptError::lookup(&["missing"]));
    }

    #[test]
    fn tracing_sink_does_not_halt() {
        TracingSink.report(&ScriptError::bind("x", "read-only"));
    }

    #[test]
    fn closures_are_sinks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_c = seen.clone();
        let sink: SharedSink = Arc::new(move |err: &ScriptError| {
            seen_c.lock().unwrap().push(err.kind());
        });
        sink.report(&ScriptError::bind("x", "nope"));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![crate::FailureKind::BindFailure]
        );
    }
}
