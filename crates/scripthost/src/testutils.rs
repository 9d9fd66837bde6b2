//! Test utilities for `scripthost`.
//!
//! The default sink panics on every report, which is rarely what a test
//! wants. [`RecordingSink`] keeps the reports so assertions can inspect them,
//! and [`recording_host`] wires one into a fresh host.

use std::sync::{Arc, Mutex};

use crate::{ErrorSink, FailureKind, ScriptError, ScriptHost};

/// A sink that stores every report.
#[derive(Debug, Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<ScriptError>>,
}

impl RecordingSink {
    /// Create an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All reports received so far, oldest first.
    pub fn reports(&self) -> Vec<ScriptError> {
        self.reports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The kinds of all reports received so far.
    pub fn kinds(&self) -> Vec<FailureKind> {
        self.reports().iter().map(ScriptError::kind).collect()
    }

    /// Number of reports received.
    pub fn count(&self) -> usize {
        self.reports.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Forget all reports.
    pub fn clear(&self) {
        self.reports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl ErrorSink for RecordingSink {
    fn report(&self, error: &ScriptError) {
        self.reports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(error.clone());
    }
}

/// A default-configured host reporting into a fresh [`RecordingSink`].
pub fn recording_host() -> (ScriptHost, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let host = ScriptHost::builder().sink(sink.clone()).build();
    (host, sink)
}
