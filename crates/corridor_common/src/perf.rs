//! Per-request performance recording.
//!
//! A small handle threaded through the orchestrator; no process-wide
//! state. Spans are summed per name so repeated stages aggregate.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct PerfSpan {
    pub name: String,
    pub elapsed: Duration,
    pub calls: u64,
}

/// Collects named span durations for one request.
#[derive(Debug, Default)]
pub struct PerfRecorder {
    spans: Vec<PerfSpan>,
}

impl PerfRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f`, recording its wall time under `name`.
    pub fn measure<T>(&mut self, name: &str, f: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let out = f();
        self.record(name, started.elapsed());
        out
    }

    pub fn record(&mut self, name: &str, elapsed: Duration) {
        if let Some(span) = self.spans.iter_mut().find(|s| s.name == name) {
            span.elapsed += elapsed;
            span.calls += 1;
        } else {
            self.spans.push(PerfSpan {
                name: name.to_string(),
                elapsed,
                calls: 1,
            });
        }
    }

    pub fn spans(&self) -> &[PerfSpan] {
        &self.spans
    }

    pub fn total(&self) -> Duration {
        self.spans.iter().map(|s| s.elapsed).sum()
    }

    /// One-line summary for request logs.
    pub fn summary(&self) -> String {
        self.spans
            .iter()
            .map(|s| format!("{}={}ms", s.name, s.elapsed.as_millis()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
