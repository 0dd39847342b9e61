use chrono::Utc;
use std::future::Future;
use std::sync::{Arc, Mutex};

use crate::error::ProbeResult;
use crate::report::{ReportEntry, RunIdentity};
use crate::value::ProbeValue;

/// What a probe is, for the report: its message, section and command label.
#[derive(Debug, Clone)]
pub struct ProbeSpec {
    pub message: String,
    pub section: Option<String>,
    pub command: String,
}

impl ProbeSpec {
    pub fn new(message: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            section: None,
            command: command.into(),
        }
    }

    pub fn in_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    /// `(section, subsection)` for this probe. Without an explicit section the
    /// message itself becomes the section.
    pub fn placement(&self) -> (String, Option<String>) {
        let slug = slugify(&self.message);
        match &self.section {
            Some(section) => (section.clone(), Some(slug)),
            None => (slug, None),
        }
    }
}

/// Lower-cased, spaces replaced with underscores.
pub fn slugify(message: &str) -> String {
    message.to_lowercase().replace(' ', "_")
}

/// Handle a probe writes its informational text into.
///
/// Cloning shares the underlying buffer.
#[derive(Debug, Clone, Default)]
pub struct OutputSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl OutputSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text, one captured line per newline-separated piece.
    pub fn print(&self, text: impl AsRef<str>) {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        lines.extend(text.as_ref().split('\n').map(str::to_string));
    }

    pub fn take_lines(&self) -> Vec<String> {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *lines)
    }
}

/// Runs one probe at a time and turns its result or failure into a
/// [`ReportEntry`]. Holds no state between calls beyond the run identity.
#[derive(Debug, Clone)]
pub struct ProbeRunner {
    identity: Arc<RunIdentity>,
}

impl ProbeRunner {
    pub fn new(identity: RunIdentity) -> Self {
        Self {
            identity: Arc::new(identity),
        }
    }

    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Await `probe` and record its outcome. The future is not polled before
    /// `started_at` is taken.
    pub async fn run<Fut>(&self, spec: &ProbeSpec, probe: Fut) -> ReportEntry
    where
        Fut: Future<Output = ProbeResult<ProbeValue>>,
    {
        let started_at = Utc::now();
        let outcome = probe.await;
        let ended_at = Utc::now();

        if let Err(ref e) = outcome {
            tracing::warn!(probe = %spec.message, error = %e, "Probe failed");
        } else {
            tracing::debug!(probe = %spec.message, "Probe succeeded");
        }

        self.entry(spec, outcome, started_at, ended_at)
    }

    /// Like [`run`](Self::run), but hands the probe an [`OutputSink`] and
    /// records `{ "result": ..., "capturedLines": [...] }` as the output.
    pub async fn run_captured<F, Fut>(&self, spec: &ProbeSpec, probe: F) -> ReportEntry
    where
        F: FnOnce(OutputSink) -> Fut,
        Fut: Future<Output = ProbeResult<ProbeValue>>,
    {
        let sink = OutputSink::new();
        let started_at = Utc::now();
        let outcome = probe(sink.clone()).await;
        let ended_at = Utc::now();
        let lines = sink.take_lines();

        let outcome = match outcome {
            Ok(result) => {
                tracing::debug!(probe = %spec.message, lines = lines.len(), "Probe succeeded");
                Ok(ProbeValue::document([
                    ("result", result),
                    ("capturedLines", ProbeValue::from(lines)),
                ]))
            }
            Err(e) => {
                tracing::warn!(probe = %spec.message, error = %e, "Probe failed");
                tracing::debug!(probe = %spec.message, ?lines, "Output captured before failure");
                Err(e)
            }
        };

        self.entry(spec, outcome, started_at, ended_at)
    }

    fn entry(
        &self,
        spec: &ProbeSpec,
        outcome: ProbeResult<ProbeValue>,
        started_at: chrono::DateTime<Utc>,
        ended_at: chrono::DateTime<Utc>,
    ) -> ReportEntry {
        let (section, subsection) = spec.placement();
        ReportEntry {
            section,
            subsection,
            message: spec.message.clone(),
            command: spec.command.clone(),
            outcome,
            identity: Arc::clone(&self.identity),
            started_at,
            ended_at,
        }
    }
}
