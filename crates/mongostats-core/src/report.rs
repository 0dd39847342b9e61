use chrono::{DateTime, Utc};
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ProbeError, StatsError, StatsResult};
use crate::normalize::{normalize, normalize_field};
use crate::value::ProbeValue;
use crate::TOOL_VERSION;

/// Fields shared by every entry of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunIdentity {
    pub host: String,
    pub run_id: Uuid,
    /// Optional user-supplied label for correlating reports.
    pub reference: Option<String>,
    pub tool_version: String,
}

impl RunIdentity {
    pub fn new(host: impl Into<String>, reference: Option<String>) -> Self {
        Self {
            host: host.into(),
            run_id: Uuid::new_v4(),
            reference,
            tool_version: TOOL_VERSION.to_string(),
        }
    }
}

/// Recorded outcome of a single probe.
#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub section: String,
    pub subsection: Option<String>,
    /// Human-readable probe message, used by the console renderer.
    pub message: String,
    pub command: String,
    pub outcome: Result<ProbeValue, ProbeError>,
    pub identity: Arc<RunIdentity>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl ReportEntry {
    pub fn output(&self) -> Option<&ProbeValue> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&ProbeError> {
        self.outcome.as_ref().err()
    }

    pub fn is_error(&self) -> bool {
        self.outcome.is_err()
    }
}

impl Serialize for ReportEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.subsection.is_some() { 10 } else { 9 };
        let mut s = serializer.serialize_struct("ReportEntry", len)?;
        s.serialize_field("section", &self.section)?;
        match &self.subsection {
            Some(sub) => s.serialize_field("subsection", sub)?,
            None => s.skip_field("subsection")?,
        }
        s.serialize_field("commandLabel", &self.command)?;
        match &self.outcome {
            Ok(value) => {
                s.serialize_field("output", &normalize(value))?;
                s.skip_field("error")?;
            }
            Err(e) => {
                s.skip_field("output")?;
                let desc = ProbeValue::String(e.to_string());
                s.serialize_field("error", &normalize_field("error", &desc))?;
            }
        }
        s.serialize_field("host", &self.identity.host)?;
        s.serialize_field("runId", &self.identity.run_id)?;
        s.serialize_field("ref", &self.identity.reference)?;
        s.serialize_field(
            "startedAt",
            &normalize(&ProbeValue::DateTime(self.started_at.timestamp_millis())),
        )?;
        s.serialize_field(
            "endedAt",
            &normalize(&ProbeValue::DateTime(self.ended_at.timestamp_millis())),
        )?;
        s.serialize_field("toolVersion", &self.identity.tool_version)?;
        s.end()
    }
}

/// Ordered, append-only sequence of entries for one run.
#[derive(Debug, Default)]
pub struct Report {
    entries: Vec<ReportEntry>,
}

impl Report {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: ReportEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn failures(&self) -> usize {
        self.entries.iter().filter(|e| e.is_error()).count()
    }

    /// Render as a JSON array with 4-space indentation.
    pub fn to_json_string(&self) -> StatsResult<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        String::from_utf8(buf).map_err(|e| StatsError::Other(e.into()))
    }
}

impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}
