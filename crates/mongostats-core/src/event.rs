use async_trait::async_trait;
use uuid::Uuid;

use crate::report::ReportEntry;

#[derive(Debug, Clone)]
pub enum ReportEvent {
    ProbeStarted {
        run_id: Uuid,
        message: String,
    },
    EntryRecorded {
        entry: ReportEntry,
    },
    Finished {
        run_id: Uuid,
        entries: usize,
        failures: usize,
    },
}

/// Sink for report events, notified as probes complete.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: ReportEvent);
}

/// Channel-based event sink that forwards events to a receiver.
pub struct ChannelEventSink {
    tx: tokio::sync::mpsc::UnboundedSender<ReportEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<ReportEvent>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn emit(&self, event: ReportEvent) {
        let _ = self.tx.send(event);
    }
}

/// Simple tracing-based event sink.
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: ReportEvent) {
        match event {
            ReportEvent::ProbeStarted { message, .. } => {
                tracing::debug!(probe = %message, "probe_started");
            }
            ReportEvent::EntryRecorded { entry } => {
                tracing::debug!(
                    section = %entry.section,
                    subsection = entry.subsection.as_deref().unwrap_or("-"),
                    failed = entry.is_error(),
                    "entry_recorded"
                );
            }
            ReportEvent::Finished {
                run_id,
                entries,
                failures,
            } => {
                tracing::info!(%run_id, entries, failures, "report_finished");
            }
        }
    }
}
