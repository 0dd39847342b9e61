use async_trait::async_trait;

use mongostats_core::event::{EventSink, ReportEvent};
use mongostats_core::render::shell_json;

/// Prints probes to stdout as they run: a header when a probe starts, then
/// its output or an error block.
pub struct ConsoleEventSink;

pub fn render_event(event: &ReportEvent) -> Option<String> {
    match event {
        ReportEvent::ProbeStarted { message, .. } => Some(format!("\n** {message}:")),
        ReportEvent::EntryRecorded { entry } => Some(match &entry.outcome {
            Ok(value) => shell_json(value),
            Err(e) => format!("Error running '{}':\n{e}", entry.command),
        }),
        ReportEvent::Finished { .. } => None,
    }
}

#[async_trait]
impl EventSink for ConsoleEventSink {
    async fn emit(&self, event: ReportEvent) {
        if let Some(text) = render_event(&event) {
            println!("{text}");
        }
    }
}
