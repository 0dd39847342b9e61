use mongodb::bson::{doc, Document};
use mongodb::Client;

use mongostats_core::error::{ProbeError, ProbeResult};
use mongostats_core::topology::{classify_status, TopologyClassification};

use crate::convert::{document_to_value, probe_error};

/// Classify the connected server.
///
/// A replica set member answers `replSetGetStatus`. Anything else refuses
/// it, and `isMaster` tells a router or config server from a standalone.
pub async fn classify(client: &Client) -> ProbeResult<TopologyClassification> {
    let admin = client.database("admin");
    let status = match admin.run_command(doc! { "replSetGetStatus": 1 }).await {
        Ok(status) => status,
        Err(e) => {
            let refused = probe_error(&e);
            tracing::debug!(error = %refused, "replSetGetStatus refused, asking isMaster");
            let hello = admin
                .run_command(doc! { "isMaster": 1 })
                .await
                .map_err(|e| probe_error(&e))?;
            status_from_hello(&hello, &refused)
        }
    };
    Ok(classify_status(document_to_value(status)))
}

/// Build the status document a non-member reports: `ok: 0`, the refusal, and
/// a short `info` naming the tier when the server is a router or config
/// server.
pub fn status_from_hello(hello: &Document, refused: &ProbeError) -> Document {
    let mut status = doc! { "ok": 0, "errmsg": refused.message.as_str() };
    if let Some(code) = refused.code {
        status.insert("code", code);
    }
    if hello.get_str("msg").ok() == Some("isdbgrid") {
        status.insert("info", "mongos");
    } else if hello.contains_key("configsvr") {
        status.insert("info", "configsvr");
    }
    status
}
