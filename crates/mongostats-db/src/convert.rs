use mongodb::bson::{Bson, Document};
use mongodb::error::{Error, ErrorKind};

use mongostats_core::error::ProbeError;
use mongostats_core::value::ProbeValue;

/// Convert a BSON value into the collector's value model.
///
/// BSON kinds without a dedicated variant (timestamps, decimals, binaries,
/// regexes, ...) are carried in their relaxed Extended JSON shape.
pub fn bson_to_value(value: Bson) -> ProbeValue {
    match value {
        Bson::Null | Bson::Undefined => ProbeValue::Null,
        Bson::Boolean(b) => ProbeValue::Bool(b),
        Bson::Int32(n) => ProbeValue::Int32(n),
        Bson::Int64(n) => ProbeValue::Int64(n),
        Bson::Double(d) => ProbeValue::Double(d),
        Bson::String(s) => ProbeValue::String(s),
        Bson::ObjectId(oid) => ProbeValue::ObjectId(oid.to_hex()),
        Bson::DateTime(dt) => ProbeValue::DateTime(dt.timestamp_millis()),
        Bson::Document(doc) => document_to_value(doc),
        Bson::Array(items) => ProbeValue::Array(items.into_iter().map(bson_to_value).collect()),
        other => ProbeValue::from(other.into_relaxed_extjson()),
    }
}

pub fn document_to_value(doc: Document) -> ProbeValue {
    ProbeValue::Document(
        doc.into_iter()
            .map(|(k, v)| (k, bson_to_value(v)))
            .collect(),
    )
}

/// Map a driver error to a probe failure, keeping the server's error code
/// when the failure came from a command reply.
pub fn probe_error(e: &Error) -> ProbeError {
    match e.kind.as_ref() {
        ErrorKind::Command(cmd) => ProbeError::with_code(cmd.message.clone(), cmd.code),
        _ => ProbeError::new(e.to_string()),
    }
}
