//! Human-readable rendering of probe values, in the style of the mongo
//! shell's `printjson`.

use chrono::DateTime;
use std::fmt::Write;

use crate::value::ProbeValue;

/// Banner printed before the first probe in console mode.
pub fn banner(version: &str) -> String {
    let bar = "=".repeat(32);
    format!("{bar}\nMongoDB Statistics Report\nmongostats version {version}\n{bar}")
}

/// Pretty-print a value with tab indentation and shell type wrappers
/// (`NumberLong(..)`, `ObjectId("..")`, `ISODate("..")`).
pub fn shell_json(value: &ProbeValue) -> String {
    let mut out = String::new();
    write_value(&mut out, value, 0);
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push('\t');
    }
}

fn quoted(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}

fn write_value(out: &mut String, value: &ProbeValue, depth: usize) {
    match value {
        ProbeValue::Null => out.push_str("null"),
        ProbeValue::Bool(b) => {
            let _ = write!(out, "{b}");
        }
        ProbeValue::Int32(n) => {
            let _ = write!(out, "{n}");
        }
        ProbeValue::Double(d) if d.is_nan() => out.push_str("NaN"),
        ProbeValue::Double(d) if d.is_infinite() => {
            out.push_str(if *d > 0.0 { "Infinity" } else { "-Infinity" })
        }
        ProbeValue::Double(d) => {
            let _ = write!(out, "{d}");
        }
        ProbeValue::String(s) => out.push_str(&quoted(s)),
        ProbeValue::Int64(n) => {
            let _ = write!(out, "NumberLong({n})");
        }
        ProbeValue::ObjectId(hex) => {
            let _ = write!(out, "ObjectId(\"{hex}\")");
        }
        ProbeValue::DateTime(ms) => match DateTime::from_timestamp_millis(*ms) {
            Some(dt) => {
                let _ = write!(out, "ISODate(\"{}\")", dt.format("%Y-%m-%dT%H:%M:%S%.3fZ"));
            }
            None => {
                let _ = write!(out, "new Date({ms})");
            }
        },
        ProbeValue::Document(fields) if fields.is_empty() => out.push_str("{ }"),
        ProbeValue::Document(fields) => {
            out.push_str("{\n");
            for (i, (key, v)) in fields.iter().enumerate() {
                indent(out, depth + 1);
                let _ = write!(out, "{} : ", quoted(key));
                write_value(out, v, depth + 1);
                if i + 1 < fields.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            indent(out, depth);
            out.push('}');
        }
        ProbeValue::Array(items) if items.is_empty() => out.push_str("[ ]"),
        ProbeValue::Array(items) => {
            out.push_str("[\n");
            for (i, v) in items.iter().enumerate() {
                indent(out, depth + 1);
                write_value(out, v, depth + 1);
                if i + 1 < items.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            indent(out, depth);
            out.push(']');
        }
    }
}
