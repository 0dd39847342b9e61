pub mod collector;
pub mod config;
pub mod error;
pub mod event;
pub mod normalize;
pub mod probe;
pub mod render;
pub mod report;
pub mod source;
pub mod topology;
pub mod value;

/// Version string stamped on every report entry.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");
