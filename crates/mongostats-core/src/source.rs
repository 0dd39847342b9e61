use async_trait::async_trait;

use crate::error::ProbeResult;
use crate::probe::OutputSink;
use crate::topology::TopologyClassification;
use crate::value::ProbeValue;

/// The database command surface the collector probes.
///
/// Every method is a single attempt; failures come back as `ProbeError` and
/// are recorded by the caller.
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Identifying string for the target server.
    fn host(&self) -> String;

    async fn classify_topology(&self) -> ProbeResult<TopologyClassification>;

    /// Allow subsequent reads to be served by a non-primary member.
    async fn allow_secondary_reads(&mut self) -> ProbeResult<()>;

    /// Raw database listing; database names live under `databases[].name`.
    async fn list_databases(&self) -> ProbeResult<ProbeValue>;

    async fn list_collection_names(&self, database: &str) -> ProbeResult<Vec<String>>;

    async fn database_stats(&self, database: &str, scale: i64) -> ProbeResult<ProbeValue>;

    async fn collection_stats(
        &self,
        database: &str,
        collection: &str,
        scale: i64,
    ) -> ProbeResult<ProbeValue>;

    /// Shard summary for a routing tier. Human-readable lines go to `sink`.
    async fn sharding_summary(&self, sink: OutputSink) -> ProbeResult<ProbeValue>;

    async fn list_users(&self, database: &str) -> ProbeResult<ProbeValue>;

    async fn list_roles(&self, database: &str) -> ProbeResult<ProbeValue>;
}
