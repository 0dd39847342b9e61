use std::future::Future;
use std::sync::Arc;

use crate::error::ProbeError;
use crate::event::{EventSink, ReportEvent};
use crate::probe::{OutputSink, ProbeRunner, ProbeSpec};
use crate::report::{Report, ReportEntry, RunIdentity};
use crate::source::StatsSource;
use crate::topology::{TopologyClassification, TopologyRole};
use crate::value::ProbeValue;

pub const SECTION_TOPOLOGY: &str = "shard_or_replicaset_info";
pub const SECTION_DATA: &str = "data_info";
pub const SECTION_SECURITY: &str = "security_info";

/// Stats are sized in megabytes.
pub const MEGABYTE: i64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub scale: i64,
    pub include_security: bool,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            scale: MEGABYTE,
            include_security: false,
        }
    }
}

/// Runs probes, appends their entries and notifies sinks.
struct Recorder {
    runner: ProbeRunner,
    event_sinks: Vec<Arc<dyn EventSink>>,
    report: Report,
}

impl Recorder {
    async fn emit(&self, event: ReportEvent) {
        for sink in &self.event_sinks {
            sink.emit(event.clone()).await;
        }
    }

    async fn announce(&self, spec: &ProbeSpec) {
        self.emit(ReportEvent::ProbeStarted {
            run_id: self.runner.identity().run_id,
            message: spec.message.clone(),
        })
        .await;
    }

    async fn probe<Fut>(&mut self, spec: &ProbeSpec, probe: Fut) -> Option<ProbeValue>
    where
        Fut: Future<Output = Result<ProbeValue, ProbeError>>,
    {
        self.announce(spec).await;
        let entry = self.runner.run(spec, probe).await;
        self.record(entry).await
    }

    async fn probe_captured<F, Fut>(&mut self, spec: &ProbeSpec, probe: F) -> Option<ProbeValue>
    where
        F: FnOnce(OutputSink) -> Fut,
        Fut: Future<Output = Result<ProbeValue, ProbeError>>,
    {
        self.announce(spec).await;
        let entry = self.runner.run_captured(spec, probe).await;
        self.record(entry).await
    }

    /// Append the entry; returns its output when the probe succeeded.
    async fn record(&mut self, entry: ReportEntry) -> Option<ProbeValue> {
        let output = entry.output().cloned();
        self.emit(ReportEvent::EntryRecorded {
            entry: entry.clone(),
        })
        .await;
        self.report.push(entry);
        output
    }
}

/// Builds a [`Report`] by probing a [`StatsSource`] in a fixed order:
/// topology, database list, then per database its collection list, its
/// stats and the stats of every listed collection.
pub struct Collector<S> {
    source: S,
    options: CollectOptions,
    recorder: Recorder,
}

impl<S: StatsSource> Collector<S> {
    pub fn new(source: S, identity: RunIdentity, options: CollectOptions) -> Self {
        Self {
            source,
            options,
            recorder: Recorder {
                runner: ProbeRunner::new(identity),
                event_sinks: Vec::new(),
                report: Report::new(),
            },
        }
    }

    pub fn add_event_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.recorder.event_sinks.push(sink);
    }

    pub fn identity(&self) -> &RunIdentity {
        self.recorder.runner.identity()
    }

    /// Run every probe and hand back the finished report. Probe failures
    /// are recorded, never returned.
    pub async fn collect(mut self) -> Report {
        tracing::info!(
            host = %self.identity().host,
            run_id = %self.identity().run_id,
            "Starting collection"
        );

        self.collect_topology().await;

        if let Some(databases) = self.collect_data().await {
            if self.options.include_security {
                self.collect_security(&databases).await;
            }
        }

        let report = self.recorder.report;
        let finished = ReportEvent::Finished {
            run_id: self.recorder.runner.identity().run_id,
            entries: report.len(),
            failures: report.failures(),
        };
        for sink in &self.recorder.event_sinks {
            sink.emit(finished.clone()).await;
        }
        report
    }

    async fn collect_topology(&mut self) {
        let spec = ProbeSpec::new("Topology classification", "rs.status()")
            .in_section(SECTION_TOPOLOGY);

        let source = &self.source;
        let mut classified = None;
        self.recorder
            .probe(&spec, async {
                let classification = source.classify_topology().await?;
                let value = classification.to_value();
                classified = Some(classification);
                Ok::<_, ProbeError>(value)
            })
            .await;

        let classification = classified.unwrap_or_else(TopologyClassification::standalone);
        tracing::info!(role = %classification.role, state = %classification.state, "Topology classified");

        match classification.role {
            TopologyRole::ReplicatedSecondary => match self.source.allow_secondary_reads().await {
                Ok(()) => tracing::info!("Reads from secondary members enabled"),
                Err(e) => tracing::warn!(error = %e, "Could not enable secondary reads"),
            },
            TopologyRole::RoutingTier => {
                let spec = ProbeSpec::new("Sharding summary", "sh.status()")
                    .in_section(SECTION_TOPOLOGY);
                let source = &self.source;
                self.recorder
                    .probe_captured(&spec, |sink| source.sharding_summary(sink))
                    .await;
            }
            _ => {}
        }
    }

    /// Returns the enumerated database names, or `None` when enumeration
    /// failed and nothing further could be probed.
    async fn collect_data(&mut self) -> Option<Vec<String>> {
        let scale = self.options.scale;
        let source = &self.source;

        let spec = ProbeSpec::new("List of databases", "db.getMongo().getDBs()")
            .in_section(SECTION_DATA);
        let listing = self.recorder.probe(&spec, source.list_databases()).await;

        let Some(databases) = listing.as_ref().and_then(database_names) else {
            tracing::warn!("No database list available, skipping per-database probes");
            return None;
        };
        tracing::info!(databases = databases.len(), "Databases enumerated");

        for db in &databases {
            let spec = ProbeSpec::new(
                format!("List of collections for database '{db}'"),
                format!("db.getSiblingDB('{db}').getCollectionNames()"),
            )
            .in_section(SECTION_DATA);
            let collections = self
                .recorder
                .probe(&spec, async {
                    source.list_collection_names(db).await.map(ProbeValue::from)
                })
                .await;

            let spec = ProbeSpec::new(
                "Database stats (MB)",
                format!("db.getSiblingDB('{db}').stats({scale})"),
            )
            .in_section(SECTION_DATA);
            self.recorder
                .probe(&spec, source.database_stats(db, scale))
                .await;

            let Some(collections) = collections.as_ref().map(string_items) else {
                tracing::debug!(database = %db, "No collection list, skipping collection stats");
                continue;
            };

            for coll in &collections {
                let spec = ProbeSpec::new(
                    "Collection stats (MB)",
                    format!("db.getSiblingDB('{db}').getCollection('{coll}').stats({scale})"),
                )
                .in_section(SECTION_DATA);
                self.recorder
                    .probe(&spec, source.collection_stats(db, coll, scale))
                    .await;
            }
        }

        Some(databases)
    }

    async fn collect_security(&mut self, databases: &[String]) {
        let source = &self.source;
        for db in databases {
            let spec = ProbeSpec::new(
                format!("Users for database '{db}'"),
                format!("db.getSiblingDB('{db}').getUsers()"),
            )
            .in_section(SECTION_SECURITY);
            self.recorder.probe(&spec, source.list_users(db)).await;

            let spec = ProbeSpec::new(
                format!("Roles for database '{db}'"),
                format!("db.getSiblingDB('{db}').getRoles()"),
            )
            .in_section(SECTION_SECURITY);
            self.recorder.probe(&spec, source.list_roles(db)).await;
        }
    }
}

fn database_names(listing: &ProbeValue) -> Option<Vec<String>> {
    let databases = listing.get("databases")?.as_array()?;
    Some(
        databases
            .iter()
            .filter_map(|d| d.get("name").and_then(ProbeValue::as_str))
            .map(str::to_string)
            .collect(),
    )
}

fn string_items(value: &ProbeValue) -> Vec<String> {
    value
        .as_array()
        .unwrap_or_default()
        .iter()
        .filter_map(ProbeValue::as_str)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeResult;
    use crate::event::ChannelEventSink;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// In-memory target. Probe keys listed in `failing` raise.
    #[derive(Default)]
    struct FakeSource {
        state: &'static str,
        databases: Vec<(&'static str, Vec<&'static str>)>,
        failing: HashSet<String>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl FakeSource {
        fn with_databases(databases: Vec<(&'static str, Vec<&'static str>)>) -> Self {
            Self {
                state: "standalone",
                databases,
                ..Default::default()
            }
        }

        fn failing(mut self, key: &str) -> Self {
            self.failing.insert(key.to_string());
            self
        }

        fn attempt(&self, key: String) -> ProbeResult<()> {
            self.calls.lock().unwrap().push(key.clone());
            if self.failing.contains(&key) {
                Err(ProbeError::with_code(format!("{key} refused"), 13))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl StatsSource for FakeSource {
        fn host(&self) -> String {
            "fake:27017".into()
        }

        async fn classify_topology(&self) -> ProbeResult<TopologyClassification> {
            self.attempt("topology".into())?;
            let info = ProbeValue::document([
                ("ok", ProbeValue::Int32(0)),
                ("info", ProbeValue::from(self.state)),
            ]);
            let raw = if self.state == "SECONDARY" {
                ProbeValue::document([
                    ("ok", ProbeValue::Int32(1)),
                    ("myState", ProbeValue::Int32(2)),
                ])
            } else {
                info
            };
            Ok(crate::topology::classify_status(raw))
        }

        async fn allow_secondary_reads(&mut self) -> ProbeResult<()> {
            self.attempt("secondary_reads".into())
        }

        async fn list_databases(&self) -> ProbeResult<ProbeValue> {
            self.attempt("databases".into())?;
            let dbs = self
                .databases
                .iter()
                .map(|(name, _)| ProbeValue::document([("name", ProbeValue::from(*name))]))
                .collect();
            Ok(ProbeValue::document([
                ("databases", ProbeValue::Array(dbs)),
                ("totalSize", ProbeValue::Int64(1 << 40)),
            ]))
        }

        async fn list_collection_names(&self, database: &str) -> ProbeResult<Vec<String>> {
            self.attempt(format!("collections:{database}"))?;
            let (_, colls) = self
                .databases
                .iter()
                .find(|(name, _)| *name == database)
                .ok_or_else(|| ProbeError::new("no such database"))?;
            Ok(colls.iter().map(|c| c.to_string()).collect())
        }

        async fn database_stats(&self, database: &str, scale: i64) -> ProbeResult<ProbeValue> {
            self.attempt(format!("dbstats:{database}"))?;
            Ok(ProbeValue::document([
                ("db", ProbeValue::from(database)),
                ("scaleFactor", ProbeValue::Int64(scale)),
            ]))
        }

        async fn collection_stats(
            &self,
            database: &str,
            collection: &str,
            _scale: i64,
        ) -> ProbeResult<ProbeValue> {
            self.attempt(format!("collstats:{database}.{collection}"))?;
            Ok(ProbeValue::document([(
                "ns",
                ProbeValue::from(format!("{database}.{collection}")),
            )]))
        }

        async fn sharding_summary(&self, sink: OutputSink) -> ProbeResult<ProbeValue> {
            self.attempt("sharding".into())?;
            sink.print("shard01 rs01/host1:27018");
            Ok(ProbeValue::document([("shards", ProbeValue::Int32(1))]))
        }

        async fn list_users(&self, database: &str) -> ProbeResult<ProbeValue> {
            self.attempt(format!("users:{database}"))?;
            Ok(ProbeValue::Array(vec![]))
        }

        async fn list_roles(&self, database: &str) -> ProbeResult<ProbeValue> {
            self.attempt(format!("roles:{database}"))?;
            Ok(ProbeValue::from("No custom roles"))
        }
    }

    fn two_by_two() -> FakeSource {
        FakeSource::with_databases(vec![("A", vec!["x", "y"]), ("B", vec!["x", "y"])])
    }

    async fn collect(source: FakeSource, options: CollectOptions) -> Report {
        let identity = RunIdentity::new(source.host(), None);
        Collector::new(source, identity, options).collect().await
    }

    fn commands(report: &Report) -> Vec<&str> {
        report.entries().iter().map(|e| e.command.as_str()).collect()
    }

    #[tokio::test]
    async fn entries_follow_probe_order() {
        let report = collect(two_by_two(), CollectOptions::default()).await;

        assert_eq!(
            commands(&report),
            [
                "rs.status()",
                "db.getMongo().getDBs()",
                "db.getSiblingDB('A').getCollectionNames()",
                "db.getSiblingDB('A').stats(1048576)",
                "db.getSiblingDB('A').getCollection('x').stats(1048576)",
                "db.getSiblingDB('A').getCollection('y').stats(1048576)",
                "db.getSiblingDB('B').getCollectionNames()",
                "db.getSiblingDB('B').stats(1048576)",
                "db.getSiblingDB('B').getCollection('x').stats(1048576)",
                "db.getSiblingDB('B').getCollection('y').stats(1048576)",
            ]
        );
        assert_eq!(report.entries()[0].section, SECTION_TOPOLOGY);
        assert!(report.entries()[1..].iter().all(|e| e.section == SECTION_DATA));
        assert_eq!(
            report.entries()[2].subsection.as_deref(),
            Some("list_of_collections_for_database_'a'")
        );
        assert_eq!(report.failures(), 0);
    }

    #[tokio::test]
    async fn one_failure_stays_local() {
        let report = collect(
            two_by_two().failing("collstats:A.x"),
            CollectOptions::default(),
        )
        .await;

        assert_eq!(report.len(), 10);
        for (i, entry) in report.entries().iter().enumerate() {
            if i == 4 {
                assert!(entry.output().is_none());
                assert_eq!(entry.error().unwrap().message, "collstats:A.x refused");
            } else {
                assert!(entry.output().is_some(), "entry {i} should have output");
            }
        }
        assert_eq!(
            report.entries()[5].output().and_then(|o| o.get("ns")),
            Some(&ProbeValue::from("A.y"))
        );
    }

    #[tokio::test]
    async fn missing_collection_list_skips_collection_stats() {
        let report = collect(
            two_by_two().failing("collections:A"),
            CollectOptions::default(),
        )
        .await;

        let a_coll_stats = commands(&report)
            .iter()
            .filter(|c| c.starts_with("db.getSiblingDB('A').getCollection("))
            .count();
        assert_eq!(a_coll_stats, 0);
        // Database stats for A still run, and B is untouched.
        assert_eq!(report.len(), 8);
        assert!(report.entries()[2].is_error());
        assert!(report.entries()[3].output().is_some());
    }

    #[tokio::test]
    async fn failed_database_list_stops_the_run() {
        let report = collect(two_by_two().failing("databases"), CollectOptions::default()).await;

        assert_eq!(report.len(), 2);
        assert!(report.entries()[0].output().is_some());
        assert!(report.entries()[1].is_error());
    }

    #[tokio::test]
    async fn run_identity_is_shared() {
        let report = collect(two_by_two(), CollectOptions::default()).await;
        let first = &report.entries()[0].identity;
        for entry in report.entries() {
            assert_eq!(entry.identity.host, "fake:27017");
            assert_eq!(entry.identity.run_id, first.run_id);
            assert_eq!(entry.identity.tool_version, first.tool_version);
        }
    }

    #[tokio::test]
    async fn secondary_enables_reads_before_listing() {
        let source = FakeSource {
            state: "SECONDARY",
            ..two_by_two()
        };
        let calls = Arc::clone(&source.calls);
        let report = collect(source, CollectOptions::default()).await;

        let calls = calls.lock().unwrap();
        assert_eq!(&calls[..3], ["topology", "secondary_reads", "databases"]);
        // The adjustment itself is not a report entry.
        assert_eq!(report.len(), 10);
    }

    #[tokio::test]
    async fn topology_failure_is_recorded_and_run_continues() {
        let report = collect(two_by_two().failing("topology"), CollectOptions::default()).await;

        assert!(report.entries()[0].is_error());
        assert_eq!(report.len(), 10);
    }

    #[tokio::test]
    async fn routing_tier_adds_captured_sharding_summary() {
        let source = FakeSource {
            state: "mongos",
            ..two_by_two()
        };
        let report = collect(source, CollectOptions::default()).await;

        let summary = &report.entries()[1];
        assert_eq!(summary.subsection.as_deref(), Some("sharding_summary"));
        let output = summary.output().unwrap();
        assert_eq!(
            output.get("capturedLines"),
            Some(&ProbeValue::from(vec!["shard01 rs01/host1:27018"]))
        );
        assert_eq!(report.len(), 11);
    }

    #[tokio::test]
    async fn security_section_follows_data_section() {
        let options = CollectOptions {
            include_security: true,
            ..Default::default()
        };
        let report = collect(two_by_two().failing("users:B"), options).await;

        assert_eq!(report.len(), 14);
        let security: Vec<_> = report.entries()[10..].iter().collect();
        assert!(security.iter().all(|e| e.section == SECTION_SECURITY));
        assert_eq!(security[0].command, "db.getSiblingDB('A').getUsers()");
        assert!(security[2].is_error());
        assert!(security[3].output().is_some());
    }

    #[tokio::test]
    async fn security_section_skipped_when_database_list_fails() {
        let options = CollectOptions {
            include_security: true,
            ..Default::default()
        };
        let source = two_by_two().failing("databases");
        let calls = Arc::clone(&source.calls);
        let report = collect(source, options).await;

        assert_eq!(report.len(), 2);
        assert!(report.entries()[1].is_error());
        assert!(report.entries().iter().all(|e| e.section != SECTION_SECURITY));
        let calls = calls.lock().unwrap();
        assert!(!calls.iter().any(|c| c.starts_with("users:") || c.starts_with("roles:")));
    }

    #[tokio::test]
    async fn sinks_see_every_entry() {
        let source = two_by_two();
        let identity = RunIdentity::new(source.host(), None);
        let mut collector = Collector::new(source, identity, CollectOptions::default());
        let (sink, mut rx) = ChannelEventSink::new();
        collector.add_event_sink(Arc::new(sink));

        let report = collector.collect().await;

        let mut started = 0;
        let mut recorded = 0;
        let mut finished = None;
        while let Ok(event) = rx.try_recv() {
            match event {
                ReportEvent::ProbeStarted { .. } => started += 1,
                ReportEvent::EntryRecorded { .. } => recorded += 1,
                ReportEvent::Finished { entries, .. } => finished = Some(entries),
            }
        }
        assert_eq!(started, report.len());
        assert_eq!(recorded, report.len());
        assert_eq!(finished, Some(report.len()));
    }
}
