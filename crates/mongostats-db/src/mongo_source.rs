use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{ClientOptions, DatabaseOptions, ReadPreference, SelectionCriteria};
use mongodb::{Client, Database};

use mongostats_core::error::{ProbeResult, StatsError, StatsResult};
use mongostats_core::probe::OutputSink;
use mongostats_core::source::StatsSource;
use mongostats_core::topology::TopologyClassification;
use mongostats_core::value::ProbeValue;

use crate::catalog::{select_catalog, ServerVersion, UserCatalog};
use crate::convert::{bson_to_value, document_to_value, probe_error};
use crate::mongo_config::MongoTargetConfig;
use crate::topology;

/// [`StatsSource`] backed by a live MongoDB deployment.
pub struct MongoSource {
    client: Client,
    host: String,
    selection_criteria: Option<SelectionCriteria>,
    catalog: Box<dyn UserCatalog>,
}

impl MongoSource {
    /// Connect, verify the server answers, and negotiate the user catalog
    /// from its version.
    pub async fn connect(config: &MongoTargetConfig) -> StatsResult<Self> {
        let mut options = ClientOptions::parse(&config.connection_url)
            .await
            .map_err(|e| {
                StatsError::Connection(anyhow::anyhow!("Invalid MongoDB connection string: {e}"))
            })?;
        options.app_name = Some("mongostats".into());
        options.connect_timeout = Some(config.connect_timeout);
        options.server_selection_timeout = Some(config.connect_timeout);

        let host = options
            .hosts
            .first()
            .map(ToString::to_string)
            .unwrap_or_else(|| "unknown".to_string());

        let client = Client::with_options(options).map_err(|e| {
            StatsError::Connection(anyhow::anyhow!("MongoDB connection failed: {e}"))
        })?;

        let build_info = client
            .database("admin")
            .run_command(doc! { "buildInfo": 1 })
            .await
            .map_err(|e| StatsError::Connection(anyhow::anyhow!("MongoDB ping failed: {e}")))?;

        let version = ServerVersion::from_build_info(&build_info);
        let catalog = select_catalog(version);
        tracing::info!(
            %host,
            version = build_info.get_str("version").unwrap_or("unknown"),
            catalog = catalog.name(),
            "Connected to MongoDB"
        );

        Ok(Self {
            client,
            host,
            selection_criteria: None,
            catalog,
        })
    }

    fn database(&self, name: &str) -> Database {
        let options = DatabaseOptions::builder()
            .selection_criteria(self.selection_criteria.clone())
            .build();
        self.client.database_with_options(name, options)
    }

    async fn command(&self, database: &str, command: Document) -> ProbeResult<Document> {
        let db = self.database(database);
        let action = db.run_command(command);
        let action = match &self.selection_criteria {
            Some(criteria) => action.selection_criteria(criteria.clone()),
            None => action,
        };
        action.await.map_err(|e| probe_error(&e))
    }

    async fn find_all(&self, database: &str, collection: &str) -> ProbeResult<Vec<Document>> {
        self.database(database)
            .collection::<Document>(collection)
            .find(doc! {})
            .await
            .map_err(|e| probe_error(&e))?
            .try_collect()
            .await
            .map_err(|e| probe_error(&e))
    }
}

fn describe_shard(shard: &Document) -> String {
    format!(
        "\t{{  \"_id\" : \"{}\",  \"host\" : \"{}\" }}",
        shard.get_str("_id").unwrap_or("?"),
        shard.get_str("host").unwrap_or("?")
    )
}

fn describe_database(db: &Document) -> String {
    format!(
        "\t{{  \"_id\" : \"{}\",  \"primary\" : \"{}\",  \"partitioned\" : {} }}",
        db.get_str("_id").unwrap_or("?"),
        db.get_str("primary").unwrap_or("?"),
        db.get_bool("partitioned").unwrap_or(false)
    )
}

#[async_trait]
impl StatsSource for MongoSource {
    fn host(&self) -> String {
        self.host.clone()
    }

    async fn classify_topology(&self) -> ProbeResult<TopologyClassification> {
        topology::classify(&self.client).await
    }

    async fn allow_secondary_reads(&mut self) -> ProbeResult<()> {
        self.selection_criteria = Some(SelectionCriteria::ReadPreference(
            ReadPreference::SecondaryPreferred {
                options: Default::default(),
            },
        ));
        Ok(())
    }

    async fn list_databases(&self) -> ProbeResult<ProbeValue> {
        self.command("admin", doc! { "listDatabases": 1 })
            .await
            .map(document_to_value)
    }

    async fn list_collection_names(&self, database: &str) -> ProbeResult<Vec<String>> {
        let mut names = self
            .database(database)
            .list_collection_names()
            .await
            .map_err(|e| probe_error(&e))?;
        names.sort();
        Ok(names)
    }

    async fn database_stats(&self, database: &str, scale: i64) -> ProbeResult<ProbeValue> {
        self.command(database, doc! { "dbStats": 1, "scale": scale })
            .await
            .map(document_to_value)
    }

    async fn collection_stats(
        &self,
        database: &str,
        collection: &str,
        scale: i64,
    ) -> ProbeResult<ProbeValue> {
        self.command(database, doc! { "collStats": collection, "scale": scale })
            .await
            .map(document_to_value)
    }

    async fn sharding_summary(&self, sink: OutputSink) -> ProbeResult<ProbeValue> {
        let mut reply = self.command("admin", doc! { "listShards": 1 }).await?;
        let shards = match reply.remove("shards") {
            Some(Bson::Array(items)) => items,
            _ => Vec::new(),
        };

        sink.print("--- Sharding Status ---");
        sink.print("  shards:");
        for shard in shards.iter().filter_map(Bson::as_document) {
            sink.print(describe_shard(shard));
        }

        let databases = self.find_all("config", "databases").await?;
        sink.print("  databases:");
        for db in &databases {
            sink.print(describe_database(db));
        }

        Ok(ProbeValue::document([
            ("shards", bson_to_value(Bson::Array(shards))),
            (
                "databases",
                ProbeValue::Array(databases.into_iter().map(document_to_value).collect()),
            ),
        ]))
    }

    async fn list_users(&self, database: &str) -> ProbeResult<ProbeValue> {
        self.catalog.list_users(&self.database(database)).await
    }

    async fn list_roles(&self, database: &str) -> ProbeResult<ProbeValue> {
        self.catalog.list_roles(&self.database(database)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_lines_name_id_and_host() {
        let shard = doc! { "_id": "shard01", "host": "rs01/h1:27018,h2:27018", "state": 1 };
        assert_eq!(
            describe_shard(&shard),
            "\t{  \"_id\" : \"shard01\",  \"host\" : \"rs01/h1:27018,h2:27018\" }"
        );
    }

    #[test]
    fn database_lines_default_partitioned() {
        let db = doc! { "_id": "app", "primary": "shard01" };
        assert!(describe_database(&db).ends_with("\"partitioned\" : false }"));
    }
}
