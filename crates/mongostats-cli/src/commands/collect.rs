use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use mongostats_core::collector::Collector;
use mongostats_core::config::CollectorConfig;
use mongostats_core::error::StatsResult;
use mongostats_core::event::TracingEventSink;
use mongostats_core::render::banner;
use mongostats_core::report::RunIdentity;
use mongostats_core::source::StatsSource;
use mongostats_core::TOOL_VERSION;
use mongostats_db::mongo_config::MongoTargetConfig;
use mongostats_db::mongo_source::MongoSource;

use crate::console::ConsoleEventSink;

#[derive(Args, Default)]
pub struct CollectArgs {
    /// YAML config file; the flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// MongoDB connection string
    #[arg(long, env = "MONGOSTATS_URI")]
    pub uri: Option<String>,
    /// Print the report as one JSON array instead of console text
    #[arg(long)]
    pub json: bool,
    /// Correlation label copied into every report entry
    #[arg(long = "ref")]
    pub reference: Option<String>,
    /// Also list users and roles for every database
    #[arg(long)]
    pub include_security: bool,
    /// Scale factor for database and collection stats
    #[arg(long)]
    pub scale: Option<i64>,
}

impl CollectArgs {
    /// Config file (or defaults), overridden by command-line flags.
    pub fn resolve(&self) -> StatsResult<CollectorConfig> {
        let mut config = match &self.config {
            Some(path) => CollectorConfig::from_file(path)?,
            None => CollectorConfig::default(),
        };
        if let Some(uri) = &self.uri {
            config.connection_url = uri.clone();
        }
        if let Some(reference) = &self.reference {
            config.reference = Some(reference.clone());
        }
        if let Some(scale) = self.scale {
            config.scale = scale;
        }
        config.json |= self.json;
        config.include_security |= self.include_security;
        config.validate()?;
        Ok(config)
    }
}

pub async fn execute(args: CollectArgs) -> anyhow::Result<()> {
    let config = args.resolve()?;

    let source = MongoSource::connect(&MongoTargetConfig::from(&config)).await?;
    let identity = RunIdentity::new(source.host(), config.reference.clone());
    tracing::info!(
        run_id = %identity.run_id,
        json = config.json,
        include_security = config.include_security,
        "Collecting report"
    );

    let mut collector = Collector::new(source, identity, config.collect_options());
    collector.add_event_sink(Arc::new(TracingEventSink));

    if config.json {
        let report = collector.collect().await;
        println!("{}", report.to_json_string()?);
    } else {
        println!("{}", banner(TOOL_VERSION));
        collector.add_event_sink(Arc::new(ConsoleEventSink));
        collector.collect().await;
    }

    Ok(())
}
