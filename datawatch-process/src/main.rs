//! Scheduled monitor processing runner.
//!
//! One invocation runs one processing pass per selected monitor: evaluate,
//! deduplicate, persist alerts, notify, stamp `last_run`. Scheduling is
//! external: point a cron entry or task runner at this binary.
//!
//! ```text
//! datawatch-process                          # process every monitor once
//! datawatch-process --monitor-id <uuid>      # process a single monitor
//! ```

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use uuid::Uuid;

use datawatch_core::notify::NotificationTransport;
use datawatch_core::stores::mongo::MongoBackend;
use datawatch_core::stores::{
    AlertStore, DatasetStore, IntegrationStore, MonitorQuery, MonitorStore, RowStore,
};
use datawatch_core::{
    IntegrationService, Monitor, MonitorProcessor, SlackTransport, StoreConfig, init_logging,
};

#[derive(Parser)]
#[command(name = "datawatch-process")]
#[command(about = "Run monitor processing passes against the document store")]
#[command(version)]
struct Cli {
    /// Document store connection URL (credentials are sanitized in logs)
    #[arg(long, env = "DATAWATCH_MONGO_URL", default_value = "mongodb://localhost:27017")]
    mongo_url: String,

    /// Database name
    #[arg(long, env = "DATAWATCH_DATABASE", default_value = "datawatch")]
    database: String,

    /// Process only this monitor instead of all monitors
    #[arg(long)]
    monitor_id: Option<Uuid>,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet).context("failed to initialize logging")?;

    let config = StoreConfig::new(cli.mongo_url, cli.database);
    let backend = Arc::new(
        MongoBackend::connect(&config)
            .await
            .with_context(|| format!("failed to connect to {}", config.redacted_url()))?,
    );

    let monitors = select_monitors(&backend, cli.monitor_id).await?;
    if monitors.is_empty() {
        info!("No monitors to process");
        return Ok(());
    }
    info!("Processing {} monitor(s)", monitors.len());

    let integrations = Arc::new(IntegrationService::new(
        Arc::clone(&backend) as Arc<dyn IntegrationStore>,
        Arc::new(SlackTransport::new()) as Arc<dyn NotificationTransport>,
    ));

    let mut failed = 0usize;
    for monitor in monitors {
        let monitor_id = monitor.monitor_id;
        let processor = MonitorProcessor::new(
            monitor,
            Arc::clone(&backend) as Arc<dyn DatasetStore>,
            Arc::clone(&backend) as Arc<dyn AlertStore>,
            Arc::clone(&backend) as Arc<dyn MonitorStore>,
            Arc::clone(&backend) as Arc<dyn RowStore>,
            Arc::clone(&integrations),
        );

        // Passes are independent; one failed monitor must not starve the rest.
        match processor.process().await {
            Ok(violations) => {
                info!(
                    "Monitor [{}] processed: {} violation(s)",
                    monitor_id,
                    violations.len()
                );
            }
            Err(e) => {
                failed += 1;
                error!("Monitor [{}] failed: {}", monitor_id, e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} monitor pass(es) failed");
    }
    Ok(())
}

async fn select_monitors(
    backend: &Arc<MongoBackend>,
    monitor_id: Option<Uuid>,
) -> anyhow::Result<Vec<Monitor>> {
    let monitors = match monitor_id {
        Some(monitor_id) => vec![
            backend
                .get_monitor(monitor_id)
                .await
                .context("failed to load monitor")?,
        ],
        None => backend
            .find_monitors(&MonitorQuery::default())
            .await
            .context("failed to list monitors")?,
    };
    Ok(monitors)
}
