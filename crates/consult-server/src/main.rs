mod config;
mod scheduler;

use std::sync::Arc;

use tracing::{debug, info, warn};

use consult_adapters::cache::{CachedDirectory, CachedPolicies};
use consult_adapters::events::BroadcastPublisher;
use consult_adapters::notify::LogNotifier;
use consult_adapters::persistence::sqlite::SqliteDb;
use consult_app::sweep::EscalationSweep;

use crate::config::ServerConfig;
use crate::scheduler::SweepScheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    info!(
        database = %config.database_url,
        interval_secs = config.sweep_interval.as_secs(),
        max_level = config.max_escalation_level,
        "starting consult escalation daemon"
    );

    let db = SqliteDb::new(&config.database_url).await?;

    let directory = CachedDirectory::new(db.clone(), config.cache_ttl);
    let policies = CachedPolicies::new(db.clone(), config.cache_ttl);
    let events = BroadcastPublisher::new(256);

    let mut audit = events.subscribe();
    tokio::spawn(async move {
        loop {
            match audit.recv().await {
                Ok(event) => debug!(?event, "domain event"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event log lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let sweep = EscalationSweep::new(
        db,
        directory,
        policies,
        events,
        LogNotifier,
        config.sweep_config(),
    );
    let scheduler = Arc::new(SweepScheduler::new(sweep));

    let on_signal = scheduler.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            on_signal.shutdown();
        }
    });

    scheduler.run(config.sweep_interval).await;
    info!("consult escalation daemon stopped");
    Ok(())
}
