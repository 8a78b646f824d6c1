use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use pos_offline::{
    config::Config, db, logging, HealthProbe, HttpGateway, MenuSource, OfflineService,
    SqliteStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    let _log_guard = logging::init_logging(&config.log_dir)
        .map_err(|e| anyhow::anyhow!("failed to install logger: {e}"))?;

    info!("Starting pos-offline-syncd v{}", env!("CARGO_PKG_VERSION"));

    let db = db::init(&config.data_dir).context("failed to open offline database")?;
    info!(path = %db.db_path.display(), "offline store ready");
    let store = Arc::new(SqliteStore::new(Arc::new(db)));
    let gateway = Arc::new(HttpGateway::new(&config.api_url, &config.api_key)?);
    let probe = Arc::new(HealthProbe::new(&config.api_url, &config.api_key)?);
    let probe_task = probe.clone().spawn(config.probe_interval);

    let service = OfflineService::new(store, gateway.clone(), gateway, probe);

    match service.load_menu_with_offline_support().await {
        Ok(menu) if menu.source == MenuSource::Empty => {
            warn!("offline with no cached menu; waiting for connectivity");
        }
        Ok(menu) => info!(
            source = menu.source.as_str(),
            categories = menu.categories.len(),
            items = menu.items.len(),
            "menu ready"
        ),
        Err(e) => warn!(error = %e, "initial menu load failed"),
    }

    match service.pending_offline_orders().await {
        Ok(pending) if !pending.is_empty() => {
            info!(pending = pending.len(), "offline orders awaiting sync");
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "failed to read offline queue"),
    }

    let watcher = service.watch_connectivity();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown requested");

    watcher.stop().await;
    probe_task.abort();
    Ok(())
}
