//! UI-facing entry points for the offline subsystem.

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::connectivity::ConnectivityOracle;
use crate::error::{OfflineError, Result};
use crate::gateway::{MenuGateway, OrderGateway};
use crate::menu_cache::OfflineMenuCache;
use crate::model::{LoadedMenu, OrderPayload, QueuedOrder};
use crate::queue::{DrainReport, OfflineOrderQueue};
use crate::storage::KeyValueStore;
use crate::watcher::{spawn_drain_on_reconnect, DrainWatcher};

/// Result of [`OfflineService::submit_order`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum SubmitOutcome {
    /// Accepted by the backend.
    Sent {
        #[serde(rename = "orderId")]
        order_id: String,
    },
    /// Saved locally; it will sync when the network returns.
    Queued {
        #[serde(rename = "localId")]
        local_id: String,
    },
}

pub struct OfflineService {
    queue: Arc<OfflineOrderQueue>,
    menu: OfflineMenuCache,
    orders: Arc<dyn OrderGateway>,
    connectivity: Arc<dyn ConnectivityOracle>,
}

impl OfflineService {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        orders: Arc<dyn OrderGateway>,
        menus: Arc<dyn MenuGateway>,
        connectivity: Arc<dyn ConnectivityOracle>,
    ) -> Self {
        let queue = Arc::new(OfflineOrderQueue::new(
            store.clone(),
            orders.clone(),
            connectivity.clone(),
        ));
        let menu = OfflineMenuCache::new(store, menus, connectivity.clone());

        Self {
            queue,
            menu,
            orders,
            connectivity,
        }
    }

    pub async fn enqueue_offline_order(&self, order: OrderPayload) -> Result<String> {
        self.queue.enqueue(order).await
    }

    pub async fn drain_offline_orders(&self) -> Result<DrainReport> {
        self.queue.drain().await
    }

    pub async fn load_menu_with_offline_support(&self) -> Result<LoadedMenu> {
        self.menu.load().await
    }

    pub async fn pending_offline_orders(&self) -> Result<Vec<QueuedOrder>> {
        self.queue.pending().await
    }

    pub async fn remove_offline_order(&self, local_id: &str) -> Result<bool> {
        self.queue.remove(local_id).await
    }

    /// Send `order` now when online, otherwise queue it. Being offline is
    /// not an error; a rejection from the backend while online is.
    pub async fn submit_order(&self, order: OrderPayload) -> Result<SubmitOutcome> {
        order.validate()?;

        if self.connectivity.fetch().await.is_online() {
            let order_id = self
                .orders
                .create(&order)
                .await
                .map_err(OfflineError::RemoteSubmit)?;
            info!(order_id = %order_id, table_ref = %order.table_ref, "order sent");
            return Ok(SubmitOutcome::Sent { order_id });
        }

        let local_id = self.queue.enqueue(order).await?;
        Ok(SubmitOutcome::Queued { local_id })
    }

    /// Start draining the queue automatically on reconnect.
    pub fn watch_connectivity(&self) -> DrainWatcher {
        spawn_drain_on_reconnect(self.queue.clone(), self.connectivity.as_ref())
    }
}
