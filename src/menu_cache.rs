//! Offline menu cache.
//!
//! Serves the menu from the backend when online and keeps the last
//! successful fetch under a single store key for offline use. A failed
//! fetch never touches the cached snapshot.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::connectivity::ConnectivityOracle;
use crate::error::{OfflineError, Result};
use crate::gateway::MenuGateway;
use crate::model::{LoadedMenu, MenuSnapshot, MenuSource};
use crate::storage::KeyValueStore;

const CACHE_KEY: &str = "OFFLINE_MENU_CACHE";

pub struct OfflineMenuCache {
    store: Arc<dyn KeyValueStore>,
    gateway: Arc<dyn MenuGateway>,
    connectivity: Arc<dyn ConnectivityOracle>,
    write_lock: Mutex<()>,
}

impl OfflineMenuCache {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        gateway: Arc<dyn MenuGateway>,
        connectivity: Arc<dyn ConnectivityOracle>,
    ) -> Self {
        Self {
            store,
            gateway,
            connectivity,
            write_lock: Mutex::new(()),
        }
    }

    /// Last successfully fetched snapshot, if any. Does not consult the
    /// network.
    pub async fn cached(&self) -> Result<Option<MenuSnapshot>> {
        match self.store.get(CACHE_KEY).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn persist(&self, snapshot: &MenuSnapshot) -> Result<()> {
        let raw = serde_json::to_string(snapshot)?;
        let _guard = self.write_lock.lock().await;
        self.store.set(CACHE_KEY, &raw).await
    }

    /// Load the menu.
    ///
    /// Online: fetch categories and items concurrently, overwrite the cache
    /// and return `online`. A fetch failure while online is returned as
    /// [`OfflineError::RemoteFetch`]; it does not fall back to the cache.
    /// Offline: return the cached snapshot as `offline`, or an empty menu as
    /// `empty` when nothing was ever cached.
    pub async fn load(&self) -> Result<LoadedMenu> {
        let network = self.connectivity.fetch().await;

        if network.is_online() {
            let (categories, items) =
                tokio::try_join!(self.gateway.list_categories(), self.gateway.list_items())
                    .map_err(|e| {
                        warn!(error = %e, "menu fetch failed while online");
                        OfflineError::RemoteFetch(e)
                    })?;

            let snapshot = MenuSnapshot { categories, items };
            self.persist(&snapshot).await?;
            info!(
                categories = snapshot.categories.len(),
                items = snapshot.items.len(),
                "menu cache updated"
            );
            return Ok(snapshot.into_loaded(MenuSource::Online));
        }

        match self.cached().await? {
            Some(snapshot) => {
                debug!(
                    categories = snapshot.categories.len(),
                    items = snapshot.items.len(),
                    "offline: serving cached menu"
                );
                Ok(snapshot.into_loaded(MenuSource::Offline))
            }
            None => {
                debug!("offline with no cached menu");
                Ok(LoadedMenu::empty())
            }
        }
    }
}
