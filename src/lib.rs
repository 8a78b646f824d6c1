//! Offline support for table-service POS terminals.
//!
//! Orders placed while the terminal has no network are kept in a durable
//! FIFO queue and replayed when connectivity returns. The menu is cached
//! after every successful online fetch so it can still be browsed offline.
//! Both live under single keys of a local key-value store.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod menu_cache;
pub mod model;
pub mod queue;
pub mod service;
pub mod storage;
pub mod watcher;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use connectivity::{ConnectivityOracle, HealthProbe, ManualConnectivity, NetworkState};
pub use error::{GatewayError, OfflineError, Result};
pub use gateway::{HttpGateway, MenuGateway, OrderGateway};
pub use menu_cache::OfflineMenuCache;
pub use model::{
    Category, LoadedMenu, MenuItem, MenuSnapshot, MenuSource, OrderLine, OrderPayload,
    QueuedOrder,
};
pub use queue::{DrainReport, OfflineOrderQueue, RetryPolicy, RETRY_POLICY};
pub use service::{OfflineService, SubmitOutcome};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore};
pub use watcher::{spawn_drain_on_reconnect, DrainWatcher};
