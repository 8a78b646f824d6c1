//! Offline order queue: a write-behind durable buffer of orders that could
//! not be sent, drained to the remote gateway once the network is back.
//!
//! The queue lives under a single store key as a JSON array and is always
//! rewritten whole, so a crash mid-write leaves either the old or the new
//! array. All read-modify-write cycles on that key go through `write_lock`;
//! drain passes are additionally serialized by `drain_lock` so the same
//! entry is never submitted by two passes at once.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::connectivity::ConnectivityOracle;
use crate::error::Result;
use crate::gateway::OrderGateway;
use crate::model::{OrderPayload, QueuedOrder};
use crate::storage::KeyValueStore;

const QUEUE_KEY: &str = "OFFLINE_ORDER_QUEUE";

/// What happens to an entry whose submission failed during a drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Keep it and retry on every later drain, with no attempt limit and no
    /// backoff.
    Indefinite,
}

impl RetryPolicy {
    pub fn retains_failed(&self) -> bool {
        match self {
            RetryPolicy::Indefinite => true,
        }
    }
}

pub const RETRY_POLICY: RetryPolicy = RetryPolicy::Indefinite;

static LOCAL_ID_SEQ: AtomicU64 = AtomicU64::new(0);

/// `{unix_millis}-{seq}-{random}`. The process-wide sequence keeps ids
/// distinct within a millisecond; the random suffix keeps them distinct
/// across restarts.
fn next_local_id() -> String {
    let seq = LOCAL_ID_SEQ.fetch_add(1, Ordering::Relaxed);
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{:04}-{}",
        Utc::now().timestamp_millis(),
        seq % 10_000,
        &random[..8]
    )
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    /// Skipped because the oracle reported no connectivity.
    pub offline: bool,
    pub attempted: usize,
    pub synced: usize,
    pub retained: usize,
}

pub struct OfflineOrderQueue {
    store: Arc<dyn KeyValueStore>,
    gateway: Arc<dyn OrderGateway>,
    connectivity: Arc<dyn ConnectivityOracle>,
    write_lock: Mutex<()>,
    drain_lock: Mutex<()>,
}

impl OfflineOrderQueue {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        gateway: Arc<dyn OrderGateway>,
        connectivity: Arc<dyn ConnectivityOracle>,
    ) -> Self {
        Self {
            store,
            gateway,
            connectivity,
            write_lock: Mutex::new(()),
            drain_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Option<Vec<QueuedOrder>>> {
        match self.store.get(QUEUE_KEY).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn persist(&self, queue: &[QueuedOrder]) -> Result<()> {
        let raw = serde_json::to_string(queue)?;
        self.store.set(QUEUE_KEY, &raw).await
    }

    /// Append `order` to the persisted queue and return its local id.
    /// Never contacts the remote gateway.
    pub async fn enqueue(&self, order: OrderPayload) -> Result<String> {
        let _guard = self.write_lock.lock().await;

        let mut queue = self.load().await?.unwrap_or_default();
        let local_id = next_local_id();
        queue.push(QueuedOrder {
            payload: order,
            local_id: local_id.clone(),
            synced: false,
        });
        self.persist(&queue).await?;

        info!(local_id = %local_id, queued = queue.len(), "order queued offline");
        Ok(local_id)
    }

    /// Entries still waiting to sync, oldest first.
    pub async fn pending(&self) -> Result<Vec<QueuedOrder>> {
        Ok(self.load().await?.unwrap_or_default())
    }

    /// Drop the entry with `local_id`. Returns whether one was removed.
    pub async fn remove(&self, local_id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let Some(mut queue) = self.load().await? else {
            return Ok(false);
        };
        let before = queue.len();
        queue.retain(|entry| entry.local_id != local_id);
        if queue.len() == before {
            return Ok(false);
        }
        self.persist(&queue).await?;

        info!(local_id = %local_id, "queued order removed manually");
        Ok(true)
    }

    /// Submit every queued entry in enqueue order and keep the ones that
    /// fail. A no-op while offline or when the queue is empty.
    ///
    /// Submissions run without holding the write lock, so orders enqueued
    /// during a pass are kept and picked up by the next one. The surviving
    /// queue is written once, after the pass.
    pub async fn drain(&self) -> Result<DrainReport> {
        let network = self.connectivity.fetch().await;
        if !network.is_online() {
            debug!("drain skipped: offline");
            return Ok(DrainReport {
                offline: true,
                ..DrainReport::default()
            });
        }

        let _pass = self.drain_lock.lock().await;

        let snapshot = {
            let _guard = self.write_lock.lock().await;
            self.load().await?.unwrap_or_default()
        };
        if snapshot.is_empty() {
            return Ok(DrainReport::default());
        }

        let mut report = DrainReport {
            attempted: snapshot.len(),
            ..DrainReport::default()
        };
        // Entries that leave the queue after this pass.
        let mut done = HashSet::new();

        for entry in &snapshot {
            match self.gateway.create(&entry.payload).await {
                Ok(order_id) => {
                    info!(
                        local_id = %entry.local_id,
                        order_id = %order_id,
                        "offline order synced"
                    );
                    report.synced += 1;
                    done.insert(entry.local_id.clone());
                }
                Err(e) => {
                    warn!(
                        local_id = %entry.local_id,
                        transient = e.is_transient(),
                        error = %e,
                        "Sync failed, keeping order"
                    );
                    if !RETRY_POLICY.retains_failed() {
                        done.insert(entry.local_id.clone());
                    }
                }
            }
        }
        report.retained = snapshot.len() - done.len();

        if !done.is_empty() {
            let _guard = self.write_lock.lock().await;
            let mut queue = self.load().await?.unwrap_or_default();
            queue.retain(|entry| !done.contains(&entry.local_id));
            self.persist(&queue).await?;
        }

        info!(
            attempted = report.attempted,
            synced = report.synced,
            retained = report.retained,
            "offline drain pass complete"
        );
        Ok(report)
    }
}
