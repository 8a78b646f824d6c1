//! Drains the offline order queue whenever connectivity comes back.

use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::connectivity::{ConnectivityOracle, NetworkState};
use crate::queue::OfflineOrderQueue;

/// Handle to a running reconnect watcher. Dropping it stops the task.
pub struct DrainWatcher {
    stop_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl DrainWatcher {
    /// Unsubscribe and wait for the task to finish. A drain already in
    /// flight completes first.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }
}

impl Drop for DrainWatcher {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Subscribe to `oracle` and drain `queue` on every offline -> online
/// transition, and once at start when the first observed state is online.
///
/// The channel keeps only the latest state, so an offline/online blip
/// during a drain surfaces as a single wake that still reads online. Any
/// wake that reads online therefore drains again.
pub fn spawn_drain_on_reconnect(
async fn watch_loop(
    queue: Arc<OfflineOrderQueue>,
    mut rx: watch::Receiver<NetworkState>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut previous_online: Option<bool> = None;

    loop {
        let online = rx.borrow_and_update().is_online();

        if online {
            match previous_online {
                Some(false) => info!("Network restored; draining offline orders"),
                Some(true) => debug!("connectivity changed while online; draining again"),
                None => {}
            }
            match queue.drain().await {
                Ok(report) if report.attempted > 0 => {
                    info!(
                        synced = report.synced,
                        retained = report.retained,
                        "reconnect drain finished"
                    );
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "reconnect drain failed"),
            }
        } else if previous_online != Some(false) {
            info!("Network offline; deferring order drain");
        }
        previous_online = Some(online);

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    info!("Connectivity stream closed; drain watcher stopping");
                    break;
                }
            }
            _ = &mut stop_rx => break,
        }
    }
}
