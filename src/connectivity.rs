//! Connectivity oracle: current network reachability on demand, plus a
//! change stream.
//!
//! Two implementations are provided. [`ManualConnectivity`] is driven by the
//! embedder (an OS network callback, a UI toggle, tests). [`HealthProbe`]
//! polls the backend's health endpoint and publishes changes itself.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::{OfflineError, Result};
use crate::gateway::normalize_base_url;

/// Timeout used for the lightweight health probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Reported network state.
///
/// `is_internet_reachable` is `None` while reachability is still unknown
/// (the interface is up but nothing has been probed yet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkState {
    pub is_connected: bool,
    pub is_internet_reachable: Option<bool>,
}

impl NetworkState {
    pub const OFFLINE: NetworkState = NetworkState {
        is_connected: false,
        is_internet_reachable: Some(false),
    };

    pub const ONLINE: NetworkState = NetworkState {
        is_connected: true,
        is_internet_reachable: Some(true),
    };

    /// Connected, and not known to be unreachable. An unknown reachability
    /// counts as online.
    pub fn is_online(&self) -> bool {
        self.is_connected && self.is_internet_reachable != Some(false)
    }
}

/// Source of network reachability.
///
/// Dropping the receiver returned by `subscribe` unsubscribes.
#[async_trait]
pub trait ConnectivityOracle: Send + Sync {
    async fn fetch(&self) -> NetworkState;
    fn subscribe(&self) -> watch::Receiver<NetworkState>;
}

/// Oracle fed by the embedder.
pub struct ManualConnectivity {
    tx: watch::Sender<NetworkState>,
}

impl ManualConnectivity {
    pub fn new(initial: NetworkState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Publish a new state. Subscribers are only woken when it differs
    /// from the current one.
    pub fn set(&self, state: NetworkState) {
        publish(&self.tx, state);
    }

    pub fn set_online(&self, online: bool) {
        self.set(if online {
            NetworkState::ONLINE
        } else {
            NetworkState::OFFLINE
        });
    }
}

#[async_trait]
impl ConnectivityOracle for ManualConnectivity {
    async fn fetch(&self) -> NetworkState {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<NetworkState> {
        self.tx.subscribe()
    }
}

fn publish(tx: &watch::Sender<NetworkState>, state: NetworkState) -> bool {
    tx.send_if_modified(|current| {
        if *current == state {
            false
        } else {
            *current = state;
            true
        }
    })
}

/// Oracle that probes `HEAD {base}/api/health`.
///
/// `fetch` probes live; [`HealthProbe::spawn`] keeps probing in the
/// background so subscribers see transitions.
pub struct HealthProbe {
    client: Client,
    health_url: String,
    api_key: String,
    tx: watch::Sender<NetworkState>,
}

impl HealthProbe {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(|e| OfflineError::Config(format!("Failed to create HTTP client: {e}")))?;
        let health_url = format!("{}/api/health", normalize_base_url(base_url));
        let (tx, _rx) = watch::channel(NetworkState {
            is_connected: false,
            is_internet_reachable: None,
        });

        Ok(Self {
            client,
            health_url,
            api_key: api_key.to_string(),
            tx,
        })
    }

    async fn probe(&self) -> NetworkState {
        match self
            .client
            .head(&self.health_url)
            .header("X-POS-API-Key", &self.api_key)
            .send()
            .await
        {
            Ok(resp) => NetworkState {
                is_connected: true,
                is_internet_reachable: Some(resp.status().is_success()),
            },
            Err(e) => {
                trace!(url = %self.health_url, error = %e, "health probe failed");
                NetworkState::OFFLINE
            }
        }
    }

    /// Probe every `interval` and publish changes. Abort the returned
    /// handle to stop.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            debug!(interval_secs = interval.as_secs(), "health probe started");
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let state = self.probe().await;
                if publish(&self.tx, state) {
                    debug!(online = state.is_online(), "connectivity changed");
                }
            }
        })
    }
}

#[async_trait]
impl ConnectivityOracle for HealthProbe {
    async fn fetch(&self) -> NetworkState {
        let state = self.probe().await;
        publish(&self.tx, state);
        state
    }

    fn subscribe(&self) -> watch::Receiver<NetworkState> {
        self.tx.subscribe()
    }
}
