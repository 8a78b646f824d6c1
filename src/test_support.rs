//! In-process fakes for the store, gateways and oracle.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::error::{GatewayError, OfflineError, Result};
use crate::model::{Category, MenuItem, OrderLine, OrderPayload};
use crate::storage::{KeyValueStore, MemoryStore};

pub fn sample_order(table_ref: &str) -> OrderPayload {
    OrderPayload::new(
        table_ref,
        "staff-1",
        vec![OrderLine {
            menu_item_id: "margherita".into(),
            name: "Margherita".into(),
            price: 9.5,
            quantity: 2,
            notes: String::new(),
            dietary_flags: vec!["vegetarian".into()],
        }],
        "",
    )
}

pub fn category(id: &str, display_order: i64) -> Category {
    Category {
        id: id.into(),
        name: id.to_uppercase(),
        display_order,
    }
}

pub fn menu_item(id: &str, category: &str) -> MenuItem {
    MenuItem {
        id: id.into(),
        name: id.to_uppercase(),
        price: 4.0,
        description: String::new(),
        category: category.into(),
        available: true,
        dietary_flags: vec![],
        image_url: None,
    }
}

/// Poll `condition` until it holds or a second has passed.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// Memory store that counts writes.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    writes: AtomicUsize,
}

impl RecordingStore {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for RecordingStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value).await
    }
}

/// Store whose every access fails.
pub struct FailingStore;

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(OfflineError::Storage("disk unavailable".into()))
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(OfflineError::Storage("disk unavailable".into()))
    }
}

// ---------------------------------------------------------------------------
// Gateways
// ---------------------------------------------------------------------------

/// Order gateway that records every attempt and fails for chosen tables.
#[derive(Default)]
pub struct FakeOrderGateway {
    attempts: Mutex<Vec<OrderPayload>>,
    accepted: Mutex<Vec<OrderPayload>>,
    failing_tables: Mutex<HashSet<String>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeOrderGateway {
    /// Every `create` waits for a permit on the returned semaphore after
    /// recording its attempt.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let gateway = Self {
            gate: Some(gate.clone()),
            ..Self::default()
        };
        (gateway, gate)
    }

    pub fn fail_for(&self, table_ref: &str) {
        self.failing_tables
            .lock()
            .unwrap()
            .insert(table_ref.to_string());
    }

    pub fn recover(&self, table_ref: &str) {
        self.failing_tables.lock().unwrap().remove(table_ref);
    }

    pub fn attempted_tables(&self) -> Vec<String> {
        let attempts = self.attempts.lock().unwrap();
        attempts.iter().map(|o| o.table_ref.clone()).collect()
    }

    pub fn accepted_tables(&self) -> Vec<String> {
        let accepted = self.accepted.lock().unwrap();
        accepted.iter().map(|o| o.table_ref.clone()).collect()
    }

    pub fn accepted(&self) -> Vec<OrderPayload> {
        self.accepted.lock().unwrap().clone()
    }
}

#[async_trait]
impl crate::gateway::OrderGateway for FakeOrderGateway {
    async fn create(&self, order: &OrderPayload) -> Result<String, GatewayError> {
        self.attempts.lock().unwrap().push(order.clone());

        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| GatewayError::Transient(e.to_string()))?;
            permit.forget();
        }

        if self.failing_tables.lock().unwrap().contains(&order.table_ref) {
            return Err(GatewayError::Transient(format!(
                "Backend server error (HTTP 503) for {}",
                order.table_ref
            )));
        }

        let mut accepted = self.accepted.lock().unwrap();
        accepted.push(order.clone());
        Ok(format!("Order{}", accepted.len()))
    }
}

/// Menu gateway serving a fixed menu, or failing on demand.
#[derive(Default)]
pub struct FakeMenuGateway {
    categories: Mutex<Vec<Category>>,
    items: Mutex<Vec<MenuItem>>,
    fail_items: Mutex<bool>,
    calls: AtomicUsize,
}

impl FakeMenuGateway {
    pub fn serving(categories: Vec<Category>, items: Vec<MenuItem>) -> Self {
        Self {
            categories: Mutex::new(categories),
            items: Mutex::new(items),
            ..Self::default()
        }
    }

    pub fn set_fail_items(&self, fail: bool) {
        *self.fail_items.lock().unwrap() = fail;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl crate::gateway::MenuGateway for FakeMenuGateway {
    async fn list_categories(&self) -> Result<Vec<Category>, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.categories.lock().unwrap().clone())
    }

    async fn list_items(&self) -> Result<Vec<MenuItem>, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_items.lock().unwrap() {
            return Err(GatewayError::Transient(
                "Backend server error (HTTP 500)".into(),
            ));
        }
        Ok(self.items.lock().unwrap().clone())
    }
}
