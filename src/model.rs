//! Order and menu records as they are persisted locally and sent to the
//! backend. Field names serialize in camelCase to match the backend's
//! documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{OfflineError, Result};

fn default_status() -> String {
    "pending".to_string()
}

fn default_available() -> bool {
    true
}

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub menu_item_id: String,
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub dietary_flags: Vec<String>,
}

/// Business fields of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    pub table_ref: String,
    #[serde(default)]
    pub items: Vec<OrderLine>,
    #[serde(default)]
    pub notes: String,
    pub user_id: String,
    #[serde(default)]
    pub total: f64,
    #[serde(default = "default_status")]
    pub status: String,
    /// Requested creation time. When absent the backend stamps the order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl OrderPayload {
    /// Build a pending order stamped with the current time. The total is
    /// computed from the lines and rounded to cents.
    pub fn new(table_ref: &str, user_id: &str, items: Vec<OrderLine>, notes: &str) -> Self {
        let total = items
            .iter()
            .map(|line| line.price * f64::from(line.quantity))
            .sum::<f64>();

        Self {
            table_ref: table_ref.to_string(),
            items,
            notes: notes.to_string(),
            user_id: user_id.to_string(),
            total: (total * 100.0).round() / 100.0,
            status: default_status(),
            created_at: Some(Utc::now()),
        }
    }

    /// Reject payloads the backend would refuse: a table, a submitting user
    /// and at least one line are required.
    pub fn validate(&self) -> Result<()> {
        if self.table_ref.trim().is_empty() {
            return Err(OfflineError::InvalidOrder("tableRef is required".into()));
        }
        if self.user_id.trim().is_empty() {
            return Err(OfflineError::InvalidOrder("userId is required".into()));
        }
        if self.items.is_empty() {
            return Err(OfflineError::InvalidOrder(
                "Order must contain at least one item".into(),
            ));
        }
        Ok(())
    }
}

/// An order waiting in the offline queue.
///
/// `synced` is always `false` while the entry exists; synced entries are
/// removed rather than flagged. `local_id` is never sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedOrder {
    #[serde(flatten)]
    pub payload: OrderPayload,
    pub local_id: String,
    #[serde(default)]
    pub synced: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_order: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub description: String,
    /// Category id.
    #[serde(default, alias = "categoryId")]
    pub category: String,
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default)]
    pub dietary_flags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Last successfully fetched menu.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuSnapshot {
    pub categories: Vec<Category>,
    pub items: Vec<MenuItem>,
}

impl MenuSnapshot {
    pub fn into_loaded(self, source: MenuSource) -> LoadedMenu {
        LoadedMenu {
            categories: self.categories,
            items: self.items,
            source,
        }
    }
}

/// Where a loaded menu came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuSource {
    /// Fetched from the backend just now.
    Online,
    /// Served from the last successful fetch.
    Offline,
    /// Offline with nothing cached.
    Empty,
}

impl MenuSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MenuSource::Online => "online",
            MenuSource::Offline => "offline",
            MenuSource::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedMenu {
    pub categories: Vec<Category>,
    pub items: Vec<MenuItem>,
    pub source: MenuSource,
}

impl LoadedMenu {
    pub fn empty() -> Self {
        MenuSnapshot::default().into_loaded(MenuSource::Empty)
    }
}
