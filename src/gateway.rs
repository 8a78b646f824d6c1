//! Remote order and menu gateways.
//!
//! The traits are the seam the queue and the cache talk to. [`HttpGateway`]
//! implements both against the backend's JSON REST API.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{GatewayError, OfflineError, Result};
use crate::model::{Category, MenuItem, OrderPayload};

/// Default timeout for API requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const ORDERS_PATH: &str = "/api/orders";
const CATEGORIES_PATH: &str = "/api/categories";
const MENU_ITEMS_PATH: &str = "/api/menu-items";

/// Accepts complete orders and persists them remotely.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Persist `order` and return the backend's order id.
    async fn create(&self, order: &OrderPayload) -> Result<String, GatewayError>;
}

/// Serves the current full menu.
#[async_trait]
pub trait MenuGateway: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<Category>, GatewayError>;
    async fn list_items(&self) -> Result<Vec<MenuItem>, GatewayError>;
}

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise the backend base URL:
/// - ensure a scheme is present (https, or http for localhost)
/// - strip trailing slashes
/// - strip a trailing `/api` segment
pub fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }

    if url.ends_with("/api") {
        url.truncate(url.len() - 4);
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn classify_request_error(url: &str, err: &reqwest::Error) -> GatewayError {
    if err.is_connect() {
        return GatewayError::Transient(format!("Cannot reach backend at {url}"));
    }
    if err.is_timeout() {
        return GatewayError::Transient(format!("Connection to {url} timed out"));
    }
    if err.is_builder() {
        return GatewayError::Permanent(format!("Invalid backend URL: {url}"));
    }
    GatewayError::Transient(format!("Network error communicating with {url}: {err}"))
}

/// Map a non-success status. Backend overload and server errors are worth
/// retrying; any other client error will fail the same way again.
fn classify_status(status: StatusCode, body: &str) -> GatewayError {
    let code = status.as_u16();
    let message = match code {
        401 => "API key is invalid or expired".to_string(),
        403 => "Terminal not authorized".to_string(),
        404 => "Backend endpoint not found".to_string(),
        429 => "Backend is rate limiting requests".to_string(),
        s if s >= 500 => format!("Backend server error (HTTP {s})"),
        s => format!("Unexpected response from backend (HTTP {s})"),
    };
    let detail = error_detail(body)
        .map(|d| format!("{message}: {d}"))
        .unwrap_or(message);

    if code == 408 || code == 429 || status.is_server_error() {
        GatewayError::Transient(detail)
    } else {
        GatewayError::Permanent(detail)
    }
}

fn error_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(json) => json
            .get("error")
            .or_else(|| json.get("message"))
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .or_else(|| Some(trimmed.to_string())),
        Err(_) => Some(trimmed.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

/// Lists arrive either bare or wrapped as `{ "data": [...] }`.
fn extract_rows(value: Value) -> Result<Vec<Value>, GatewayError> {
    match value {
        Value::Array(rows) => Ok(rows),
        Value::Object(mut obj) => match obj.remove("data") {
            Some(Value::Array(rows)) => Ok(rows),
            _ => Err(GatewayError::Permanent(
                "List response is missing a data array".into(),
            )),
        },
        _ => Err(GatewayError::Permanent(
            "List response is not an array".into(),
        )),
    }
}

fn decode_rows<T: DeserializeOwned>(value: Value, what: &str) -> Result<Vec<T>, GatewayError> {
    extract_rows(value)?
        .into_iter()
        .map(|row| {
            serde_json::from_value(row)
                .map_err(|e| GatewayError::Permanent(format!("Invalid {what} record: {e}")))
        })
        .collect()
}

fn order_id_from_response(value: &Value) -> Option<String> {
    let id = match value {
        Value::String(id) => Some(id.trim().to_string()),
        Value::Object(_) => value
            .get("orderId")
            .or_else(|| value.get("id"))
            .or_else(|| value.get("data").and_then(|d| d.get("orderId")))
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string()),
        _ => None,
    };
    id.filter(|id| !id.is_empty())
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// Authenticated JSON client for the order and menu endpoints.
pub struct HttpGateway {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpGateway {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| OfflineError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: normalize_base_url(base_url),
            api_key: api_key.to_string(),
        })
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&OrderPayload>,
    ) -> Result<Value, GatewayError> {
        let full_url = format!("{}{path}", self.base_url);
        let mut req = self
            .client
            .request(method, &full_url)
            .header("X-POS-API-Key", &self.api_key);
        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| classify_request_error(&self.base_url, &e))?;
        let status = resp.status();
        let body_text = match resp.text().await {
            Ok(text) => text,
            Err(_) if !status.is_success() => return Err(classify_status(status, "")),
            Err(e) => {
                return Err(GatewayError::Transient(format!(
                    "Failed to read response body from {}: {e}",
                    self.base_url
                )))
            }
        };

        if !status.is_success() {
            return Err(classify_status(status, &body_text));
        }
        if body_text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body_text)
            .map_err(|e| GatewayError::Permanent(format!("Invalid JSON from backend: {e}")))
    }
}

#[async_trait]
impl OrderGateway for HttpGateway {
    async fn create(&self, order: &OrderPayload) -> Result<String, GatewayError> {
        order
            .validate()
            .map_err(|e| GatewayError::Permanent(e.to_string()))?;

        let resp = self.request(Method::POST, ORDERS_PATH, Some(order)).await?;
        let order_id = order_id_from_response(&resp).ok_or_else(|| {
            warn!(table_ref = %order.table_ref, "order create response missing id");
            GatewayError::Permanent("Order create response missing order id".into())
        })?;

        debug!(order_id = %order_id, table_ref = %order.table_ref, "order created remotely");
        Ok(order_id)
    }
}

#[async_trait]
impl MenuGateway for HttpGateway {
    async fn list_categories(&self) -> Result<Vec<Category>, GatewayError> {
        let resp = self.request(Method::GET, CATEGORIES_PATH, None).await?;
        let mut categories: Vec<Category> = decode_rows(resp, "category")?;
        categories.sort_by_key(|c| c.display_order);
        Ok(categories)
    }

    async fn list_items(&self) -> Result<Vec<MenuItem>, GatewayError> {
        let resp = self.request(Method::GET, MENU_ITEMS_PATH, None).await?;
        decode_rows(resp, "menu item")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("localhost:3000/"), "http://localhost:3000");
        assert_eq!(
            normalize_base_url(" orders.example.com/api/ "),
            "https://orders.example.com"
        );
        assert_eq!(
            normalize_base_url("https://orders.example.com"),
            "https://orders.example.com"
        );
    }

    #[test]
    fn test_status_classification() {
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(classify_status(StatusCode::REQUEST_TIMEOUT, "").is_transient());

        let rejected = classify_status(
            StatusCode::BAD_REQUEST,
            r#"{"error":"Order must contain at least one item"}"#,
        );
        assert_eq!(
            rejected,
            GatewayError::Permanent(
                "Unexpected response from backend (HTTP 400): Order must contain at least one item"
                    .into()
            )
        );
        assert!(!classify_status(StatusCode::UNAUTHORIZED, "").is_transient());
    }

    #[test]
    fn test_extract_rows_accepts_bare_and_wrapped_lists() {
        assert_eq!(extract_rows(json!([1, 2])).unwrap().len(), 2);
        assert_eq!(extract_rows(json!({ "data": [1] })).unwrap().len(), 1);
        assert!(extract_rows(json!({ "rows": [] })).is_err());
        assert!(extract_rows(Value::Null).is_err());
    }

    #[test]
    fn test_decode_categories() {
        let rows = json!({ "data": [
            { "id": "drinks", "name": "Drinks", "displayOrder": 2 },
            { "id": "mains", "name": "Mains", "displayOrder": 1 }
        ]});
        let categories: Vec<Category> = decode_rows(rows, "category").unwrap();
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[1].display_order, 1);

        let bad: Result<Vec<Category>, _> = decode_rows(json!([{ "name": "x" }]), "category");
        assert!(matches!(bad, Err(GatewayError::Permanent(_))));
    }

    #[test]
    fn test_order_id_from_response_shapes() {
        assert_eq!(
            order_id_from_response(&json!({ "orderId": "Order12" })).as_deref(),
            Some("Order12")
        );
        assert_eq!(
            order_id_from_response(&json!({ "id": "abc" })).as_deref(),
            Some("abc")
        );
        assert_eq!(
            order_id_from_response(&json!({ "data": { "orderId": "Order3" } })).as_deref(),
            Some("Order3")
        );
        assert_eq!(order_id_from_response(&json!("Order9")).as_deref(), Some("Order9"));
        assert_eq!(order_id_from_response(&json!({ "orderId": "" })), None);
        assert_eq!(order_id_from_response(&Value::Null), None);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_order_before_sending() {
        let gateway = HttpGateway::new("http://127.0.0.1:1", "key").unwrap();
        let order = OrderPayload::new("table-1", "u1", vec![], "");

        let err = gateway.create(&order).await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::Permanent("invalid order: Order must contain at least one item".into())
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transient() {
        let gateway = HttpGateway::new("http://127.0.0.1:1", "key").unwrap();
        let err = gateway.list_items().await.unwrap_err();
        assert!(err.is_transient(), "got {err:?}");
    }

    /// Serve one request with a 200 whose body stops short of its
    /// Content-Length, then hang up.
    async fn truncated_body_server() -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = sock.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }
            sock.write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n[{\"id\"",
            )
            .await
            .unwrap();
            sock.shutdown().await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_truncated_success_body_is_transient() {
        let base = truncated_body_server().await;
        let gateway = HttpGateway::new(&base, "key").unwrap();

        let err = gateway.list_items().await.unwrap_err();

        assert!(err.is_transient(), "{err:?}");
        assert!(err.message().contains("response body"), "{err:?}");
    }
}
