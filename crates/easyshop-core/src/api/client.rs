//! Request gateway for the EasyShop REST API.
//!
//! Every outbound call goes through `ApiClient::send`, which attaches the
//! stored bearer credential and turns the HTTP outcome into either the decoded
//! JSON body or an `ApiError`. A 401 is the one outcome with side effects: the
//! stored credential is cleared, the user is sent to the account view and a
//! `GatewayEvent::SessionInvalidated` is broadcast.

use std::sync::Arc;

use anyhow::Result;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::auth::CredentialStore;
use crate::config::Config;
use crate::models::{
    CheckoutItem, CheckoutRequest, Credentials, LoginResponse, Order, Product,
};

use super::navigation::{Navigator, ACCOUNT_LOCATION};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Buffered gateway events per subscriber before the oldest are dropped.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Notifications the gateway emits to whoever owns session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// The server answered 401; the stored credential has been cleared.
    SessionInvalidated { message: String },
}

/// Per-call request options.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Value>,
    pub headers: HeaderMap,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: None,
            headers: HeaderMap::new(),
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn delete() -> Self {
        Self {
            method: Method::DELETE,
            ..Self::default()
        }
    }

    pub fn header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Gateway to the EasyShop API.
/// Clone is cheap - the HTTP client, store and navigator are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    store: Arc<dyn CredentialStore>,
    navigator: Arc<dyn Navigator>,
    events: broadcast::Sender<GatewayEvent>,
}

impl ApiClient {
    pub fn new(
        config: &Config,
        store: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            client,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            store,
            navigator,
            events,
        })
    }

    /// Receive gateway events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }

    pub fn credential_store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn request_headers(&self, extra: HeaderMap) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.extend(extra);

        if let Some(token) = self.store.get() {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(header::AUTHORIZATION, value);
                }
                Err(_) => warn!("Stored credential is not a valid header value, sending without it"),
            }
        }
        headers
    }

    /// Send a request and classify the response.
    ///
    /// Returns the decoded JSON body, or `None` when the body was empty.
    pub async fn send(&self, path: &str, options: RequestOptions) -> Result<Option<Value>, ApiError> {
        let url = self.url(path);
        let RequestOptions {
            method,
            body,
            headers,
        } = options;

        let mut request = self
            .client
            .request(method.clone(), &url)
            .headers(self.request_headers(headers));
        if let Some(ref body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            warn!(%method, url = %url, error = %e, "Request failed");
            ApiError::Transport(e)
        })?;

        let status = response.status();
        let text = response.text().await.map_err(ApiError::Transport)?;
        debug!(%method, url = %url, status = status.as_u16(), "Response received");

        let data = if text.trim().is_empty() {
            None
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(value) => Some(value),
                Err(e) if status.is_success() => return Err(ApiError::invalid_body(&text, e)),
                Err(_) => None,
            }
        };

        if status.is_success() {
            return Ok(data);
        }

        let message = data
            .as_ref()
            .and_then(|d| d.get("message"))
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_string);

        let err = ApiError::from_status(status, message);
        if let ApiError::SessionInvalid(ref message) = err {
            self.invalidate_session(message);
        }
        Err(err)
    }

    /// The 401 path: forget the credential and send the user to log in.
    fn invalidate_session(&self, message: &str) {
        warn!("Server rejected the credential, ending session");

        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear rejected credential");
        }

        if self.navigator.current_location() != ACCOUNT_LOCATION {
            self.navigator.navigate_to(ACCOUNT_LOCATION);
        }

        // Nobody listening is fine; the store is already cleared
        let _ = self.events.send(GatewayEvent::SessionInvalidated {
            message: message.to_string(),
        });
    }

    fn decode<T: DeserializeOwned>(path: &str, data: Option<Value>) -> Result<T, ApiError> {
        serde_json::from_value(data.unwrap_or(Value::Null))
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", path, e)))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let data = self.send(path, RequestOptions::get()).await?;
        Self::decode(path, data)
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("{}: {}", path, e)))?;
        let data = self.send(path, RequestOptions::post(body)).await?;
        Self::decode(path, data)
    }

    // ===== Authentication =====

    /// Exchange email and password for a credential.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        self.post("/auth/login", &Credentials { email, password })
            .await
    }

    /// Create an account. Does not sign in.
    pub async fn register(&self, email: &str, password: &str) -> Result<(), ApiError> {
        let body = serde_json::to_value(Credentials { email, password })
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        self.send("/auth/register", RequestOptions::post(body)).await?;
        Ok(())
    }

    // ===== Storefront =====

    pub async fn fetch_products(&self) -> Result<Vec<Product>, ApiError> {
        self.get("/products").await
    }

    pub async fn fetch_product(&self, id: i64) -> Result<Product, ApiError> {
        self.get(&format!("/products/{}", id)).await
    }

    /// Place an order for `items`. An empty cart never reaches the server.
    pub async fn checkout(&self, items: &[CheckoutItem]) -> Result<Order, ApiError> {
        if items.is_empty() {
            return Err(ApiError::RequestRejected {
                status: 400,
                message: "Empty cart".to_string(),
            });
        }
        self.post("/orders/checkout", &CheckoutRequest { items }).await
    }

    pub async fn fetch_orders(&self) -> Result<Vec<Order>, ApiError> {
        self.get("/orders").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::navigation::TrackingNavigator;
    use crate::auth::MemoryCredentialStore;

    fn client(base: &str, token: Option<&str>) -> ApiClient {
        let config = Config {
            api_base: base.to_string(),
            ..Config::default()
        };
        let store: Arc<dyn CredentialStore> = match token {
            Some(t) => Arc::new(MemoryCredentialStore::with_token(t)),
            None => Arc::new(MemoryCredentialStore::new()),
        };
        ApiClient::new(&config, store, Arc::new(TrackingNavigator::default())).unwrap()
    }

    #[test]
    fn test_url_joining() {
        let api = client("http://shop.local/api/", None);
        assert_eq!(api.url("/products"), "http://shop.local/api/products");
        assert_eq!(api.url("orders"), "http://shop.local/api/orders");
    }

    #[test]
    fn test_headers_without_credential() {
        let api = client("http://shop.local", None);
        let headers = api.request_headers(HeaderMap::new());
        assert!(headers.get(header::AUTHORIZATION).is_none());
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn test_headers_with_credential() {
        let api = client("http://shop.local", Some("a.b.c"));
        let headers = api.request_headers(HeaderMap::new());
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer a.b.c");
    }

    #[test]
    fn test_caller_headers_merge_over_defaults() {
        let api = client("http://shop.local", None);
        let mut extra = HeaderMap::new();
        extra.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        extra.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        let headers = api.request_headers(extra);
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "text/plain");
        assert_eq!(headers.get(header::ACCEPT).unwrap(), "application/json");
    }

    #[test]
    fn test_decode_empty_body() {
        let _: () = ApiClient::decode("/x", None).unwrap();
        let missing: Option<Product> = ApiClient::decode("/x", None).unwrap();
        assert!(missing.is_none());
        let err = ApiClient::decode::<Vec<Product>>("/x", None).unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected_locally() {
        // Port 9 (discard) is never contacted: the check happens first
        let api = client("http://127.0.0.1:9", Some("a.b.c"));
        let err = api.checkout(&[]).await.unwrap_err();
        assert_eq!(err.to_string(), "Empty cart");
    }
}
