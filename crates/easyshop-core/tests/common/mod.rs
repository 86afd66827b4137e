// Shared helpers; not every test file uses all of them
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use easyshop_core::api::navigation::{Navigator, HOME_LOCATION};
use easyshop_core::auth::claims::encode_unsigned;
use easyshop_core::auth::MemoryCredentialStore;
use easyshop_core::{ApiClient, Config};
use serde_json::json;
use wiremock::MockServer;

/// Navigator that counts redirects.
pub struct CountingNavigator {
    location: Mutex<String>,
    redirects: AtomicUsize,
}

impl CountingNavigator {
    pub fn new(location: &str) -> Self {
        Self {
            location: Mutex::new(location.to_string()),
            redirects: AtomicUsize::new(0),
        }
    }

    pub fn redirects(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }
}

impl Navigator for CountingNavigator {
    fn current_location(&self) -> String {
        self.location.lock().unwrap().clone()
    }

    fn navigate_to(&self, location: &str) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
        *self.location.lock().unwrap() = location.to_string();
    }
}

/// Unsigned credential for `sub` expiring `exp_offset` seconds from now.
pub fn token(sub: &str, role: &str, exp_offset: i64) -> String {
    encode_unsigned(&json!({
        "sub": sub,
        "role": role,
        "type": "access",
        "exp": Utc::now().timestamp() + exp_offset,
    }))
}

pub struct Harness {
    pub server: MockServer,
    pub store: Arc<MemoryCredentialStore>,
    pub navigator: Arc<CountingNavigator>,
    pub config: Config,
    pub api: ApiClient,
}

impl Harness {
    pub async fn new(stored: Option<String>) -> Self {
        Self::at(stored, HOME_LOCATION).await
    }

    pub async fn at(stored: Option<String>, location: &str) -> Self {
        let server = MockServer::start().await;
        let store = Arc::new(match stored {
            Some(t) => MemoryCredentialStore::with_token(t),
            None => MemoryCredentialStore::new(),
        });
        let navigator = Arc::new(CountingNavigator::new(location));
        let config = Config {
            api_base: server.uri(),
            ..Config::default()
        };
        let api = ApiClient::new(&config, store.clone(), navigator.clone()).unwrap();

        Self {
            server,
            store,
            navigator,
            config,
            api,
        }
    }

    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|r| r.len())
            .unwrap_or(0)
    }
}
