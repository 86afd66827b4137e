//! EasyShop client core.
//!
//! Session state, credential storage and the authenticated request gateway
//! shared by every EasyShop front end.
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use std::sync::Arc;
//! use easyshop_core::{ApiClient, Config, SessionManager, TrackingNavigator};
//!
//! let config = Config::load()?;
//! let store = config.credential_store()?;
//! let api = ApiClient::new(&config, store, Arc::new(TrackingNavigator::default()))?;
//!
//! let session = SessionManager::new(api, &config);
//! session.initialize();
//! session.start();
//!
//! if session.login("a@x.com", "password").await.is_success() {
//!     let products = session.api().fetch_products().await?;
//!     println!("{} products, admin: {}", products.len(), session.is_admin());
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, GatewayEvent, Navigator, RequestOptions, TrackingNavigator};
pub use auth::{AuthOutcome, CredentialStore, Identity, Session, SessionManager};
pub use config::{Config, CredentialBackend};
