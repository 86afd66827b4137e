//! REST API gateway module for the EasyShop services.
//!
//! This module provides the `ApiClient` through which every outbound call
//! is made. It attaches the stored bearer credential, classifies responses
//! into `ApiError`s and handles the forced-logout path on HTTP 401.

pub mod client;
pub mod error;
pub mod navigation;

pub use client::{ApiClient, GatewayEvent, RequestOptions};
pub use error::ApiError;
pub use navigation::{Navigator, TrackingNavigator, ACCOUNT_LOCATION};
