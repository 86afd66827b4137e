//! Data models for the EasyShop API.
//!
//! - `Credentials`, `LoginResponse`: authentication request/response bodies
//! - `Product`: catalog entries
//! - `CheckoutItem`, `Order`, `OrderItem`: checkout and order history

pub mod auth;
pub mod order;
pub mod product;

pub use auth::{Credentials, LoginResponse};
pub use order::{CheckoutItem, CheckoutRequest, Order, OrderItem};
pub use product::Product;
