// src/services/mod.rs

pub mod auth_service;
pub mod cart_service;
pub mod catalog;
pub mod fulfillment;
pub mod identity_token;
pub mod order_query;

pub use cart_service::CartService;
pub use catalog::CatalogService;
pub use fulfillment::{CheckoutReceipt, CheckoutRequest, OrderFulfillment};
pub use identity_token::{Claims, IdentityTokenService, TokenError};
pub use order_query::OrderQueryService;
