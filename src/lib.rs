// src/lib.rs

//! Agricultural marketplace backend: accounts, a seller catalog, per-user
//! carts and an atomic, idempotent cart-to-order checkout.

pub mod config;
pub mod errors;
pub mod models;
pub mod pipelines;
pub mod services;
pub mod state;
pub mod store;
pub mod web;
pub mod workflow;

pub use errors::{AppError, Result};
pub use state::AppState;
