// tests/common/mod.rs
#![allow(dead_code)] // Each test crate uses a different subset of these helpers.

use std::str::FromStr;
use std::sync::Arc;

use agri_market::config::AppConfig;
use agri_market::models::{NewProduct, NewUser, Product, Role, User};
use agri_market::state::AppState;
use agri_market::store::{MemoryStore, Store};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use tracing::Level;
use uuid::Uuid;

pub const TEST_TOKEN_SECRET: &str = "test-secret-test-secret-test-secret!";

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

pub fn dec(s: &str) -> Decimal {
  Decimal::from_str(s).unwrap()
}

/// A fresh in-memory store and the application state wired over it.
pub fn memory_state() -> (MemoryStore, AppState) {
  memory_state_with(AppConfig::for_memory(TEST_TOKEN_SECRET))
}

/// Like `memory_state`, with a caller-tuned config.
pub fn memory_state_with(config: AppConfig) -> (MemoryStore, AppState) {
  let store = MemoryStore::new();
  let state = AppState::new(Arc::new(store.clone()) as Arc<dyn Store>, Arc::new(config));
  (store, state)
}

/// Inserts a user directly, bypassing password hashing.
pub async fn create_user(store: &MemoryStore, role: Role) -> User {
  let tag = Uuid::new_v4().simple().to_string();
  store
    .insert_user(NewUser {
      name: format!("user-{}", &tag[..8]),
      email: format!("{}@farm.test", tag),
      password_hash: "unused".to_string(),
      role,
    })
    .await
    .unwrap()
}

pub async fn create_product(store: &MemoryStore, seller: &User, name: &str, price: &str) -> Product {
  store
    .insert_product(NewProduct {
      seller_id: seller.id,
      farm_id: None,
      name: name.to_string(),
      description: None,
      price: dec(price),
      unit: "kg".to_string(),
      image_url: None,
      category: Some("vegetables".to_string()),
      organic: false,
      available: true,
    })
    .await
    .unwrap()
}
