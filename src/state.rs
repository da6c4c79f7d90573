// src/state.rs

use std::sync::Arc;

use chrono::Duration;
use tracing::warn;

use crate::config::{AppConfig, MAX_TOKEN_TTL_HOURS};
use crate::pipelines;
use crate::services::{CartService, CatalogService, IdentityTokenService, OrderFulfillment, OrderQueryService};
use crate::store::Store;
use crate::workflow::Workflows;

/// Shared by every handler through `web::Data`.
#[derive(Clone)]
pub struct AppState {
  pub store: Arc<dyn Store>,
  pub workflows: Arc<Workflows>,
  pub config: Arc<AppConfig>,
  pub tokens: Arc<IdentityTokenService>,
  pub catalog: CatalogService,
  pub cart: CartService,
  pub fulfillment: OrderFulfillment,
  pub orders: OrderQueryService,
}

impl AppState {
  /// Wires services over `store` and registers all workflows.
  pub fn new(store: Arc<dyn Store>, config: Arc<AppConfig>) -> Self {
    let workflows = Arc::new(Workflows::new());
    pipelines::register_all_pipelines(&workflows);

    let ttl_hours = config.token_ttl_hours.clamp(1, MAX_TOKEN_TTL_HOURS);
    if ttl_hours != config.token_ttl_hours {
      warn!(requested = config.token_ttl_hours, applied = ttl_hours, "Token TTL clamped to the accepted range.");
    }
    let tokens = Arc::new(IdentityTokenService::new(
      config.token_secret.as_bytes(),
      Duration::hours(ttl_hours),
    ));
    let catalog = CatalogService::new(store.clone());
    let cart = CartService::new(store.clone(), catalog.clone(), workflows.clone());
    let fulfillment = OrderFulfillment::new(store.clone(), workflows.clone(), config.storage_timeout);
    let orders = OrderQueryService::new(store.clone());

    Self {
      store,
      workflows,
      config,
      tokens,
      catalog,
      cart,
      fulfillment,
      orders,
    }
  }
}
