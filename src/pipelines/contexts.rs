// src/pipelines/contexts.rs

//! Data carried through each workflow. Handlers receive these wrapped in
//! `ContextData`.

use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::time::Instant;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{CartLine, Order, PricedCartLine, Role, User};
use crate::services::catalog::CatalogService;
use crate::services::identity_token::IdentityTokenService;
use crate::store::{CheckoutUnit, Store};
use crate::workflow::ContextData;

#[derive(Clone)]
pub struct SignupCtxData {
  pub store: Arc<dyn Store>,
  pub tokens: Arc<IdentityTokenService>,
  pub name: String,
  pub email: String,
  pub password: String,
  pub role: String,
  pub password_hash: Option<String>,
  pub user: Option<User>,
  pub token: Option<String>,
}

#[derive(Clone)]
pub struct SigninCtxData {
  pub store: Arc<dyn Store>,
  pub tokens: Arc<IdentityTokenService>,
  pub email: String,
  pub password: String,
  pub user: Option<User>,
  pub token: Option<String>,
}

#[derive(Clone)]
pub struct AddToCartCtxData {
  pub store: Arc<dyn Store>,
  pub catalog: CatalogService,
  pub user_id: Uuid,
  pub product_id: Uuid,
  pub quantity: i32,
  pub line: Option<CartLine>,
}

/// Holds the open checkout unit between steps. Steps take the unit out,
/// await on it, and put it back before inspecting the result.
#[derive(Default)]
pub struct UnitSlot(Mutex<Option<Box<dyn CheckoutUnit>>>);

impl UnitSlot {
  pub fn put(&self, unit: Box<dyn CheckoutUnit>) {
    *self.0.lock() = Some(unit);
  }

  pub fn take(&self) -> Option<Box<dyn CheckoutUnit>> {
    self.0.lock().take()
  }
}

pub struct CheckoutCtxData {
  pub store: Arc<dyn Store>,
  pub user_id: Uuid,
  pub shipping_address: String,
  pub payment_method: String,
  pub idempotency_key: Option<String>,
  /// Storage calls before the commit must finish by this instant.
  pub deadline: Instant,
  pub unit: UnitSlot,
  /// Cart lines captured under the exclusive lock.
  pub lines: Vec<PricedCartLine>,
  pub order: Option<Order>,
  pub total: Decimal,
  pub items_written: usize,
  pub lines_cleared: u64,
  pub replayed: bool,
  pub committed: bool,
}

impl CheckoutCtxData {
  pub fn new(
    store: Arc<dyn Store>,
    user_id: Uuid,
    shipping_address: String,
    payment_method: String,
    idempotency_key: Option<String>,
    deadline: Instant,
  ) -> Self {
    Self {
      store,
      user_id,
      shipping_address,
      payment_method,
      idempotency_key,
      deadline,
      unit: UnitSlot::default(),
      lines: Vec::new(),
      order: None,
      total: Decimal::ZERO,
      items_written: 0,
      lines_cleared: 0,
      replayed: false,
      committed: false,
    }
  }
}

/// Takes the open unit out of the checkout context.
pub fn take_unit(ctx_data: &ContextData<CheckoutCtxData>) -> Result<Box<dyn CheckoutUnit>, AppError> {
  ctx_data
    .read()
    .unit
    .take()
    .ok_or_else(|| AppError::Internal("checkout unit of work is not open".to_string()))
}

pub fn restore_unit(ctx_data: &ContextData<CheckoutCtxData>, unit: Box<dyn CheckoutUnit>) {
  ctx_data.read().unit.put(unit);
}

/// Parses a role name from a request, defaulting to `Buyer`.
pub fn parse_role(raw: &str) -> Result<Role, AppError> {
  if raw.trim().is_empty() {
    return Ok(Role::Buyer);
  }
  raw.parse::<Role>().map_err(AppError::InvalidInput)
}
