// src/models/cart_line.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// One (user, product, quantity) row of a pending cart. At most one per
/// (user, product); `quantity >= 1`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CartLine {
  pub id: Uuid,
  pub user_id: Uuid,
  pub product_id: Uuid,
  pub quantity: i32,
  pub added_at: DateTime<Utc>,
}

/// A cart line as seen by checkout: the product's current price, or `None`
/// when the product no longer exists.
#[derive(Debug, Clone, FromRow)]
pub struct PricedCartLine {
  pub line_id: Uuid,
  pub product_id: Uuid,
  pub quantity: i32,
  pub current_price: Option<Decimal>,
}

/// Cart line joined with live product data for display.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CartViewLine {
  pub id: Uuid,
  pub product_id: Uuid,
  pub name: String,
  pub price: Decimal,
  pub unit: String,
  pub image: Option<String>,
  pub quantity: i32,
  #[sqlx(skip)]
  pub line_total: Decimal,
  #[serde(skip_serializing)]
  pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
  pub items: Vec<CartViewLine>,
  /// Pre-checkout estimate at live prices.
  pub subtotal: Decimal,
}

impl CartView {
  pub fn from_lines(mut items: Vec<CartViewLine>) -> Self {
    items.sort_by_key(|line| line.added_at);
    let mut subtotal = Decimal::ZERO;
    for line in items.iter_mut() {
      line.line_total = line.price * Decimal::from(line.quantity);
      subtotal += line.line_total;
    }
    Self { items, subtotal }
  }
}
