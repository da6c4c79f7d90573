// src/models/order_item.rs

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Immutable order line. `price` is the unit price captured at checkout,
/// never a reference to the live catalog price.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderItem {
  pub id: Uuid,
  pub order_id: Uuid,
  pub product_id: Uuid,
  pub quantity: i32,
  pub price: Decimal,
}

impl OrderItem {
  pub fn line_total(&self) -> Decimal {
    self.price * Decimal::from(self.quantity)
  }
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
  pub order_id: Uuid,
  pub product_id: Uuid,
  pub quantity: i32,
  pub price: Decimal,
}

/// Order line joined with the product name at read time. The name is absent
/// once the product has been deleted from the catalog.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderItemView {
  pub product_id: Uuid,
  pub name: Option<String>,
  pub quantity: i32,
  pub price: Decimal,
  #[sqlx(skip)]
  pub line_total: Decimal,
}

impl OrderItemView {
  pub fn with_line_total(mut self) -> Self {
    self.line_total = self.price * Decimal::from(self.quantity);
    self
  }
}
