// src/models/order.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::order_item::OrderItemView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  Pending,
  Paid,
  Shipped,
  Delivered,
  Cancelled,
}

impl OrderStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      OrderStatus::Pending => "pending",
      OrderStatus::Paid => "paid",
      OrderStatus::Shipped => "shipped",
      OrderStatus::Delivered => "delivered",
      OrderStatus::Cancelled => "cancelled",
    }
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OrderStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pending" => Ok(OrderStatus::Pending),
      "paid" => Ok(OrderStatus::Paid),
      "shipped" => Ok(OrderStatus::Shipped),
      "delivered" => Ok(OrderStatus::Delivered),
      "cancelled" => Ok(OrderStatus::Cancelled),
      other => Err(format!("unknown order status '{}'", other)),
    }
  }
}

/// Immutable order header.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
  pub id: Uuid,
  pub user_id: Uuid,
  pub shipping_address: String,
  pub payment_method: String,
  pub status: OrderStatus,
  #[serde(skip_serializing)]
  pub idempotency_key: Option<String>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
  pub id: Uuid,
  pub user_id: Uuid,
  pub shipping_address: String,
  pub payment_method: String,
  pub idempotency_key: Option<String>,
}

/// List projection: header fields only.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
  pub id: Uuid,
  pub status: OrderStatus,
  pub created_at: DateTime<Utc>,
}

impl From<&Order> for OrderSummary {
  fn from(order: &Order) -> Self {
    Self {
      id: order.id,
      status: order.status,
      created_at: order.created_at,
    }
  }
}

/// Detail projection: header plus items, total recomputed from the items.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
  pub id: Uuid,
  pub shipping_address: String,
  pub payment_method: String,
  pub status: OrderStatus,
  pub created_at: DateTime<Utc>,
  pub total: Decimal,
  pub items: Vec<OrderItemView>,
}

impl OrderDetail {
  pub fn new(order: Order, items: Vec<OrderItemView>) -> Self {
    let total = items.iter().map(|item| item.line_total).sum();
    Self {
      id: order.id,
      shipping_address: order.shipping_address,
      payment_method: order.payment_method,
      status: order.status,
      created_at: order.created_at,
      total,
      items,
    }
  }
}
