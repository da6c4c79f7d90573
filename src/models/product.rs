// src/models/product.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Seller-owned catalog entry. `price` is live and may change at any time.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
  pub id: Uuid,
  pub seller_id: Uuid,
  pub farm_id: Option<Uuid>,
  pub name: String,
  pub description: Option<String>,
  pub price: Decimal,
  pub unit: String,
  pub image_url: Option<String>,
  pub category: Option<String>,
  pub organic: bool,
  pub available: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
  pub seller_id: Uuid,
  pub farm_id: Option<Uuid>,
  pub name: String,
  pub description: Option<String>,
  pub price: Decimal,
  pub unit: String,
  pub image_url: Option<String>,
  pub category: Option<String>,
  pub organic: bool,
  pub available: bool,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
  pub name: Option<String>,
  pub description: Option<String>,
  pub price: Option<Decimal>,
  pub unit: Option<String>,
  pub image_url: Option<String>,
  pub category: Option<String>,
  pub organic: Option<bool>,
  pub available: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
  pub search: Option<String>,
  pub category: Option<String>,
  pub organic: Option<bool>,
  pub available: Option<bool>,
}

impl ProductFilter {
  pub const LIMIT: i64 = 100;

  pub fn matches(&self, product: &Product) -> bool {
    if let Some(search) = &self.search {
      if !product.name.to_lowercase().contains(&search.to_lowercase()) {
        return false;
      }
    }
    if let Some(category) = &self.category {
      if product.category.as_deref() != Some(category.as_str()) {
        return false;
      }
    }
    if let Some(organic) = self.organic {
      if product.organic != organic {
        return false;
      }
    }
    if let Some(available) = self.available {
      if product.available != available {
        return false;
      }
    }
    true
  }
}
