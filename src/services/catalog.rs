// src/services/catalog.rs

//! Catalog Store collaborator: seller-owned products and the availability
//! check the cart relies on.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::{NewProduct, Product, ProductFilter, ProductUpdate, Role};
use crate::store::Store;

#[derive(Debug, Clone, Default)]
pub struct ProductDraft {
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

fn validate_price(price: Decimal) -> Result<Decimal> {
  if price.is_sign_negative() && !price.is_zero() {
    return Err(AppError::InvalidInput("Price must not be negative".to_string()));
  }
  if price.scale() > 2 {
    return Err(AppError::InvalidInput("Price has more than two decimal places".to_string()));
  }
  Ok(price)
}

fn non_empty(field: &str, value: &str) -> Result<String> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    return Err(AppError::InvalidInput(format!("{} is required", field)));
  }
  Ok(trimmed.to_string())
}

#[derive(Clone)]
pub struct CatalogService {
  store: Arc<dyn Store>,
}

impl CatalogService {
  pub fn new(store: Arc<dyn Store>) -> Self {
    Self { store }
  }

  #[instrument(name = "catalog::list", skip(self), err(Display))]
  pub async fn list(&self, filter: ProductFilter) -> Result<Vec<Product>> {
    Ok(self.store.list_products(&filter).await?)
  }

  #[instrument(name = "catalog::get", skip(self), err(Display))]
  pub async fn get(&self, product_id: Uuid) -> Result<Product> {
    self
      .store
      .get_product(product_id)
      .await?
      .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
  }

  /// The product, provided it exists and is marked available.
  #[instrument(name = "catalog::available_product", skip(self), err(Display))]
  pub async fn available_product(&self, product_id: Uuid) -> Result<Product> {
    match self.store.get_product(product_id).await? {
      Some(product) if product.available => Ok(product),
      Some(_) => Err(AppError::ProductUnavailable("Product is not available".to_string())),
      None => Err(AppError::ProductUnavailable("Product does not exist".to_string())),
    }
  }

  #[instrument(name = "catalog::create", skip(self, draft), fields(product_name = %draft.name), err(Display))]
  pub async fn create(&self, seller_id: Uuid, role: Role, draft: ProductDraft) -> Result<Product> {
    if !role.can_sell() {
      return Err(AppError::Forbidden("Only sellers can list products".to_string()));
    }
    let new_product = NewProduct {
      seller_id,
      farm_id: draft.farm_id,
      name: non_empty("name", &draft.name)?,
      description: draft.description,
      price: validate_price(draft.price)?,
      unit: non_empty("unit", &draft.unit)?,
      image_url: draft.image_url,
      category: draft.category,
      organic: draft.organic,
      available: draft.available,
    };
    let product = self.store.insert_product(new_product).await?;
    info!(product_id = %product.id, "Product listed.");
    Ok(product)
  }

  async fn owned_product(&self, seller_id: Uuid, product_id: Uuid) -> Result<Product> {
    let product = self.get(product_id).await?;
    if product.seller_id != seller_id {
      return Err(AppError::Forbidden("Only the owning seller can change this product".to_string()));
    }
    Ok(product)
  }

  #[instrument(name = "catalog::update", skip(self, update), err(Display))]
  pub async fn update(&self, seller_id: Uuid, product_id: Uuid, mut update: ProductUpdate) -> Result<Product> {
    self.owned_product(seller_id, product_id).await?;
    if let Some(price) = update.price {
      update.price = Some(validate_price(price)?);
    }
    if let Some(name) = update.name.as_deref() {
      update.name = Some(non_empty("name", name)?);
    }
    if let Some(unit) = update.unit.as_deref() {
      update.unit = Some(non_empty("unit", unit)?);
    }
    self
      .store
      .update_product(product_id, update)
      .await?
      .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
  }

  #[instrument(name = "catalog::delete", skip(self), err(Display))]
  pub async fn delete(&self, seller_id: Uuid, product_id: Uuid) -> Result<()> {
    self.owned_product(seller_id, product_id).await?;
    if !self.store.delete_product(product_id).await? {
      return Err(AppError::NotFound("Product not found".to_string()));
    }
    info!(%product_id, "Product removed from catalog.");
    Ok(())
  }
}
