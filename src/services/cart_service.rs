// src/services/cart_service.rs

//! Cart Aggregate: per-user pending lines, at most one per product.

use std::sync::Arc;

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::{CartLine, CartView};
use crate::pipelines::contexts::AddToCartCtxData;
use crate::services::catalog::CatalogService;
use crate::store::Store;
use crate::workflow::{ContextData, PipelineResult, Workflows};

#[derive(Clone)]
pub struct CartService {
  store: Arc<dyn Store>,
  catalog: CatalogService,
  workflows: Arc<Workflows>,
}

impl CartService {
  pub fn new(store: Arc<dyn Store>, catalog: CatalogService, workflows: Arc<Workflows>) -> Self {
    Self {
      store,
      catalog,
      workflows,
    }
  }

  /// Adds `quantity` of `product_id`, merging into an existing line.
  #[instrument(name = "cart::add_or_increment", skip(self), err(Display))]
  pub async fn add_or_increment(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> Result<CartLine> {
    let ctx_data = ContextData::new(AddToCartCtxData {
      store: self.store.clone(),
      catalog: self.catalog.clone(),
      user_id,
      product_id,
      quantity,
      line: None,
    });

    match self.workflows.run(ctx_data.clone()).await? {
      PipelineResult::Completed => ctx_data
        .read()
        .line
        .clone()
        .ok_or_else(|| AppError::Internal("add to cart completed without a line".to_string())),
      PipelineResult::Stopped => Err(AppError::Internal("add to cart stopped unexpectedly".to_string())),
    }
  }

  #[instrument(name = "cart::set_quantity", skip(self), err(Display))]
  pub async fn set_quantity(&self, user_id: Uuid, line_id: Uuid, quantity: i32) -> Result<CartLine> {
    if quantity < 1 {
      return Err(AppError::InvalidQuantity("Quantity must be at least 1".to_string()));
    }
    self
      .store
      .set_cart_line_quantity(user_id, line_id, quantity)
      .await?
      .ok_or_else(|| AppError::NotFound("Cart item not found".to_string()))
  }

  /// Removing an absent line succeeds without effect.
  #[instrument(name = "cart::remove", skip(self), err(Display))]
  pub async fn remove(&self, user_id: Uuid, line_id: Uuid) -> Result<()> {
    let removed = self.store.delete_cart_line(user_id, line_id).await?;
    debug!(removed, "Cart line removal processed.");
    Ok(())
  }

  #[instrument(name = "cart::view", skip(self), err(Display))]
  pub async fn view(&self, user_id: Uuid) -> Result<CartView> {
    let lines = self.store.cart_view(user_id).await?;
    Ok(CartView::from_lines(lines))
  }
}
