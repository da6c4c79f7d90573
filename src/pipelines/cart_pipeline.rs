// src/pipelines/cart_pipeline.rs

use tracing::{info, warn};

use crate::errors::AppError;
use crate::pipelines::contexts::AddToCartCtxData;
use crate::store::StoreError;
use crate::workflow::{ContextData, Pipeline, PipelineControl, Workflows};

pub fn register_add_to_cart_pipeline(workflows: &Workflows) {
  let mut p = Pipeline::<AddToCartCtxData>::new(
    "add_to_cart",
    &[
      ("validate_cart_quantity", false, None),
      ("check_product_available", false, None),
      ("upsert_cart_line", false, None),
    ],
  );

  p.on_root("validate_cart_quantity", |ctx_data| Box::pin(validate_cart_quantity(ctx_data)));
  p.on_root("check_product_available", |ctx_data| Box::pin(check_product_available(ctx_data)));
  p.on_root("upsert_cart_line", |ctx_data| Box::pin(upsert_cart_line(ctx_data)));

  workflows.register_pipeline(p);
}

async fn validate_cart_quantity(ctx_data: ContextData<AddToCartCtxData>) -> Result<PipelineControl, AppError> {
  let quantity = ctx_data.read().quantity;
  if quantity <= 0 {
    warn!(quantity, "Add to cart rejected: quantity must be positive.");
    return Err(AppError::InvalidQuantity("Quantity must be a positive integer".to_string()));
  }
  Ok(PipelineControl::Continue)
}

async fn check_product_available(ctx_data: ContextData<AddToCartCtxData>) -> Result<PipelineControl, AppError> {
  let (catalog, product_id) = {
    let guard = ctx_data.read();
    (guard.catalog.clone(), guard.product_id)
  };
  catalog.available_product(product_id).await?;
  Ok(PipelineControl::Continue)
}

async fn upsert_cart_line(ctx_data: ContextData<AddToCartCtxData>) -> Result<PipelineControl, AppError> {
  let (store, user_id, product_id, quantity) = {
    let guard = ctx_data.read();
    (guard.store.clone(), guard.user_id, guard.product_id, guard.quantity)
  };

  let line = match store.upsert_cart_line(user_id, product_id, quantity).await {
    Ok(line) => line,
    Err(StoreError::QuantityOverflow) => {
      return Err(AppError::InvalidQuantity("Resulting quantity is too large".to_string()));
    }
    // product deleted between the availability check and the write
    Err(StoreError::MissingReference("product")) => {
      return Err(AppError::ProductUnavailable("Product does not exist".to_string()));
    }
    Err(e) => return Err(e.into()),
  };

  info!(%user_id, line_id = %line.id, quantity = line.quantity, "Cart line upserted.");
  ctx_data.write().line = Some(line);
  Ok(PipelineControl::Continue)
}
