// src/pipelines/checkout_pipeline.rs

//! Cart-to-order materialisation. Every step after `open_unit_of_work` runs
//! inside one `CheckoutUnit` holding the user's exclusive lock; nothing is
//! visible to other readers until `commit_unit_of_work`.
//!
//! Lock acquisition and every storage call before the commit are bounded by
//! the context deadline. The commit itself is not: once it has been sent, its
//! outcome is the outcome of the checkout.

use std::future::Future;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{NewOrder, NewOrderItem};
use crate::pipelines::contexts::{restore_unit, take_unit, CheckoutCtxData};
use crate::store::{StoreError, StoreResult};
use crate::workflow::{ContextData, Pipeline, PipelineControl, SkipCondition, Workflows};

pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

fn order_failed(stage: &str, err: StoreError) -> AppError {
  AppError::OrderCreationFailed(format!("{}: {}", stage, err))
}

/// Awaits a storage call, failing the checkout once the deadline passes.
async fn before_deadline<T>(
  ctx_data: &ContextData<CheckoutCtxData>,
  stage: &str,
  call: impl Future<Output = StoreResult<T>>,
) -> Result<T, AppError> {
  let deadline = ctx_data.read().deadline;
  match tokio::time::timeout_at(deadline, call).await {
    Ok(result) => result.map_err(|e| order_failed(stage, e)),
    Err(_) => {
      warn!(stage, "Checkout storage deadline exceeded.");
      Err(AppError::OrderCreationFailed(format!("{}: storage timed out", stage)))
    }
  }
}

pub fn register_checkout_pipeline(workflows: &Workflows) {
  let without_key: SkipCondition<CheckoutCtxData> =
    Arc::new(|ctx_data: ContextData<CheckoutCtxData>| ctx_data.read().idempotency_key.is_none());

  let mut p = Pipeline::<CheckoutCtxData>::new(
    "checkout",
    &[
      ("validate_checkout_input", false, None),
      ("open_unit_of_work", false, None),
      ("replay_idempotent_order", false, Some(without_key)),
      ("snapshot_cart_lines", false, None),
      ("create_order_record", false, None),
      ("write_order_items", false, None),
      ("clear_cart_lines", false, None),
      ("commit_unit_of_work", false, None),
    ],
  );

  p.on_root("validate_checkout_input", |ctx_data| Box::pin(validate_checkout_input(ctx_data)));
  p.on_root("open_unit_of_work", |ctx_data| Box::pin(open_unit_of_work(ctx_data)));
  p.on_root("replay_idempotent_order", |ctx_data| Box::pin(replay_idempotent_order(ctx_data)));
  p.on_root("snapshot_cart_lines", |ctx_data| Box::pin(snapshot_cart_lines(ctx_data)));
  p.on_root("create_order_record", |ctx_data| Box::pin(create_order_record(ctx_data)));
  p.on_root("write_order_items", |ctx_data| Box::pin(write_order_items(ctx_data)));
  p.on_root("clear_cart_lines", |ctx_data| Box::pin(clear_cart_lines(ctx_data)));
  p.on_root("commit_unit_of_work", |ctx_data| Box::pin(commit_unit_of_work(ctx_data)));

  workflows.register_pipeline(p);
}

/// `Idempotency-Key` values: 1..=128 visible ASCII characters.
pub fn validate_idempotency_key(key: &str) -> Result<(), AppError> {
  if key.is_empty() || key.len() > MAX_IDEMPOTENCY_KEY_LEN {
    return Err(AppError::InvalidInput(format!(
      "Idempotency key must be 1 to {} characters",
      MAX_IDEMPOTENCY_KEY_LEN
    )));
  }
  if !key.bytes().all(|b| b.is_ascii_graphic()) {
    return Err(AppError::InvalidInput(
      "Idempotency key must be visible ASCII".to_string(),
    ));
  }
  Ok(())
}

async fn validate_checkout_input(ctx_data: ContextData<CheckoutCtxData>) -> Result<PipelineControl, AppError> {
  let mut guard = ctx_data.write();
  guard.shipping_address = guard.shipping_address.trim().to_string();
  guard.payment_method = guard.payment_method.trim().to_string();

  if guard.shipping_address.is_empty() {
    return Err(AppError::InvalidInput("Shipping address is required".to_string()));
  }
  if guard.payment_method.is_empty() {
    return Err(AppError::InvalidInput("Payment method is required".to_string()));
  }
  if let Some(key) = guard.idempotency_key.as_deref() {
    validate_idempotency_key(key)?;
  }
  Ok(PipelineControl::Continue)
}

async fn open_unit_of_work(ctx_data: ContextData<CheckoutCtxData>) -> Result<PipelineControl, AppError> {
  let (store, user_id) = {
    let guard = ctx_data.read();
    (guard.store.clone(), guard.user_id)
  };

  let unit = before_deadline(&ctx_data, "begin", store.begin_checkout(user_id)).await?;
  restore_unit(&ctx_data, unit);
  debug!(%user_id, "Exclusive checkout lock acquired.");
  Ok(PipelineControl::Continue)
}

async fn replay_idempotent_order(ctx_data: ContextData<CheckoutCtxData>) -> Result<PipelineControl, AppError> {
  let Some(key) = ctx_data.read().idempotency_key.clone() else {
    return Ok(PipelineControl::Continue);
  };

  let mut unit = take_unit(&ctx_data)?;
  let found = before_deadline(&ctx_data, "idempotency lookup", unit.find_order_by_idempotency_key(&key)).await;
  restore_unit(&ctx_data, unit);

  match found? {
    Some(order) => {
      info!(order_id = %order.id, "Replaying order for repeated idempotency key.");
      let mut guard = ctx_data.write();
      guard.order = Some(order);
      guard.replayed = true;
      Ok(PipelineControl::Stop)
    }
    None => Ok(PipelineControl::Continue),
  }
}

async fn snapshot_cart_lines(ctx_data: ContextData<CheckoutCtxData>) -> Result<PipelineControl, AppError> {
  let mut unit = take_unit(&ctx_data)?;
  let read = before_deadline(&ctx_data, "cart snapshot", unit.priced_cart_lines()).await;
  restore_unit(&ctx_data, unit);
  let lines = read?;

  if lines.is_empty() {
    warn!("Checkout rejected: cart is empty.");
    return Err(AppError::EmptyCart);
  }
  if let Some(orphan) = lines.iter().find(|line| line.current_price.is_none()) {
    return Err(AppError::OrderCreationFailed(format!(
      "cart references deleted product {}",
      orphan.product_id
    )));
  }

  let total: Decimal = lines
    .iter()
    .filter_map(|line| line.current_price.map(|price| price * Decimal::from(line.quantity)))
    .sum();
  let mut guard = ctx_data.write();
  guard.total = total;
  guard.lines = lines;
  Ok(PipelineControl::Continue)
}

async fn create_order_record(ctx_data: ContextData<CheckoutCtxData>) -> Result<PipelineControl, AppError> {
  let new_order = {
    let guard = ctx_data.read();
    NewOrder {
      id: Uuid::new_v4(),
      user_id: guard.user_id,
      shipping_address: guard.shipping_address.clone(),
      payment_method: guard.payment_method.clone(),
      idempotency_key: guard.idempotency_key.clone(),
    }
  };

  let mut unit = take_unit(&ctx_data)?;
  let inserted = before_deadline(&ctx_data, "order insert", unit.insert_order(new_order)).await;
  restore_unit(&ctx_data, unit);
  let order = inserted?;

  debug!(order_id = %order.id, "Order header staged.");
  ctx_data.write().order = Some(order);
  Ok(PipelineControl::Continue)
}

async fn write_order_items(ctx_data: ContextData<CheckoutCtxData>) -> Result<PipelineControl, AppError> {
  let (order_id, lines) = {
    let guard = ctx_data.read();
    let order_id = guard
      .order
      .as_ref()
      .map(|o| o.id)
      .ok_or_else(|| AppError::Internal("order missing before item write".to_string()))?;
    (order_id, guard.lines.clone())
  };

  let mut unit = take_unit(&ctx_data)?;
  let mut written = 0usize;
  let mut outcome = Ok(());
  for line in &lines {
    let Some(price) = line.current_price else {
      continue;
    };
    let item = NewOrderItem {
      order_id,
      product_id: line.product_id,
      quantity: line.quantity,
      price,
    };
    if let Err(e) = before_deadline(&ctx_data, "order item insert", unit.insert_order_item(item)).await {
      outcome = Err(e);
      break;
    }
    written += 1;
  }
  restore_unit(&ctx_data, unit);
  outcome?;

  ctx_data.write().items_written = written;
  Ok(PipelineControl::Continue)
}

async fn clear_cart_lines(ctx_data: ContextData<CheckoutCtxData>) -> Result<PipelineControl, AppError> {
  let line_ids: Vec<Uuid> = ctx_data.read().lines.iter().map(|line| line.line_id).collect();

  let mut unit = take_unit(&ctx_data)?;
  let deleted = before_deadline(&ctx_data, "cart clear", unit.delete_cart_lines(&line_ids)).await;
  restore_unit(&ctx_data, unit);
  let deleted = deleted?;

  if deleted != line_ids.len() as u64 {
    return Err(AppError::OrderCreationFailed(format!(
      "expected to clear {} cart lines, cleared {}",
      line_ids.len(),
      deleted
    )));
  }
  ctx_data.write().lines_cleared = deleted;
  Ok(PipelineControl::Continue)
}

async fn commit_unit_of_work(ctx_data: ContextData<CheckoutCtxData>) -> Result<PipelineControl, AppError> {
  let unit = take_unit(&ctx_data)?;
  unit.commit().await.map_err(|e| order_failed("commit", e))?;

  let mut guard = ctx_data.write();
  guard.committed = true;
  if let Some(order) = guard.order.as_ref() {
    info!(
      order_id = %order.id,
      items = guard.items_written,
      lines_cleared = guard.lines_cleared,
      total = %guard.total,
      "Order committed."
    );
  }
  Ok(PipelineControl::Continue)
}
