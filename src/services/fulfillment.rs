// src/services/fulfillment.rs

//! Order Fulfillment Engine: runs the checkout workflow with a storage
//! deadline and guarantees the unit of work is released on every path.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::OrderItem;
use crate::pipelines::contexts::CheckoutCtxData;
use crate::store::Store;
use crate::workflow::{ContextData, PipelineResult, Workflows};

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
  pub shipping_address: String,
  pub payment_method: String,
  pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutReceipt {
  pub order_id: Uuid,
  pub total: Decimal,
  /// True when an earlier order was returned for a repeated idempotency key.
  pub replayed: bool,
}

#[derive(Clone)]
pub struct OrderFulfillment {
  store: Arc<dyn Store>,
  workflows: Arc<Workflows>,
  storage_timeout: Duration,
}

impl OrderFulfillment {
  pub fn new(store: Arc<dyn Store>, workflows: Arc<Workflows>, storage_timeout: Duration) -> Self {
    Self {
      store,
      workflows,
      storage_timeout,
    }
  }

  #[instrument(
    name = "fulfillment::checkout",
    skip(self, request),
    fields(idempotency_key = request.idempotency_key.as_deref()),
    err(Display)
  )]
  pub async fn checkout(&self, user_id: Uuid, request: CheckoutRequest) -> Result<CheckoutReceipt> {
    let ctx_data = ContextData::new(CheckoutCtxData::new(
      self.store.clone(),
      user_id,
      request.shipping_address,
      request.payment_method,
      request.idempotency_key,
      Instant::now() + self.storage_timeout,
    ));

    // The deadline bounds the lock wait and pre-commit writes only; a commit
    // that has started is always awaited.
    let outcome = self.workflows.run(ctx_data.clone()).await;

    // Replays stop before commit and failures may leave the unit open.
    let leftover = ctx_data.read().unit.take();
    if let Some(unit) = leftover {
      if let Err(e) = unit.rollback().await {
        warn!(error = %e, "Rolling back checkout unit failed; connection drop will release it.");
      }
    }

    match outcome {
      Ok(PipelineResult::Completed) => {
        let (order_id, total, committed) = {
          let guard = ctx_data.read();
          (guard.order.as_ref().map(|o| o.id), guard.total, guard.committed)
        };
        match (order_id, committed) {
          (Some(order_id), true) => {
            info!(%order_id, %total, "Checkout completed.");
            Ok(CheckoutReceipt {
              order_id,
              total,
              replayed: false,
            })
          }
          _ => Err(AppError::OrderCreationFailed("checkout finished without a committed order".to_string())),
        }
      }
      Ok(PipelineResult::Stopped) => {
        let (order_id, replayed) = {
          let guard = ctx_data.read();
          (guard.order.as_ref().map(|o| o.id), guard.replayed)
        };
        match (order_id, replayed) {
          (Some(order_id), true) => {
            let items = self
              .store
              .order_items(order_id)
              .await
              .map_err(|e| AppError::OrderCreationFailed(format!("replay lookup: {}", e)))?;
            let total = items.iter().map(OrderItem::line_total).sum();
            info!(%order_id, "Checkout replayed.");
            Ok(CheckoutReceipt {
              order_id,
              total,
              replayed: true,
            })
          }
          _ => Err(AppError::OrderCreationFailed("checkout stopped unexpectedly".to_string())),
        }
      }
      Err(e @ (AppError::InvalidInput(_) | AppError::EmptyCart | AppError::OrderCreationFailed(_))) => Err(e),
      Err(other) => Err(AppError::OrderCreationFailed(other.to_string())),
    }
  }
}
