// src/services/order_query.rs

//! Order Query Service: read-only views over committed orders, scoped to
//! their owner, plus admin reports.

use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::{OrderDetail, OrderSummary, Role};
use crate::store::{CustomerSpend, SalesSummary, Store, TopProduct};

pub const REPORT_LIMIT: i64 = 10;

fn require_admin(role: Role) -> Result<()> {
  if role != Role::Admin {
    return Err(AppError::Forbidden("Admin access required".to_string()));
  }
  Ok(())
}

#[derive(Clone)]
pub struct OrderQueryService {
  store: Arc<dyn Store>,
}

impl OrderQueryService {
  pub fn new(store: Arc<dyn Store>) -> Self {
    Self { store }
  }

  /// Orders owned by someone else are reported as absent.
  #[instrument(name = "order_query::get", skip(self), err(Display))]
  pub async fn get(&self, user_id: Uuid, order_id: Uuid) -> Result<OrderDetail> {
    let order = self
      .store
      .find_order_for_user(user_id, order_id)
      .await?
      .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    let items = self.store.order_item_views(order.id).await?;
    Ok(OrderDetail::new(order, items))
  }

  #[instrument(name = "order_query::list", skip(self), err(Display))]
  pub async fn list(&self, user_id: Uuid) -> Result<Vec<OrderSummary>> {
    let orders = self.store.list_orders_for_user(user_id).await?;
    Ok(orders.iter().map(OrderSummary::from).collect())
  }

  #[instrument(name = "order_query::top_products", skip(self), err(Display))]
  pub async fn top_products(&self, role: Role) -> Result<Vec<TopProduct>> {
    require_admin(role)?;
    Ok(self.store.top_products(REPORT_LIMIT).await?)
  }

  #[instrument(name = "order_query::sales_summary", skip(self), err(Display))]
  pub async fn sales_summary(&self, role: Role) -> Result<SalesSummary> {
    require_admin(role)?;
    Ok(self.store.sales_summary().await?)
  }

  #[instrument(name = "order_query::customer_spend", skip(self), err(Display))]
  pub async fn customer_spend(&self, role: Role) -> Result<Vec<CustomerSpend>> {
    require_admin(role)?;
    Ok(self.store.customer_spend(REPORT_LIMIT).await?)
  }
}
