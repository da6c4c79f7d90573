// src/web/handlers/report_handlers.rs

//! Admin-only sales reports.

use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::instrument;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::AuthenticatedUser;

#[instrument(name = "handler::report_top_products", skip(app_state, auth), fields(user_id = %auth.user_id()))]
pub async fn top_products_handler(app_state: web::Data<AppState>, auth: AuthenticatedUser) -> Result<HttpResponse, AppError> {
  let products = app_state.orders.top_products(auth.role()).await?;
  Ok(HttpResponse::Ok().json(json!({ "products": products })))
}

#[instrument(name = "handler::report_sales_summary", skip(app_state, auth), fields(user_id = %auth.user_id()))]
pub async fn sales_summary_handler(app_state: web::Data<AppState>, auth: AuthenticatedUser) -> Result<HttpResponse, AppError> {
  let summary = app_state.orders.sales_summary(auth.role()).await?;
  Ok(HttpResponse::Ok().json(summary))
}

#[instrument(name = "handler::report_user_activity", skip(app_state, auth), fields(user_id = %auth.user_id()))]
pub async fn user_activity_handler(app_state: web::Data<AppState>, auth: AuthenticatedUser) -> Result<HttpResponse, AppError> {
  let users = app_state.orders.customer_spend(auth.role()).await?;
  Ok(HttpResponse::Ok().json(json!({ "users": users })))
}
