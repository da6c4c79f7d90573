// src/web/handlers/order_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::services::CheckoutRequest;
use crate::state::AppState;
use crate::web::AuthenticatedUser;

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

#[derive(Deserialize, Debug)]
pub struct CheckoutPayload {
  #[serde(rename = "shippingAddress", alias = "shipping_address", default)]
  pub shipping_address: String,
  #[serde(rename = "paymentMethod", alias = "payment_method", default)]
  pub payment_method: String,
}

fn idempotency_key(req: &HttpRequest) -> Result<Option<String>, AppError> {
  match req.headers().get(IDEMPOTENCY_KEY_HEADER) {
    None => Ok(None),
    Some(value) => value
      .to_str()
      .map(|key| Some(key.to_string()))
      .map_err(|_| AppError::InvalidInput("Idempotency key must be visible ASCII".to_string())),
  }
}

#[instrument(name = "handler::checkout", skip(app_state, auth, req, req_payload), fields(user_id = %auth.user_id()))]
pub async fn checkout_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
  req: HttpRequest,
  req_payload: web::Json<CheckoutPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let request = CheckoutRequest {
    shipping_address: payload.shipping_address,
    payment_method: payload.payment_method,
    idempotency_key: idempotency_key(&req)?,
  };

  let receipt = app_state.fulfillment.checkout(auth.user_id(), request).await?;
  let body = json!({
    "message": "Order placed",
    "order_id": receipt.order_id,
    "total": receipt.total,
    "replayed": receipt.replayed,
  });
  if receipt.replayed {
    info!(order_id = %receipt.order_id, "Returning replayed order.");
    return Ok(HttpResponse::Ok().json(body));
  }
  Ok(HttpResponse::Created().json(body))
}

#[instrument(name = "handler::list_orders", skip(app_state, auth), fields(user_id = %auth.user_id()))]
pub async fn list_orders_handler(app_state: web::Data<AppState>, auth: AuthenticatedUser) -> Result<HttpResponse, AppError> {
  let orders = app_state.orders.list(auth.user_id()).await?;
  Ok(HttpResponse::Ok().json(json!({ "orders": orders })))
}

#[instrument(name = "handler::get_order", skip(app_state, auth), fields(user_id = %auth.user_id()))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order = app_state.orders.get(auth.user_id(), path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(json!({ "order": order })))
}
