// src/web/handlers/cart_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::AuthenticatedUser;

#[derive(Deserialize, Debug)]
pub struct AddToCartPayload {
  #[serde(rename = "productId", alias = "product_id")]
  pub product_id: Uuid,
  #[serde(default = "default_quantity")]
  pub quantity: i32,
}

fn default_quantity() -> i32 {
  1
}

#[derive(Deserialize, Debug)]
pub struct UpdateCartLinePayload {
  pub quantity: i32,
}

#[instrument(name = "handler::add_to_cart", skip(app_state, auth), fields(user_id = %auth.user_id()))]
pub async fn add_to_cart_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
  req_payload: web::Json<AddToCartPayload>,
) -> Result<HttpResponse, AppError> {
  let line = app_state
    .cart
    .add_or_increment(auth.user_id(), req_payload.product_id, req_payload.quantity)
    .await?;
  Ok(HttpResponse::Created().json(json!({ "message": "Added to cart", "line": line })))
}

#[instrument(name = "handler::update_cart_line", skip(app_state, auth), fields(user_id = %auth.user_id()))]
pub async fn update_cart_line_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
  path: web::Path<Uuid>,
  req_payload: web::Json<UpdateCartLinePayload>,
) -> Result<HttpResponse, AppError> {
  let line = app_state
    .cart
    .set_quantity(auth.user_id(), path.into_inner(), req_payload.quantity)
    .await?;
  Ok(HttpResponse::Ok().json(json!({ "message": "Cart updated", "line": line })))
}

#[instrument(name = "handler::remove_cart_line", skip(app_state, auth), fields(user_id = %auth.user_id()))]
pub async fn remove_cart_line_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  app_state.cart.remove(auth.user_id(), path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(json!({ "message": "Removed from cart" })))
}

#[instrument(name = "handler::view_cart", skip(app_state, auth), fields(user_id = %auth.user_id()))]
pub async fn view_cart_handler(app_state: web::Data<AppState>, auth: AuthenticatedUser) -> Result<HttpResponse, AppError> {
  let cart = app_state.cart.view(auth.user_id()).await?;
  Ok(HttpResponse::Ok().json(cart))
}
