// src/web/handlers/product_handlers.rs

use actix_web::{web, HttpResponse};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{ProductFilter, ProductUpdate};
use crate::services::catalog::ProductDraft;
use crate::state::AppState;
use crate::web::AuthenticatedUser;

#[derive(Deserialize, Debug, Default)]
pub struct ProductListQuery {
  pub search: Option<String>,
  pub category: Option<String>,
  pub organic: Option<bool>,
  pub availability: Option<bool>,
}

impl From<ProductListQuery> for ProductFilter {
  fn from(query: ProductListQuery) -> Self {
    let non_blank = |s: Option<String>| s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    ProductFilter {
      search: non_blank(query.search),
      category: non_blank(query.category),
      organic: query.organic,
      available: query.availability,
    }
  }
}

#[derive(Deserialize, Debug)]
pub struct CreateProductPayload {
  pub name: String,
  pub description: Option<String>,
  pub price: Decimal,
  pub unit: String,
  pub image_url: Option<String>,
  pub category: Option<String>,
  #[serde(default)]
  pub organic: bool,
  #[serde(default = "default_available")]
  pub available: bool,
  pub farm_id: Option<Uuid>,
}

fn default_available() -> bool {
  true
}

#[derive(Deserialize, Debug, Default)]
pub struct UpdateProductPayload {
  pub name: Option<String>,
  pub description: Option<String>,
  pub price: Option<Decimal>,
  pub unit: Option<String>,
  pub image_url: Option<String>,
  pub category: Option<String>,
  pub organic: Option<bool>,
  pub available: Option<bool>,
}

#[instrument(name = "handler::list_products", skip(app_state))]
pub async fn list_products_handler(
  app_state: web::Data<AppState>,
  query: web::Query<ProductListQuery>,
) -> Result<HttpResponse, AppError> {
  let products = app_state.catalog.list(query.into_inner().into()).await?;
  Ok(HttpResponse::Ok().json(json!({ "products": products })))
}

#[instrument(name = "handler::get_product", skip(app_state))]
pub async fn get_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let product = app_state.catalog.get(path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(json!({ "product": product })))
}

#[instrument(name = "handler::create_product", skip(app_state, auth, req_payload), fields(user_id = %auth.user_id()))]
pub async fn create_product_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
  req_payload: web::Json<CreateProductPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let draft = ProductDraft {
    farm_id: payload.farm_id,
    name: payload.name,
    description: payload.description,
    price: payload.price,
    unit: payload.unit,
    image_url: payload.image_url,
    category: payload.category,
    organic: payload.organic,
    available: payload.available,
  };
  let product = app_state.catalog.create(auth.user_id(), auth.role(), draft).await?;
  Ok(HttpResponse::Created().json(json!({ "product": product })))
}

#[instrument(name = "handler::update_product", skip(app_state, auth, req_payload), fields(user_id = %auth.user_id()))]
pub async fn update_product_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
  path: web::Path<Uuid>,
  req_payload: web::Json<UpdateProductPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let update = ProductUpdate {
    name: payload.name,
    description: payload.description,
    price: payload.price,
    unit: payload.unit,
    image_url: payload.image_url,
    category: payload.category,
    organic: payload.organic,
    available: payload.available,
  };
  let product = app_state.catalog.update(auth.user_id(), path.into_inner(), update).await?;
  Ok(HttpResponse::Ok().json(json!({ "product": product })))
}

#[instrument(name = "handler::delete_product", skip(app_state, auth), fields(user_id = %auth.user_id()))]
pub async fn delete_product_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  app_state.catalog.delete(auth.user_id(), path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(json!({ "message": "Product deleted" })))
}
