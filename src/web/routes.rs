// src/web/routes.rs

use actix_web::{error, web, HttpRequest, HttpResponse};
use serde_json::json;
use tracing::error;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::handlers::{auth_handlers, cart_handlers, order_handlers, product_handlers, report_handlers};

async fn health_check_handler(app_state: web::Data<AppState>) -> HttpResponse {
  match app_state.store.ping().await {
    Ok(()) => HttpResponse::Ok().json(json!({ "status": "ok" })),
    Err(e) => {
      error!(error = %e, "Health check failed.");
      HttpResponse::ServiceUnavailable().json(json!({ "status": "unavailable" }))
    }
  }
}

fn json_error(err: error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
  AppError::InvalidInput(format!("Malformed JSON body: {}", err)).into()
}

fn query_error(err: error::QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
  AppError::InvalidInput(format!("Malformed query string: {}", err)).into()
}

fn path_error(err: error::PathError, _req: &HttpRequest) -> actix_web::Error {
  AppError::InvalidInput(format!("Malformed path parameter: {}", err)).into()
}

/// Mounts the `/api` surface and the extractor configs that route request
/// parse failures through `AppError`.
pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg
    .app_data(web::JsonConfig::default().error_handler(json_error))
    .app_data(web::QueryConfig::default().error_handler(query_error))
    .app_data(web::PathConfig::default().error_handler(path_error))
    .service(
      web::scope("/api")
        .route("/health", web::get().to(health_check_handler))
        .service(
          web::scope("/auth")
            .route("/register", web::post().to(auth_handlers::register_handler))
            .route("/login", web::post().to(auth_handlers::login_handler))
            .route("/me", web::get().to(auth_handlers::me_handler)),
        )
        .service(
          web::scope("/products")
            .route("", web::get().to(product_handlers::list_products_handler))
            .route("", web::post().to(product_handlers::create_product_handler))
            .route("/{product_id}", web::get().to(product_handlers::get_product_handler))
            .route("/{product_id}", web::put().to(product_handlers::update_product_handler))
            .route("/{product_id}", web::delete().to(product_handlers::delete_product_handler)),
        )
        .service(
          web::scope("/cart")
            .route("", web::get().to(cart_handlers::view_cart_handler))
            .route("", web::post().to(cart_handlers::add_to_cart_handler))
            .route("/{line_id}", web::put().to(cart_handlers::update_cart_line_handler))
            .route("/{line_id}", web::delete().to(cart_handlers::remove_cart_line_handler)),
        )
        .service(
          web::scope("/orders")
            .route("", web::get().to(order_handlers::list_orders_handler))
            .route("", web::post().to(order_handlers::checkout_handler))
            .route("/{order_id}", web::get().to(order_handlers::get_order_handler)),
        )
        .service(
          web::scope("/admin/reports")
            .route("/top-products", web::get().to(report_handlers::top_products_handler))
            .route("/sales-summary", web::get().to(report_handlers::sales_summary_handler))
            .route("/user-activity", web::get().to(report_handlers::user_activity_handler)),
        ),
    );
}
