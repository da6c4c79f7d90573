// src/errors.rs

//! Application error taxonomy and its HTTP mapping.
//!
//! Internal causes (storage faults, workflow misconfiguration, token detail)
//! are logged when the error is rendered but never leak into response bodies.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;
use crate::workflow::WorkflowError;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Invalid input: {0}")]
  InvalidInput(String),

  #[error("Invalid quantity: {0}")]
  InvalidQuantity(String),

  #[error("Product unavailable: {0}")]
  ProductUnavailable(String),

  #[error("Authentication required: {0}")]
  Unauthorized(String),

  #[error("Access denied: {0}")]
  Forbidden(String),

  #[error("Resource not found: {0}")]
  NotFound(String),

  #[error("Conflict: {0}")]
  Conflict(String),

  #[error("Cart is empty")]
  EmptyCart,

  #[error("Order creation failed: {0}")]
  OrderCreationFailed(String),

  #[error("Configuration error: {0}")]
  Config(String),

  #[error("Storage error: {0}")]
  Store(#[from] StoreError),

  #[error("Workflow error: {source}")]
  Workflow {
    #[from]
    source: WorkflowError,
  },

  #[error("Internal server error: {0}")]
  Internal(String),
}

impl AppError {
  /// Message that is safe to show to a client.
  fn public_message(&self) -> String {
    match self {
      AppError::InvalidInput(m)
      | AppError::InvalidQuantity(m)
      | AppError::ProductUnavailable(m)
      | AppError::NotFound(m)
      | AppError::Conflict(m)
      | AppError::Unauthorized(m)
      | AppError::Forbidden(m) => m.clone(),
      AppError::EmptyCart => "Cart is empty".to_string(),
      AppError::OrderCreationFailed(_) => "Order failed".to_string(),
      AppError::Config(_) | AppError::Store(_) | AppError::Workflow { .. } | AppError::Internal(_) => {
        "Server error".to_string()
      }
    }
  }
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<StoreError>() {
      Ok(store_err) => AppError::Store(store_err),
      Err(other) => AppError::Internal(other.to_string()),
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::InvalidInput(_)
      | AppError::InvalidQuantity(_)
      | AppError::ProductUnavailable(_)
      | AppError::EmptyCart => StatusCode::BAD_REQUEST,
      AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      AppError::Forbidden(_) => StatusCode::FORBIDDEN,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Conflict(_) => StatusCode::CONFLICT,
      AppError::OrderCreationFailed(_)
      | AppError::Config(_)
      | AppError::Store(_)
      | AppError::Workflow { .. }
      | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with server error");
    } else {
      tracing::warn!(application_error = %self, status = status.as_u16(), "Responding with client error");
    }
    HttpResponse::build(status).json(json!({ "error": self.public_message() }))
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
