// src/web/extractors.rs

//! Bearer-token authentication as an actix extractor.

use futures_util::future::{ready, Ready};

use actix_web::http::header::AUTHORIZATION;
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::Role;
use crate::services::Claims;
use crate::state::AppState;

const TOKEN_MISSING: &str = "Token is missing";
const TOKEN_INVALID: &str = "Token is invalid";

/// Identity of the caller, taken from a verified `Authorization: Bearer` token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Claims);

impl AuthenticatedUser {
  pub fn user_id(&self) -> Uuid {
    self.0.user_id
  }

  pub fn role(&self) -> Role {
    self.0.role
  }
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
  let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
  let (scheme, token) = value.trim().split_once(' ')?;
  if !scheme.eq_ignore_ascii_case("bearer") {
    return None;
  }
  let token = token.trim();
  (!token.is_empty()).then_some(token)
}

fn authenticate(req: &HttpRequest) -> Result<AuthenticatedUser, AppError> {
  let state = req
    .app_data::<web::Data<AppState>>()
    .ok_or_else(|| AppError::Internal("application state is not configured".to_string()))?;

  let token = bearer_token(req).ok_or_else(|| AppError::Unauthorized(TOKEN_MISSING.to_string()))?;
  match state.tokens.verify(token) {
    Ok(claims) => {
      debug!(user_id = %claims.user_id, "Bearer token accepted.");
      Ok(AuthenticatedUser(claims))
    }
    Err(token_err) => {
      warn!(reason = %token_err, "Bearer token rejected.");
      Err(AppError::Forbidden(TOKEN_INVALID.to_string()))
    }
  }
}

impl FromRequest for AuthenticatedUser {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    ready(authenticate(req))
  }
}
