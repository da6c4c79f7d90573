// src/web/handlers/auth_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::pipelines::contexts::{SigninCtxData, SignupCtxData};
use crate::state::AppState;
use crate::web::AuthenticatedUser;
use crate::workflow::{ContextData, PipelineResult};

#[derive(Deserialize, Debug)]
pub struct RegisterRequestPayload {
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub email: String,
  #[serde(default)]
  pub password: String,
  #[serde(default)]
  pub role: String,
}

#[derive(Deserialize, Debug)]
pub struct LoginRequestPayload {
  #[serde(default)]
  pub email: String,
  #[serde(default)]
  pub password: String,
}

#[instrument(name = "handler::register", skip(app_state, req_payload), fields(req_email = %req_payload.email))]
pub async fn register_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<RegisterRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let ctx_data = ContextData::new(SignupCtxData {
    store: app_state.store.clone(),
    tokens: app_state.tokens.clone(),
    name: payload.name,
    email: payload.email,
    password: payload.password,
    role: payload.role,
    password_hash: None,
    user: None,
    token: None,
  });

  match app_state.workflows.run(ctx_data.clone()).await? {
    PipelineResult::Completed => {
      let guard = ctx_data.read();
      let (Some(user), Some(token)) = (guard.user.as_ref(), guard.token.as_ref()) else {
        return Err(AppError::Internal("signup completed without user or token".to_string()));
      };
      info!(user_id = %user.id, "Registration successful.");
      Ok(HttpResponse::Created().json(json!({ "user": user, "token": token })))
    }
    PipelineResult::Stopped => {
      warn!("Signup workflow stopped by a handler.");
      Err(AppError::Internal("Signup process was halted".to_string()))
    }
  }
}

#[instrument(name = "handler::login", skip(app_state, req_payload), fields(req_email = %req_payload.email))]
pub async fn login_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<LoginRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let ctx_data = ContextData::new(SigninCtxData {
    store: app_state.store.clone(),
    tokens: app_state.tokens.clone(),
    email: payload.email,
    password: payload.password,
    user: None,
    token: None,
  });

  match app_state.workflows.run(ctx_data.clone()).await? {
    PipelineResult::Completed => {
      let guard = ctx_data.read();
      let (Some(user), Some(token)) = (guard.user.as_ref(), guard.token.as_ref()) else {
        return Err(AppError::Internal("signin completed without user or token".to_string()));
      };
      Ok(HttpResponse::Ok().json(json!({ "user": user, "token": token })))
    }
    PipelineResult::Stopped => Err(AppError::Unauthorized("Invalid credentials".to_string())),
  }
}

#[instrument(name = "handler::me", skip(app_state, auth), fields(user_id = %auth.user_id()))]
pub async fn me_handler(app_state: web::Data<AppState>, auth: AuthenticatedUser) -> Result<HttpResponse, AppError> {
  let user = app_state
    .store
    .find_user_by_id(auth.user_id())
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
  Ok(HttpResponse::Ok().json(json!({ "user": user })))
}
