// src/pipelines/signin_pipeline.rs

use tracing::{info, warn};

use crate::errors::AppError;
use crate::pipelines::contexts::SigninCtxData;
use crate::services::auth_service;
use crate::workflow::{ContextData, Pipeline, PipelineControl, Workflows};

const BAD_CREDENTIALS: &str = "Invalid credentials";

pub fn register_signin_pipeline(workflows: &Workflows) {
  let mut p = Pipeline::<SigninCtxData>::new(
    "signin",
    &[
      ("load_user_by_email", false, None),
      ("verify_user_password", false, None),
      ("issue_session_token", false, None),
    ],
  );

  p.on_root("load_user_by_email", |ctx_data| Box::pin(load_user_by_email(ctx_data)));
  p.on_root("verify_user_password", |ctx_data| Box::pin(verify_user_password(ctx_data)));
  p.on_root("issue_session_token", |ctx_data| Box::pin(issue_session_token(ctx_data)));

  workflows.register_pipeline(p);
}

async fn load_user_by_email(ctx_data: ContextData<SigninCtxData>) -> Result<PipelineControl, AppError> {
  let (store, email) = {
    let guard = ctx_data.read();
    (guard.store.clone(), guard.email.trim().to_lowercase())
  };

  match store.find_user_by_email(&email).await? {
    Some(user) => {
      ctx_data.write().user = Some(user);
      Ok(PipelineControl::Continue)
    }
    None => {
      warn!("Sign-in failed: unknown email.");
      Err(AppError::Unauthorized(BAD_CREDENTIALS.to_string()))
    }
  }
}

async fn verify_user_password(ctx_data: ContextData<SigninCtxData>) -> Result<PipelineControl, AppError> {
  let (stored_hash, password) = {
    let guard = ctx_data.read();
    let user = guard
      .user
      .as_ref()
      .ok_or_else(|| AppError::Internal("user missing before password check".to_string()))?;
    (user.password_hash.clone(), guard.password.clone())
  };

  if !auth_service::verify_password(&stored_hash, &password)? {
    warn!("Sign-in failed: password mismatch.");
    return Err(AppError::Unauthorized(BAD_CREDENTIALS.to_string()));
  }
  Ok(PipelineControl::Continue)
}

async fn issue_session_token(ctx_data: ContextData<SigninCtxData>) -> Result<PipelineControl, AppError> {
  let (token, user_id) = {
    let guard = ctx_data.read();
    let user = guard
      .user
      .as_ref()
      .ok_or_else(|| AppError::Internal("user missing before token issue".to_string()))?;
    let token = guard.tokens.issue(user).map_err(|e| AppError::Internal(e.to_string()))?;
    (token, user.id)
  };
  info!(%user_id, "User signed in.");
  ctx_data.write().token = Some(token);
  Ok(PipelineControl::Continue)
}
