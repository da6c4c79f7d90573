// src/pipelines/signup_pipeline.rs

use tracing::{event, info, warn, Level};

use crate::errors::AppError;
use crate::models::NewUser;
use crate::pipelines::contexts::{parse_role, SignupCtxData};
use crate::services::auth_service;
use crate::store::StoreError;
use crate::workflow::{ContextData, Pipeline, PipelineControl, Workflows};

pub fn register_signup_pipeline(workflows: &Workflows) {
  let mut p = Pipeline::<SignupCtxData>::new(
    "signup",
    &[
      ("validate_signup_input", false, None),
      ("hash_user_password", false, None),
      ("create_user_record", false, None),
      ("issue_session_token", false, None),
    ],
  );

  p.on_root("validate_signup_input", |ctx_data| Box::pin(validate_signup_input(ctx_data)));
  p.on_root("hash_user_password", |ctx_data| Box::pin(hash_user_password(ctx_data)));
  p.on_root("create_user_record", |ctx_data| Box::pin(create_user_record(ctx_data)));
  p.on_root("issue_session_token", |ctx_data| Box::pin(issue_session_token(ctx_data)));

  workflows.register_pipeline(p);
}

async fn validate_signup_input(ctx_data: ContextData<SignupCtxData>) -> Result<PipelineControl, AppError> {
  let mut guard = ctx_data.write();
  guard.name = guard.name.trim().to_string();
  guard.email = guard.email.trim().to_lowercase();

  if guard.name.is_empty() {
    return Err(AppError::InvalidInput("Name is required".to_string()));
  }
  if guard.email.is_empty() || !guard.email.contains('@') {
    warn!("Signup rejected: malformed email.");
    return Err(AppError::InvalidInput("A valid email is required".to_string()));
  }
  if guard.password.is_empty() {
    return Err(AppError::InvalidInput("Password is required".to_string()));
  }
  parse_role(&guard.role)?;
  event!(Level::DEBUG, email = %guard.email, "Signup input validated.");
  Ok(PipelineControl::Continue)
}

async fn hash_user_password(ctx_data: ContextData<SignupCtxData>) -> Result<PipelineControl, AppError> {
  let password = ctx_data.read().password.clone();
  let password_hash = auth_service::hash_password(&password)?;
  ctx_data.write().password_hash = Some(password_hash);
  Ok(PipelineControl::Continue)
}

async fn create_user_record(ctx_data: ContextData<SignupCtxData>) -> Result<PipelineControl, AppError> {
  let (store, new_user) = {
    let guard = ctx_data.read();
    let password_hash = guard
      .password_hash
      .clone()
      .ok_or_else(|| AppError::Internal("password hash missing before user insert".to_string()))?;
    (
      guard.store.clone(),
      NewUser {
        name: guard.name.clone(),
        email: guard.email.clone(),
        password_hash,
        role: parse_role(&guard.role)?,
      },
    )
  };

  let email = new_user.email.clone();
  let user = match store.insert_user(new_user).await {
    Ok(user) => user,
    Err(StoreError::UniqueViolation(_)) => {
      warn!(%email, "Signup rejected: email already registered.");
      return Err(AppError::Conflict("Email already registered".to_string()));
    }
    Err(e) => return Err(e.into()),
  };

  info!(user_id = %user.id, role = %user.role, "User account created.");
  ctx_data.write().user = Some(user);
  Ok(PipelineControl::Continue)
}

async fn issue_session_token(ctx_data: ContextData<SignupCtxData>) -> Result<PipelineControl, AppError> {
  let token = {
    let guard = ctx_data.read();
    let user = guard
      .user
      .as_ref()
      .ok_or_else(|| AppError::Internal("user missing before token issue".to_string()))?;
    guard
      .tokens
      .issue(user)
      .map_err(|e| AppError::Internal(e.to_string()))?
  };
  ctx_data.write().token = Some(token);
  Ok(PipelineControl::Continue)
}
