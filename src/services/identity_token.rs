// src/services/identity_token.rs

//! Identity Token Service: issues and verifies HS256-signed bearer tokens.
//!
//! Format is `header.claims.signature`, each segment base64url without
//! padding. The signature is HMAC-SHA256 over `header.claims`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::models::{Role, User};

type HmacSha256 = Hmac<Sha256>;

const TOKEN_ALG: &str = "HS256";
const TOKEN_TYP: &str = "JWT";
const MAX_TOKEN_LEN: usize = 2048;

/// Verification detail. Logged, never shown to clients.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
  #[error("token is malformed: {0}")]
  Malformed(&'static str),
  #[error("token algorithm '{0}' is not supported")]
  UnsupportedAlgorithm(String),
  #[error("token signature mismatch")]
  BadSignature,
  #[error("token claims are invalid: {0}")]
  InvalidClaims(String),
  #[error("token expired")]
  Expired,
  #[error("token signing failed: {0}")]
  Signing(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenHeader {
  alg: String,
  typ: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
  pub user_id: Uuid,
  pub email: String,
  pub role: Role,
  /// Issued-at, seconds since the Unix epoch.
  pub iat: i64,
  /// Expiry, seconds since the Unix epoch.
  pub exp: i64,
}

#[derive(Clone)]
pub struct IdentityTokenService {
  secret: Vec<u8>,
  ttl: Duration,
}

impl std::fmt::Debug for IdentityTokenService {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("IdentityTokenService").field("ttl", &self.ttl).finish_non_exhaustive()
  }
}

impl IdentityTokenService {
  pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
    Self {
      secret: secret.as_ref().to_vec(),
      ttl,
    }
  }

  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  fn mac(&self) -> Result<HmacSha256, TokenError> {
    HmacSha256::new_from_slice(&self.secret).map_err(|e| TokenError::Signing(e.to_string()))
  }

  #[instrument(name = "identity_token::issue", skip(self, user), fields(user_id = %user.id), err(Display))]
  pub fn issue(&self, user: &User) -> Result<String, TokenError> {
    self.issue_at(user, Utc::now())
  }

  pub fn issue_at(&self, user: &User, now: DateTime<Utc>) -> Result<String, TokenError> {
    let expires_at = now
      .checked_add_signed(self.ttl)
      .ok_or_else(|| TokenError::Signing("token expiry is out of range".to_string()))?;
    let claims = Claims {
      user_id: user.id,
      email: user.email.clone(),
      role: user.role,
      iat: now.timestamp(),
      exp: expires_at.timestamp(),
    };
    self.sign(&claims)
  }

  /// Signs arbitrary claims. Expiry is taken as given.
  pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
    let header = TokenHeader {
      alg: TOKEN_ALG.to_string(),
      typ: TOKEN_TYP.to_string(),
    };
    let header_json = serde_json::to_vec(&header).map_err(|e| TokenError::Signing(e.to_string()))?;
    let claims_json = serde_json::to_vec(claims).map_err(|e| TokenError::Signing(e.to_string()))?;
    let signing_input = format!("{}.{}", URL_SAFE_NO_PAD.encode(header_json), URL_SAFE_NO_PAD.encode(claims_json));

    let mut mac = self.mac()?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    Ok(format!("{}.{}", signing_input, signature))
  }

  pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
    self.verify_at(token, Utc::now())
  }

  pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
    if token.len() > MAX_TOKEN_LEN {
      return Err(TokenError::Malformed("token exceeds max length"));
    }
    let (header_part, claims_part, sig_part) = split_token(token)?;

    let mut mac = self.mac()?;
    mac.update(header_part.as_bytes());
    mac.update(b".");
    mac.update(claims_part.as_bytes());
    let signature = URL_SAFE_NO_PAD
      .decode(sig_part)
      .map_err(|_| TokenError::Malformed("signature segment is not base64url"))?;
    mac.verify_slice(&signature).map_err(|_| TokenError::BadSignature)?;

    let header_bytes = URL_SAFE_NO_PAD
      .decode(header_part)
      .map_err(|_| TokenError::Malformed("header segment is not base64url"))?;
    let header: TokenHeader =
      serde_json::from_slice(&header_bytes).map_err(|_| TokenError::Malformed("header segment is not JSON"))?;
    if header.alg != TOKEN_ALG {
      return Err(TokenError::UnsupportedAlgorithm(header.alg));
    }

    let claims_bytes = URL_SAFE_NO_PAD
      .decode(claims_part)
      .map_err(|_| TokenError::Malformed("claims segment is not base64url"))?;
    let claims: Claims =
      serde_json::from_slice(&claims_bytes).map_err(|e| TokenError::InvalidClaims(e.to_string()))?;

    if claims.exp <= now.timestamp() {
      debug!(user_id = %claims.user_id, exp = claims.exp, "Rejecting expired token.");
      return Err(TokenError::Expired);
    }
    Ok(claims)
  }
}

fn split_token(token: &str) -> Result<(&str, &str, &str), TokenError> {
  let parts: Vec<&str> = token.split('.').collect();
  match parts.as_slice() {
    [header, claims, sig] if !header.is_empty() && !claims.is_empty() && !sig.is_empty() => Ok((header, claims, sig)),
    [_, _, _] => Err(TokenError::Malformed("empty token segment")),
    _ => Err(TokenError::Malformed("expected three token segments")),
  }
}
