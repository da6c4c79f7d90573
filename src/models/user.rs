// src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Buyer,
  Seller,
  Admin,
}

impl Role {
  pub fn as_str(&self) -> &'static str {
    match self {
      Role::Buyer => "buyer",
      Role::Seller => "seller",
      Role::Admin => "admin",
    }
  }

  pub fn can_sell(&self) -> bool {
    matches!(self, Role::Seller | Role::Admin)
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Role {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "buyer" => Ok(Role::Buyer),
      "seller" => Ok(Role::Seller),
      "admin" => Ok(Role::Admin),
      other => Err(format!("unknown role '{}'", other)),
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
  pub id: Uuid,
  pub name: String,
  pub email: String,
  #[serde(skip_serializing)] // Never send password hash to client
  pub password_hash: String,
  pub role: Role,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
  pub name: String,
  pub email: String,
  pub password_hash: String,
  pub role: Role,
}
