// src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Minimum HMAC key length accepted for identity tokens.
pub const MIN_TOKEN_SECRET_LEN: usize = 32;

/// Longest accepted identity token lifetime: one year.
pub const MAX_TOKEN_TTL_HOURS: i64 = 8760;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
  Postgres,
  Memory,
}

impl FromStr for StoreBackend {
  type Err = AppError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
      "memory" => Ok(StoreBackend::Memory),
      other => Err(AppError::Config(format!("Invalid STORE_BACKEND '{}'", other))),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

impl FromStr for LogFormat {
  type Err = AppError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "pretty" => Ok(LogFormat::Pretty),
      "json" => Ok(LogFormat::Json),
      other => Err(AppError::Config(format!("Invalid LOG_FORMAT '{}'", other))),
    }
  }
}

#[derive(Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub store_backend: StoreBackend,
  pub database_url: Option<String>,
  pub db_max_connections: u32,
  pub storage_timeout: Duration,
  pub run_migrations: bool,
  pub token_secret: String,
  pub token_ttl_hours: i64,
  pub log_format: LogFormat,
}

// Hand-written so the token secret and database credentials stay out of logs.
impl std::fmt::Debug for AppConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AppConfig")
      .field("server_host", &self.server_host)
      .field("server_port", &self.server_port)
      .field("store_backend", &self.store_backend)
      .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
      .field("db_max_connections", &self.db_max_connections)
      .field("storage_timeout", &self.storage_timeout)
      .field("run_migrations", &self.run_migrations)
      .field("token_secret", &"[REDACTED]")
      .field("token_ttl_hours", &self.token_ttl_hours)
      .field("log_format", &self.log_format)
      .finish()
  }
}

fn parse_var<T>(var_name: &str, raw: &str) -> Result<T>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  raw
    .trim()
    .parse::<T>()
    .map_err(|e| AppError::Config(format!("Invalid {}: {}", var_name, e)))
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present

    let get_env = |var_name: &str| {
      env::var(var_name).map_err(|e| AppError::Config(format!("Missing environment variable '{}': {}", var_name, e)))
    };

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let server_port = parse_var::<u16>("SERVER_PORT", &get_env("SERVER_PORT").unwrap_or_else(|_| "8080".to_string()))?;

    let store_backend: StoreBackend = get_env("STORE_BACKEND").unwrap_or_else(|_| "postgres".to_string()).parse()?;
    let database_url = match store_backend {
      StoreBackend::Postgres => Some(get_env("DATABASE_URL")?),
      StoreBackend::Memory => get_env("DATABASE_URL").ok(),
    };
    let db_max_connections =
      parse_var::<u32>("DB_MAX_CONNECTIONS", &get_env("DB_MAX_CONNECTIONS").unwrap_or_else(|_| "10".to_string()))?;

    let storage_timeout_ms =
      parse_var::<u64>("STORAGE_TIMEOUT_MS", &get_env("STORAGE_TIMEOUT_MS").unwrap_or_else(|_| "5000".to_string()))?;

    let run_migrations =
      parse_var::<bool>("RUN_MIGRATIONS", &get_env("RUN_MIGRATIONS").unwrap_or_else(|_| "true".to_string()))?;

    let token_secret = get_env("TOKEN_SECRET")?;
    let token_ttl_hours =
      parse_var::<i64>("TOKEN_TTL_HOURS", &get_env("TOKEN_TTL_HOURS").unwrap_or_else(|_| "24".to_string()))?;

    let log_format: LogFormat = get_env("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()).parse()?;

    let config = Self {
      server_host,
      server_port,
      store_backend,
      database_url,
      db_max_connections,
      storage_timeout: Duration::from_millis(storage_timeout_ms),
      run_migrations,
      token_secret,
      token_ttl_hours,
      log_format,
    };
    config.validate()?;
    tracing::info!(config = ?config, "Application configuration loaded successfully.");
    Ok(config)
  }

  /// Range checks shared by every way of building a config.
  pub fn validate(&self) -> Result<()> {
    if self.db_max_connections == 0 {
      return Err(AppError::Config("DB_MAX_CONNECTIONS must be at least 1".to_string()));
    }
    if self.storage_timeout.is_zero() {
      return Err(AppError::Config("STORAGE_TIMEOUT_MS must be positive".to_string()));
    }
    if self.token_secret.len() < MIN_TOKEN_SECRET_LEN {
      return Err(AppError::Config(format!(
        "TOKEN_SECRET must be at least {} bytes",
        MIN_TOKEN_SECRET_LEN
      )));
    }
    if !(1..=MAX_TOKEN_TTL_HOURS).contains(&self.token_ttl_hours) {
      return Err(AppError::Config(format!(
        "TOKEN_TTL_HOURS must be between 1 and {}",
        MAX_TOKEN_TTL_HOURS
      )));
    }
    Ok(())
  }

  /// Configuration for in-process use (tests, local experiments): memory
  /// backend, no database.
  pub fn for_memory(token_secret: impl Into<String>) -> Self {
    Self {
      server_host: "127.0.0.1".to_string(),
      server_port: 0,
      store_backend: StoreBackend::Memory,
      database_url: None,
      db_max_connections: 1,
      storage_timeout: Duration::from_secs(5),
      run_migrations: false,
      token_secret: token_secret.into(),
      token_ttl_hours: 24,
      log_format: LogFormat::Pretty,
    }
  }

  pub fn server_address(&self) -> String {
    format!("{}:{}", self.server_host, self.server_port)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SECRET: &str = "0123456789abcdef0123456789abcdef";

  #[test]
  fn memory_config_is_valid() {
    assert!(AppConfig::for_memory(SECRET).validate().is_ok());
  }

  #[test]
  fn token_ttl_must_stay_within_a_year() {
    let mut config = AppConfig::for_memory(SECRET);
    config.token_ttl_hours = MAX_TOKEN_TTL_HOURS;
    assert!(config.validate().is_ok());

    for bad in [0, -1, MAX_TOKEN_TTL_HOURS + 1, 1_000_000_000_000] {
      config.token_ttl_hours = bad;
      assert!(matches!(config.validate(), Err(AppError::Config(_))), "ttl {} accepted", bad);
    }
  }

  #[test]
  fn short_secret_and_zero_limits_are_rejected() {
    let short = AppConfig::for_memory("too-short");
    assert!(matches!(short.validate(), Err(AppError::Config(_))));

    let mut config = AppConfig::for_memory(SECRET);
    config.storage_timeout = Duration::ZERO;
    assert!(matches!(config.validate(), Err(AppError::Config(_))));

    let mut config = AppConfig::for_memory(SECRET);
    config.db_max_connections = 0;
    assert!(matches!(config.validate(), Err(AppError::Config(_))));
  }

  #[test]
  fn backend_and_log_format_parse_case_insensitively() {
    assert_eq!("Memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
    assert_eq!("postgresql".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
    assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
    assert!("sqlite".parse::<StoreBackend>().is_err());
  }
}
