// src/main.rs

use std::sync::Arc;

use actix_web::{web as actix_data, App, HttpServer};
use agri_market::config::{AppConfig, LogFormat, StoreBackend};
use agri_market::state::AppState;
use agri_market::store::{MemoryStore, PgStore, Store};
use agri_market::web::configure_app_routes;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_span_events(FmtSpan::CLOSE);
  match format {
    LogFormat::Pretty => builder.init(),
    LogFormat::Json => builder.json().init(),
  }
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
  match config.store_backend {
    StoreBackend::Memory => {
      tracing::warn!("Using in-memory store; data is lost on shutdown.");
      Ok(Arc::new(MemoryStore::new()))
    }
    StoreBackend::Postgres => {
      let database_url = config
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for the postgres backend"))?;
      let store = PgStore::connect(database_url, config.db_max_connections, config.storage_timeout).await?;
      if config.run_migrations {
        store.migrate().await?;
      }
      Ok(Arc::new(store))
    }
  }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
  // Config is read before the subscriber exists so LOG_FORMAT can pick the layer.
  let app_config = match AppConfig::from_env() {
    Ok(cfg) => Arc::new(cfg),
    Err(e) => {
      eprintln!("Failed to load application configuration: {}", e);
      return Err(e.into());
    }
  };
  init_tracing(app_config.log_format);
  tracing::info!(config = ?app_config, "Starting marketplace server...");

  let store = build_store(&app_config).await.map_err(|e| {
    tracing::error!(error = %e, "Failed to initialise the store.");
    e
  })?;

  let app_state = AppState::new(store, app_config.clone());

  let server_address = app_config.server_address();
  tracing::info!("Binding server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await?;

  tracing::info!("Server shut down.");
  Ok(())
}
