// core/tests/common/mod.rs
#![allow(dead_code)] // Each test crate uses a different subset of these helpers.

use agri_workflow::WorkflowError;
use once_cell::sync::Lazy;
use tracing::Level;

#[derive(Debug, Default)]
pub struct TraceCtx {
  pub steps_executed: Vec<String>,
  pub stop_at: Option<String>,
  pub skip_second: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum TestError {
  #[error("handler failed: {0}")]
  Handler(String),

  #[error(transparent)]
  Workflow(#[from] WorkflowError),
}

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
