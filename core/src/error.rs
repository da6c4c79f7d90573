// core/src/error.rs

use thiserror::Error;

/// Failures raised by the engine itself rather than by step handlers.
#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("Handler missing for non-optional step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("No workflow registered for context type {context_type}")]
  NotRegistered { context_type: String },

  #[error("Context type mismatch during dispatch (expected {expected_type})")]
  TypeMismatch { expected_type: String },
}
