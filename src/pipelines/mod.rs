// src/pipelines/mod.rs

//! Workflow definitions and their registration.

use crate::workflow::Workflows;

pub mod contexts;

pub mod cart_pipeline;
pub mod checkout_pipeline;
pub mod signin_pipeline;
pub mod signup_pipeline;

/// Registers every application workflow. Called once at start-up.
pub fn register_all_pipelines(workflows: &Workflows) {
  signup_pipeline::register_signup_pipeline(workflows);
  signin_pipeline::register_signin_pipeline(workflows);
  cart_pipeline::register_add_to_cart_pipeline(workflows);
  checkout_pipeline::register_checkout_pipeline(workflows);
  tracing::info!("Application workflows registered.");
}
