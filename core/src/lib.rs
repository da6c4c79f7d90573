// core/src/lib.rs

//! Named-step async workflow engine.
//!
//! A [`Pipeline`] is an ordered list of named steps. Each step may carry
//! `before`, `on` and `after` handlers that receive a shared
//! [`ContextData`] and return a [`PipelineControl`] signal. Pipelines are
//! registered once in a [`Workflows`] registry keyed by their context type and
//! dispatched by that type.
//!
//! Handlers fail with the pipeline's error type `Err`, which must be able to
//! carry the engine's own [`WorkflowError`].

pub mod context_data;
pub mod control;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod step;

pub use context_data::ContextData;
pub use control::{PipelineControl, PipelineResult};
pub use error::WorkflowError;
pub use pipeline::{Handler, Pipeline};
pub use registry::Workflows;
pub use step::{SkipCondition, StepDef};
