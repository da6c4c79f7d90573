// src/workflow.rs

//! The application's view of the workflow engine: pipelines and the registry
//! fixed to `AppError`.

pub use agri_workflow::{ContextData, PipelineControl, PipelineResult, SkipCondition, WorkflowError};

use crate::errors::AppError;

pub type Pipeline<TData> = agri_workflow::Pipeline<TData, AppError>;
pub type Workflows = agri_workflow::Workflows<AppError>;
