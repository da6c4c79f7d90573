// core/src/registry.rs

//! `Workflows`: a registry of pipelines keyed by their context type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{event, Level};

use crate::context_data::ContextData;
use crate::control::PipelineResult;
use crate::error::WorkflowError;
use crate::pipeline::Pipeline;

#[async_trait]
trait ErasedWorkflow<Err: Send + 'static>: Send + Sync {
  /// `ctx_obj` must box a `ContextData<TData>` for this workflow's `TData`.
  async fn run_erased(&self, ctx_obj: Box<dyn Any + Send>) -> Result<PipelineResult, Err>;
}

#[async_trait]
impl<TData, Err> ErasedWorkflow<Err> for Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  async fn run_erased(&self, ctx_obj: Box<dyn Any + Send>) -> Result<PipelineResult, Err> {
    match ctx_obj.downcast::<ContextData<TData>>() {
      Ok(ctx_data) => self.run(*ctx_data).await,
      Err(_) => Err(Err::from(WorkflowError::TypeMismatch {
        expected_type: std::any::type_name::<ContextData<TData>>().to_string(),
      })),
    }
  }
}

pub struct Workflows<Err>
where
  Err: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  registry: RwLock<HashMap<TypeId, Arc<dyn ErasedWorkflow<Err>>>>,
}

impl<Err> Default for Workflows<Err>
where
  Err: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  fn default() -> Self {
    Self {
      registry: RwLock::new(HashMap::new()),
    }
  }
}

impl<Err> Workflows<Err>
where
  Err: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers `pipeline` as the workflow for contexts of type `TData`,
  /// replacing any earlier registration.
  pub fn register_pipeline<TData: 'static + Send + Sync>(&self, pipeline: Pipeline<TData, Err>) {
    event!(
      Level::DEBUG,
      workflow = pipeline.name(),
      context_type = %std::any::type_name::<TData>(),
      "Registering workflow."
    );
    self
      .registry
      .write()
      .insert(TypeId::of::<TData>(), Arc::new(pipeline));
  }

  pub fn is_registered<TData: 'static + Send + Sync>(&self) -> bool {
    self.registry.read().contains_key(&TypeId::of::<TData>())
  }

  /// Runs the workflow registered for `TData`.
  pub async fn run<TData: 'static + Send + Sync>(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, Err> {
    let runner = self
      .registry
      .read()
      .get(&TypeId::of::<TData>())
      .cloned()
      .ok_or_else(|| {
        let context_type = std::any::type_name::<TData>().to_string();
        event!(Level::ERROR, %context_type, "No workflow registered.");
        Err::from(WorkflowError::NotRegistered { context_type })
      })?;

    runner.run_erased(Box::new(ctx_data)).await
  }
}
