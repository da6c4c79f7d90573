// core/src/pipeline.rs

//! `Pipeline<TData, Err>`: step definitions, hook registration and execution.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use tracing::{event, instrument, span, Instrument, Level};

use crate::context_data::ContextData;
use crate::control::{PipelineControl, PipelineResult};
use crate::error::WorkflowError;
use crate::step::{SkipCondition, StepDef};

/// A step handler: takes a clone of the shared context and resolves to a
/// control signal or the pipeline's error.
pub type Handler<TData, Err> = Box<
  dyn Fn(ContextData<TData>) -> Pin<Box<dyn Future<Output = Result<PipelineControl, Err>> + Send>>
    + Send
    + Sync,
>;

#[derive(Debug, Clone, Copy)]
enum Phase {
  Before,
  On,
  After,
}

impl Phase {
  fn as_str(self) -> &'static str {
    match self {
      Phase::Before => "before",
      Phase::On => "on",
      Phase::After => "after",
    }
  }
}

pub struct Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  name: &'static str,
  steps: Vec<StepDef<TData>>,
  before: HashMap<String, Vec<Handler<TData, Err>>>,
  on: HashMap<String, Vec<Handler<TData, Err>>>,
  after: HashMap<String, Vec<Handler<TData, Err>>>,
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  /// Creates a pipeline from `(step_name, optional, skip_if)` triples.
  pub fn new(name: &'static str, step_defs: &[(&str, bool, Option<SkipCondition<TData>>)]) -> Self {
    let steps = step_defs
      .iter()
      .map(|(step_name, optional, skip_if)| StepDef {
        name: (*step_name).to_string(),
        optional: *optional,
        skip_if: skip_if.clone(),
      })
      .collect();

    Self {
      name,
      steps,
      before: HashMap::new(),
      on: HashMap::new(),
      after: HashMap::new(),
    }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  /// Registering a hook for an undeclared step is a wiring bug, caught at start-up.
  fn ensure_step_exists(&self, step_name: &str) {
    if !self.steps.iter().any(|s| s.name == step_name) {
      panic!(
        "workflow '{}' setup error: step '{}' not declared",
        self.name, step_name
      );
    }
  }

  fn wrap<F, HandlerErr>(handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static) -> Handler<TData, Err>
  where
    F: Future<Output = Result<PipelineControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<Err> + Send + 'static,
  {
    Box::new(move |ctx_data| {
      let fut = handler_fn(ctx_data);
      Box::pin(async move { fut.await.map_err(Into::into) })
    })
  }

  pub fn before_root<F, HandlerErr>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) where
    F: Future<Output = Result<PipelineControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<Err> + Send + 'static,
  {
    self.ensure_step_exists(step_name);
    self.before.entry(step_name.to_string()).or_default().push(Self::wrap(handler_fn));
  }

  pub fn on_root<F, HandlerErr>(&mut self, step_name: &str, handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static)
  where
    F: Future<Output = Result<PipelineControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<Err> + Send + 'static,
  {
    self.ensure_step_exists(step_name);
    self.on.entry(step_name.to_string()).or_default().push(Self::wrap(handler_fn));
  }

  pub fn after_root<F, HandlerErr>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) where
    F: Future<Output = Result<PipelineControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<Err> + Send + 'static,
  {
    self.ensure_step_exists(step_name);
    self.after.entry(step_name.to_string()).or_default().push(Self::wrap(handler_fn));
  }

  fn handlers(&self, phase: Phase, step_name: &str) -> &[Handler<TData, Err>] {
    let map = match phase {
      Phase::Before => &self.before,
      Phase::On => &self.on,
      Phase::After => &self.after,
    };
    map.get(step_name).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Runs one phase of a step. `Ok(false)` means a handler asked to stop.
  async fn run_phase(&self, phase: Phase, step_name: &str, ctx_data: &ContextData<TData>) -> Result<bool, Err> {
    for (handler_idx, handler_fn) in self.handlers(phase, step_name).iter().enumerate() {
      let handler_span = span!(Level::DEBUG, "step_handler", phase = phase.as_str(), handler_index = handler_idx);
      match handler_fn(ctx_data.clone()).instrument(handler_span).await {
        Ok(PipelineControl::Continue) => {}
        Ok(PipelineControl::Stop) => {
          event!(Level::INFO, step = step_name, phase = phase.as_str(), "Workflow stopped by handler.");
          return Ok(false);
        }
        Err(e) => {
          event!(Level::WARN, step = step_name, phase = phase.as_str(), error = %e, "Step handler failed.");
          return Err(e);
        }
      }
    }
    Ok(true)
  }

  /// Executes every step in declaration order against `ctx_data`.
  #[instrument(name = "Pipeline::run", skip_all, fields(workflow = self.name, num_steps = self.steps.len()), err(Display))]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, Err> {
    event!(Level::DEBUG, "Workflow execution starting.");

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_name = step_def.name.as_str();

      if let Some(skip_if) = &step_def.skip_if {
        if skip_if(ctx_data.clone()) {
          event!(Level::DEBUG, step = step_name, "Step skipped by condition.");
          continue;
        }
      }

      let has_handlers = [Phase::Before, Phase::On, Phase::After]
        .iter()
        .any(|phase| !self.handlers(*phase, step_name).is_empty());
      if !has_handlers {
        if step_def.optional {
          event!(Level::DEBUG, step = step_name, "Optional step has no handlers, skipping.");
          continue;
        }
        event!(Level::ERROR, step = step_name, "Non-optional step has no handlers.");
        return Err(Err::from(WorkflowError::HandlerMissing {
          step_name: step_def.name.clone(),
        }));
      }

      let step_span = span!(Level::INFO, "workflow_step", step = step_name, step_index = step_idx);
      for phase in [Phase::Before, Phase::On, Phase::After] {
        let keep_going = self
          .run_phase(phase, step_name, &ctx_data)
          .instrument(step_span.clone())
          .await?;
        if !keep_going {
          return Ok(PipelineResult::Stopped);
        }
      }
      event!(Level::DEBUG, step = step_name, "Step finished.");
    }

    event!(Level::DEBUG, "Workflow execution completed.");
    Ok(PipelineResult::Completed)
  }
}
