// core/src/step.rs

use crate::context_data::ContextData;
use std::sync::Arc;

/// Evaluated before a step runs; returning `true` skips the step.
pub type SkipCondition<TData> = Arc<dyn Fn(ContextData<TData>) -> bool + Send + Sync + 'static>;

#[derive(Clone)]
pub struct StepDef<TData: 'static + Send + Sync> {
  pub name: String,
  pub optional: bool,
  pub skip_if: Option<SkipCondition<TData>>,
}

impl<TData: 'static + Send + Sync> std::fmt::Debug for StepDef<TData> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StepDef")
      .field("name", &self.name)
      .field("optional", &self.optional)
      .field("skip_if_present", &self.skip_if.is_some())
      .finish()
  }
}
