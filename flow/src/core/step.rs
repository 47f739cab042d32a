// haven/flow/src/core/step.rs

use super::FlowCtx;
use std::sync::Arc;

/// Evaluated before a step runs; `true` skips the step.
pub type SkipIf<T> = Arc<dyn Fn(FlowCtx<T>) -> bool + Send + Sync + 'static>;

#[derive(Clone)]
pub struct StepDef<T: Send + Sync + 'static> {
  pub name: String,
  /// Optional steps may have no handlers, and their handler errors are logged instead of failing the run.
  pub optional: bool,
  pub skip_if: Option<SkipIf<T>>,
}

impl<T: Send + Sync + 'static> std::fmt::Debug for StepDef<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StepDef")
      .field("name", &self.name)
      .field("optional", &self.optional)
      .field("has_skip_if", &self.skip_if.is_some())
      .finish()
  }
}
