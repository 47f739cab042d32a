// haven/flow/src/flow/hooks.rs

//! Handler registration for the three phases of a step.

use crate::core::control::Control;
use crate::core::ctx::FlowCtx;
use crate::core::handler::boxed;
use crate::error::FlowError;
use crate::flow::definition::Flow;
use std::future::Future;
use tracing::{event, Level};

impl<T, E> Flow<T, E>
where
  T: Send + Sync + 'static,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub fn before<F, Fut>(&mut self, step_name: &str, handler: F) -> &mut Self
  where
    F: Fn(FlowCtx<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Control, E>> + Send + 'static,
  {
    self.step_index(step_name);
    self.before.entry(step_name.to_string()).or_default().push(boxed(handler));
    self
  }

  pub fn on<F, Fut>(&mut self, step_name: &str, handler: F) -> &mut Self
  where
    F: Fn(FlowCtx<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Control, E>> + Send + 'static,
  {
    self.step_index(step_name);
    self.on.entry(step_name.to_string()).or_default().push(boxed(handler));
    self
  }

  pub fn after<F, Fut>(&mut self, step_name: &str, handler: F) -> &mut Self
  where
    F: Fn(FlowCtx<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Control, E>> + Send + 'static,
  {
    self.step_index(step_name);
    self.after.entry(step_name.to_string()).or_default().push(boxed(handler));
    self
  }

  /// Replaces every `on` handler of a step with `handler`.
  pub(crate) fn replace_on<F, Fut>(&mut self, step_name: &str, handler: F)
  where
    F: Fn(FlowCtx<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Control, E>> + Send + 'static,
  {
    if self.on.get(step_name).is_some_and(|v| !v.is_empty()) {
      event!(Level::WARN, flow = %self.name, step = step_name, "Replacing existing 'on' handlers.");
    }
    self.on.insert(step_name.to_string(), vec![boxed(handler)]);
  }
}
