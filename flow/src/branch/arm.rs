// haven/flow/src/branch/arm.rs

//! A single branch arm: condition, context extractor and the sub-flow to run.

use crate::core::control::{Control, Outcome};
use crate::core::ctx::FlowCtx;
use crate::error::FlowError;
use crate::flow::Flow;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{event, instrument, Level};

pub type Condition<T> = Arc<dyn Fn(FlowCtx<T>) -> bool + Send + Sync + 'static>;
pub type Extractor<T, S> = Arc<dyn Fn(FlowCtx<T>) -> Result<FlowCtx<S>, FlowError> + Send + Sync + 'static>;

pub(crate) struct Arm<T, S, E>
where
  T: Send + Sync + 'static,
  S: Send + Sync + 'static,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) label: String,
  pub(crate) condition: Condition<T>,
  pub(crate) extract: Extractor<T, S>,
  pub(crate) flow: Arc<Flow<S, E>>,
}

/// Erases the sub-context type so arms over different payloads can share a step.
#[async_trait]
pub(crate) trait AnyArm<T, E>: Send + Sync
where
  T: Send + Sync + 'static,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  fn label(&self) -> &str;

  fn matches(&self, ctx: FlowCtx<T>) -> bool;

  async fn run(&self, step: &str, ctx: FlowCtx<T>) -> Result<Control, E>;
}

#[async_trait]
impl<T, S, E> AnyArm<T, E> for Arm<T, S, E>
where
  T: Send + Sync + 'static,
  S: Send + Sync + 'static,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  fn label(&self) -> &str {
    &self.label
  }

  fn matches(&self, ctx: FlowCtx<T>) -> bool {
    (self.condition)(ctx)
  }

  #[instrument(name = "branch::arm", skip(self, ctx), fields(arm = %self.label, sub_flow = %self.flow.name()), err(Display))]
  async fn run(&self, step: &str, ctx: FlowCtx<T>) -> Result<Control, E> {
    let sub_ctx = (self.extract)(ctx).map_err(|err| {
      event!(Level::ERROR, error = %err, "Branch context extraction failed.");
      let err = match err {
        FlowError::BranchExtract { source, .. } => FlowError::BranchExtract {
          step: step.to_string(),
          source,
        },
        other => other,
      };
      E::from(err)
    })?;

    match self.flow.run(sub_ctx).await? {
      Outcome::Completed => Ok(Control::Continue),
      Outcome::Halted => Ok(Control::Halt),
    }
  }
}
