// haven/flow/src/branch/builder.rs

//! Fluent setup for branch points:
//!
//! ```ignore
//! flow
//!   .branch("dispatch")
//!   .arm("paid", paid_flow, |ctx| Ok(FlowCtx::new(Paid::from(&*ctx.read()))))
//!   .when(|ctx| ctx.read().kind == "paid")
//!   .otherwise(Control::Continue)
//!   .finish(false);
//! ```

use crate::branch::arm::{AnyArm, Arm, Condition, Extractor};
use crate::core::control::Control;
use crate::core::ctx::FlowCtx;
use crate::error::FlowError;
use crate::flow::Flow;
use std::sync::Arc;
use tracing::{event, instrument, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NoMatch {
  Continue,
  Halt,
  Fail,
}

pub struct BranchBuilder<'f, T, E>
where
  T: Send + Sync + 'static,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  flow: &'f mut Flow<T, E>,
  step: String,
  arms: Vec<Arc<dyn AnyArm<T, E>>>,
  no_match: NoMatch,
}

impl<'f, T, E> BranchBuilder<'f, T, E>
where
  T: Send + Sync + 'static,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) fn new(flow: &'f mut Flow<T, E>, step: String) -> Self {
    Self {
      flow,
      step,
      arms: Vec::new(),
      no_match: NoMatch::Continue,
    }
  }

  /// Starts an arm that runs `sub_flow` on the context produced by `extract`.
  pub fn arm<S>(
    self,
    label: &str,
    sub_flow: Arc<Flow<S, E>>,
    extract: impl Fn(FlowCtx<T>) -> Result<FlowCtx<S>, FlowError> + Send + Sync + 'static,
  ) -> ArmBuilder<'f, T, S, E>
  where
    S: Send + Sync + 'static,
  {
    ArmBuilder {
      builder: self,
      label: label.to_string(),
      flow: sub_flow,
      extract: Arc::new(extract),
    }
  }

  /// What the step returns when no arm matches. Defaults to `Control::Continue`.
  pub fn otherwise(mut self, control: Control) -> Self {
    self.no_match = match control {
      Control::Continue => NoMatch::Continue,
      Control::Halt => NoMatch::Halt,
    };
    self
  }

  /// Makes "no arm matched" a `FlowError::NoBranchMatched` failure.
  pub fn require_match(mut self) -> Self {
    self.no_match = NoMatch::Fail;
    self
  }

  /// Installs the dispatcher as the step's only `on` handler.
  #[instrument(name = "BranchBuilder::finish", skip_all, fields(step = %self.step, arms = self.arms.len()))]
  pub fn finish(self, optional: bool) {
    let arms = Arc::new(self.arms);
    let step = self.step.clone();
    let no_match = self.no_match;

    self.flow.set_optional(&self.step, optional);
    self.flow.replace_on(&self.step, move |ctx: FlowCtx<T>| {
      let arms = arms.clone();
      let step = step.clone();
      async move {
        for arm in arms.iter() {
          if arm.matches(ctx.clone()) {
            event!(Level::DEBUG, step = %step, arm = arm.label(), "Branch arm matched.");
            return arm.run(&step, ctx.clone()).await;
          }
        }
        event!(Level::DEBUG, step = %step, behaviour = ?no_match, "No branch arm matched.");
        match no_match {
          NoMatch::Continue => Ok(Control::Continue),
          NoMatch::Halt => Ok(Control::Halt),
          NoMatch::Fail => Err(E::from(FlowError::NoBranchMatched { step })),
        }
      }
    });

    event!(Level::DEBUG, step = %self.step, "Branch point installed.");
  }
}

/// Second half of an arm definition; `when` hands the builder back.
pub struct ArmBuilder<'f, T, S, E>
where
  T: Send + Sync + 'static,
  S: Send + Sync + 'static,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  builder: BranchBuilder<'f, T, E>,
  label: String,
  flow: Arc<Flow<S, E>>,
  extract: Extractor<T, S>,
}

impl<'f, T, S, E> ArmBuilder<'f, T, S, E>
where
  T: Send + Sync + 'static,
  S: Send + Sync + 'static,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub fn when(mut self, condition: impl Fn(FlowCtx<T>) -> bool + Send + Sync + 'static) -> BranchBuilder<'f, T, E> {
    let condition: Condition<T> = Arc::new(condition);
    self.builder.arms.push(Arc::new(Arm {
      label: self.label,
      condition,
      extract: self.extract,
      flow: self.flow,
    }));
    self.builder
  }
}
