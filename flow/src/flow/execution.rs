// haven/flow/src/flow/execution.rs

use crate::core::control::{Control, Outcome};
use crate::core::ctx::FlowCtx;
use crate::core::handler::Handler;
use crate::error::FlowError;
use crate::flow::definition::Flow;
use tracing::{event, info_span, instrument, Instrument, Level};

/// Result of running one phase of one step.
enum PhaseResult<E> {
  Continue,
  Halt,
  Failed(E),
}

impl<T, E> Flow<T, E>
where
  T: Send + Sync + 'static,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Runs every step in order against `ctx`.
  ///
  /// A handler error on a required step ends the run with that error. On an
  /// optional step it is logged and the run moves on to the next step.
  #[instrument(name = "Flow::run", skip_all, fields(flow = %self.name, steps = self.steps.len()), err(Display))]
  pub async fn run(&self, ctx: FlowCtx<T>) -> Result<Outcome, E> {
    event!(Level::DEBUG, "Flow run starting.");

    for (idx, step) in self.steps.iter().enumerate() {
      let name = step.name.as_str();

      if let Some(skip_if) = &step.skip_if {
        if skip_if(ctx.clone()) {
          event!(Level::DEBUG, step = name, "Step skipped by condition.");
          continue;
        }
      }

      if !self.has_handlers(name) {
        if step.optional {
          event!(Level::DEBUG, step = name, "Optional step has no handlers, skipping.");
          continue;
        }
        event!(Level::ERROR, step = name, "Required step has no handlers.");
        return Err(E::from(FlowError::MissingHandler { step: step.name.clone() }));
      }

      let span = info_span!("flow_step", step = name, index = idx, optional = step.optional);
      let phases = [("before", &self.before), ("on", &self.on), ("after", &self.after)];

      for (phase, table) in phases {
        let Some(handlers) = table.get(name) else { continue };
        match run_phase(handlers, &ctx).instrument(span.clone()).await {
          PhaseResult::Continue => {}
          PhaseResult::Halt => {
            event!(Level::INFO, step = name, phase, "Flow halted by handler.");
            return Ok(Outcome::Halted);
          }
          PhaseResult::Failed(err) if step.optional => {
            event!(Level::WARN, step = name, phase, error = %err, "Optional step failed, continuing.");
            break;
          }
          PhaseResult::Failed(err) => {
            event!(Level::ERROR, step = name, phase, error = %err, "Step failed.");
            return Err(err);
          }
        }
      }
    }

    event!(Level::DEBUG, "Flow run completed.");
    Ok(Outcome::Completed)
  }
}

async fn run_phase<T, E>(handlers: &[Handler<T, E>], ctx: &FlowCtx<T>) -> PhaseResult<E>
where
  T: Send + Sync + 'static,
{
  for handler in handlers {
    match handler(ctx.clone()).await {
      Ok(Control::Continue) => {}
      Ok(Control::Halt) => return PhaseResult::Halt,
      Err(err) => return PhaseResult::Failed(err),
    }
  }
  PhaseResult::Continue
}
