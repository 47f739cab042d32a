// haven/flow/src/lib.rs

//! haven-flow: the step engine behind every Haven request workflow.
//!
//! A [`Flow`] is an ordered list of named steps. Each step may carry
//! `before`, `on` and `after` handlers, all of which receive a clone of the
//! shared [`FlowCtx`]. Handlers return [`Control::Continue`] to move on or
//! [`Control::Halt`] to end the run early.
//!
//! Steps can also be turned into branch points with [`Flow::branch`]: the
//! first arm whose condition holds runs its own sub-flow on a context
//! extracted from the parent. The marketplace uses this to route Stripe
//! webhook events.
//!
//! [`FlowRegistry`] keys flows by their context payload type so request
//! handlers only need to build a context and call `run`.

pub mod branch;
pub mod core;
pub mod error;
pub mod flow;
pub mod registry;

pub use crate::branch::BranchBuilder;
pub use crate::core::control::{Control, Outcome};
pub use crate::core::ctx::FlowCtx;
pub use crate::core::handler::{Handler, StepFuture};
pub use crate::core::step::{SkipIf, StepDef};
pub use crate::error::{FlowError, FlowResult};
pub use crate::flow::Flow;
pub use crate::registry::FlowRegistry;

/*
    Typical wiring:
    1. Define a payload struct `SignupCtx` holding request input and whatever
       the steps fill in along the way.
    2. Build `Flow::<SignupCtx, AppError>::new(&[("validate", false, None), ...])`.
    3. Attach handlers with `.on("validate", |ctx| async move { ... })`.
    4. Register the flow once at startup: `registry.register(flow)`.
    5. Per request: `registry.run(FlowCtx::new(SignupCtx { ... })).await`,
       then read the results back out of the context.
*/
