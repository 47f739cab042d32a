pub mod control;
pub mod ctx;
pub mod handler;
pub mod step;

pub use control::{Control, Outcome};
pub use ctx::FlowCtx;
pub use handler::{Handler, StepFuture};
pub use step::{SkipIf, StepDef};
