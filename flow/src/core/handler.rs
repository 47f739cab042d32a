// haven/flow/src/core/handler.rs

use crate::core::control::Control;
use crate::core::ctx::FlowCtx;
use std::future::Future;
use std::pin::Pin;

pub type StepFuture<E> = Pin<Box<dyn Future<Output = Result<Control, E>> + Send>>;

/// A boxed async step handler. It receives its own clone of the context.
pub type Handler<T, E> = Box<dyn Fn(FlowCtx<T>) -> StepFuture<E> + Send + Sync>;

pub(crate) fn boxed<T, E, F, Fut>(f: F) -> Handler<T, E>
where
  T: Send + Sync + 'static,
  F: Fn(FlowCtx<T>) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<Control, E>> + Send + 'static,
{
  Box::new(move |ctx| Box::pin(f(ctx)))
}
