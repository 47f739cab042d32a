// haven/flow/src/registry.rs

//! `FlowRegistry<E>`: one flow per context payload type, looked up by `TypeId`.

use crate::core::control::Outcome;
use crate::core::ctx::FlowCtx;
use crate::error::FlowError;
use crate::flow::Flow;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{event, instrument, Level};

#[async_trait]
trait ErasedFlow<AppErr>: Send + Sync
where
  AppErr: std::error::Error + Send + Sync + 'static,
{
  fn name(&self) -> &str;

  async fn run_erased(&self, ctx: Box<dyn Any + Send>) -> Result<Outcome, AppErr>;
}

struct Registered<T, E, AppErr>
where
  T: Send + Sync + 'static,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  flow: Arc<Flow<T, E>>,
  _app_err: PhantomData<fn() -> AppErr>,
}

#[async_trait]
impl<T, E, AppErr> ErasedFlow<AppErr> for Registered<T, E, AppErr>
where
  T: Send + Sync + 'static,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
  AppErr: std::error::Error + From<E> + From<FlowError> + Send + Sync + 'static,
{
  fn name(&self) -> &str {
    self.flow.name()
  }

  async fn run_erased(&self, ctx: Box<dyn Any + Send>) -> Result<Outcome, AppErr> {
    let ctx = ctx.downcast::<FlowCtx<T>>().map_err(|_| {
      let expected = std::any::type_name::<FlowCtx<T>>();
      event!(Level::ERROR, expected, "Registry handed a context of the wrong type.");
      AppErr::from(FlowError::ContextType { expected })
    })?;
    self.flow.run(*ctx).await.map_err(AppErr::from)
  }
}

/// Type-keyed collection of flows. Built once at startup and shared behind an `Arc`.
pub struct FlowRegistry<AppErr = FlowError>
where
  AppErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  flows: RwLock<HashMap<TypeId, Arc<dyn ErasedFlow<AppErr>>>>,
}

impl<AppErr> Default for FlowRegistry<AppErr>
where
  AppErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<AppErr> FlowRegistry<AppErr>
where
  AppErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      flows: RwLock::new(HashMap::new()),
    }
  }

  /// Registers `flow` for its payload type, replacing any earlier registration.
  pub fn register<T, E>(&self, flow: Flow<T, E>)
  where
    T: Send + Sync + 'static,
    E: std::error::Error + From<FlowError> + Send + Sync + 'static,
    AppErr: From<E>,
  {
    let type_name = std::any::type_name::<T>();
    let entry: Arc<dyn ErasedFlow<AppErr>> = Arc::new(Registered::<T, E, AppErr> {
      flow: Arc::new(flow),
      _app_err: PhantomData,
    });
    if let Some(previous) = self.flows.write().insert(TypeId::of::<T>(), entry) {
      event!(Level::WARN, context = type_name, replaced = previous.name(), "Flow registration replaced.");
    } else {
      event!(Level::DEBUG, context = type_name, "Flow registered.");
    }
  }

  pub fn is_registered<T: Send + Sync + 'static>(&self) -> bool {
    self.flows.read().contains_key(&TypeId::of::<T>())
  }

  pub fn len(&self) -> usize {
    self.flows.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.flows.read().is_empty()
  }

  /// Runs the flow registered for `T`.
  #[instrument(name = "FlowRegistry::run", skip_all, fields(context = %std::any::type_name::<T>()))]
  pub async fn run<T>(&self, ctx: FlowCtx<T>) -> Result<Outcome, AppErr>
  where
    T: Send + Sync + 'static,
  {
    let entry = self.flows.read().get(&TypeId::of::<T>()).cloned();
    let Some(entry) = entry else {
      let type_name = std::any::type_name::<T>();
      event!(Level::ERROR, context = type_name, "No flow registered for context type.");
      return Err(AppErr::from(FlowError::UnregisteredFlow { type_name }));
    };
    entry.run_erased(Box::new(ctx)).await
  }
}
