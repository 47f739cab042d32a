// haven/flow/src/core/ctx.rs
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// Shared, lockable payload handed to every handler of a flow run.
///
/// Guards returned by [`read`](Self::read) and [`write`](Self::write) are
/// blocking locks. Copy what you need into locals and drop the guard before
/// the next `.await`.
#[derive(Debug)]
pub struct FlowCtx<T: Send + Sync + 'static>(Arc<RwLock<T>>);

impl<T: Send + Sync + 'static> FlowCtx<T> {
  pub fn new(data: T) -> Self {
    FlowCtx(Arc::new(RwLock::new(data)))
  }

  pub fn read(&self) -> RwLockReadGuard<'_, T> {
    self.0.read()
  }

  pub fn write(&self) -> RwLockWriteGuard<'_, T> {
    self.0.write()
  }

  pub fn try_read(&self) -> Option<RwLockReadGuard<'_, T>> {
    self.0.try_read()
  }

  pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, T>> {
    self.0.try_write()
  }

  /// Runs `f` under a read lock and returns its result.
  pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
    f(&self.0.read())
  }

  /// Runs `f` under a write lock and returns its result.
  pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
    f(&mut self.0.write())
  }
}

impl<T: Send + Sync + 'static> Clone for FlowCtx<T> {
  fn clone(&self) -> Self {
    FlowCtx(Arc::clone(&self.0))
  }
}

impl<T: Send + Sync + 'static + Default> Default for FlowCtx<T> {
  fn default() -> Self {
    Self::new(T::default())
  }
}
