// haven/flow/src/flow/definition.rs

//! `Flow<T, E>`: step list plus the per-phase handler tables, and the methods
//! that reshape the step list at setup time.

use crate::branch::BranchBuilder;
use crate::core::handler::Handler;
use crate::core::step::{SkipIf, StepDef};
use crate::error::FlowError;
use std::collections::HashMap;

/// An ordered workflow over a context payload `T`, whose handlers fail with `E`.
///
/// Step names are fixed at setup. Referencing an unknown step while wiring a
/// flow is a programming error and panics.
pub struct Flow<T, E>
where
  T: Send + Sync + 'static,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) name: String,
  pub(crate) steps: Vec<StepDef<T>>,
  pub(crate) before: HashMap<String, Vec<Handler<T, E>>>,
  pub(crate) on: HashMap<String, Vec<Handler<T, E>>>,
  pub(crate) after: HashMap<String, Vec<Handler<T, E>>>,
}

impl<T, E> Flow<T, E>
where
  T: Send + Sync + 'static,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// `(name, optional, skip_if)` triples, in execution order.
  pub fn new(step_defs: &[(&str, bool, Option<SkipIf<T>>)]) -> Self {
    let steps = step_defs
      .iter()
      .map(|(name, optional, skip_if)| StepDef {
        name: (*name).to_string(),
        optional: *optional,
        skip_if: skip_if.clone(),
      })
      .collect();

    Self {
      name: short_type_name::<T>().to_string(),
      steps,
      before: HashMap::new(),
      on: HashMap::new(),
      after: HashMap::new(),
    }
  }

  /// Overrides the name used in log spans (defaults to the payload type name).
  pub fn named(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  pub fn has_handlers(&self, step_name: &str) -> bool {
    [&self.before, &self.on, &self.after]
      .iter()
      .any(|table| table.get(step_name).is_some_and(|v| !v.is_empty()))
  }

  pub(crate) fn step_index(&self, step_name: &str) -> usize {
    match self.steps.iter().position(|s| s.name == step_name) {
      Some(idx) => idx,
      None => panic!("flow '{}': step '{}' is not defined", self.name, step_name),
    }
  }

  fn assert_new_step(&self, step_name: &str) {
    if self.steps.iter().any(|s| s.name == step_name) {
      panic!("flow '{}': step '{}' already exists", self.name, step_name);
    }
  }

  pub fn insert_before(&mut self, existing: &str, new_step: &str, optional: bool, skip_if: Option<SkipIf<T>>) {
    let idx = self.step_index(existing);
    self.assert_new_step(new_step);
    self.steps.insert(
      idx,
      StepDef {
        name: new_step.to_string(),
        optional,
        skip_if,
      },
    );
  }

  pub fn insert_after(&mut self, existing: &str, new_step: &str, optional: bool, skip_if: Option<SkipIf<T>>) {
    let idx = self.step_index(existing);
    self.assert_new_step(new_step);
    self.steps.insert(
      idx + 1,
      StepDef {
        name: new_step.to_string(),
        optional,
        skip_if,
      },
    );
  }

  /// Removes a step and its handlers. Unknown names are ignored.
  pub fn remove_step(&mut self, step_name: &str) {
    if let Some(idx) = self.steps.iter().position(|s| s.name == step_name) {
      self.steps.remove(idx);
      self.before.remove(step_name);
      self.on.remove(step_name);
      self.after.remove(step_name);
    }
  }

  pub fn set_optional(&mut self, step_name: &str, optional: bool) {
    let idx = self.step_index(step_name);
    self.steps[idx].optional = optional;
  }

  pub fn set_skip_if(&mut self, step_name: &str, skip_if: Option<SkipIf<T>>) {
    let idx = self.step_index(step_name);
    self.steps[idx].skip_if = skip_if;
  }

  /// Turns `step_name` into a branch point. See [`BranchBuilder`].
  pub fn branch(&mut self, step_name: &str) -> BranchBuilder<'_, T, E> {
    self.step_index(step_name);
    BranchBuilder::new(self, step_name.to_string())
  }
}

fn short_type_name<T>() -> &'static str {
  let full = std::any::type_name::<T>();
  full.rsplit("::").next().unwrap_or(full)
}
