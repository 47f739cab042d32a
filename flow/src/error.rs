// haven/flow/src/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
  #[error("Unknown step: {step}")]
  UnknownStep { step: String },

  #[error("No handlers registered for required step '{step}'")]
  MissingHandler { step: String },

  #[error("Branch context extraction failed in step '{step}': {source}")]
  BranchExtract {
    step: String,
    #[source]
    source: anyhow::Error,
  },

  #[error("No branch matched in step '{step}'")]
  NoBranchMatched { step: String },

  #[error("No flow registered for context type {type_name}")]
  UnregisteredFlow { type_name: &'static str },

  #[error("Context type mismatch (expected {expected})")]
  ContextType { expected: &'static str },

  #[error("Handler failed: {0}")]
  Handler(#[from] anyhow::Error),
}

impl FlowError {
  /// Builds a `BranchExtract` error from anything displayable.
  pub fn extract(step: impl Into<String>, reason: impl std::fmt::Display) -> Self {
    FlowError::BranchExtract {
      step: step.into(),
      source: anyhow::anyhow!("{}", reason),
    }
  }
}

pub type FlowResult<T, E = FlowError> = std::result::Result<T, E>;
