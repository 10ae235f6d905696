//! Error types for the trace engine.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, TraceError>;

/// Errors that abort a trace call or engine construction.
#[derive(Debug, Error)]
pub enum TraceError {
  /// The search discovered more nodes than the caller allowed. The whole
  /// call aborts; no partial tree is returned.
  #[error("trace exceeded the maximum node count of {0}")]
  SizeLimit(usize),

  /// The network definition names a connectivity engine that is not
  /// registered. Raised at engine construction.
  #[error("unknown connectivity engine `{0}`")]
  UnknownEngine(String),

  /// A filter expression failed to compile.
  #[error("filter expression rejected: {0}")]
  Filter(String),

  /// A configured length unit could not be converted to metres.
  #[error("unit conversion failed: {0}")]
  Units(String),

  /// A feature store failure that is not handled locally (see `StoreError`
  /// for which variants are absorbed during traversal).
  #[error(transparent)]
  Store(#[from] StoreError),
}

/// Outcomes of feature store operations.
///
/// `NotFound` on a start or stop lookup degrades the trace to an empty
/// result; `Unauthorized` during traversal prunes that branch silently.
/// Everything else propagates to the caller unchanged.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("feature not found: {0}")]
  NotFound(String),

  #[error("access denied for feature: {0}")]
  Unauthorized(String),

  #[error("feature store unavailable: {0}")]
  Unavailable(String),
}
