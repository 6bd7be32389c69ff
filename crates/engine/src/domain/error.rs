// crates/engine/src/domain/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  /// Input media could not be decoded. User-correctable ("unsupported file").
  #[error("unsupported format: {0}")]
  UnsupportedFormat(String),

  /// No signing key is provisioned, or the provisioned one cannot be loaded.
  #[error("signing key unavailable: {0}")]
  KeyUnavailable(String),

  #[error("malformed signature record: {0}")]
  MalformedRecord(String),

  #[error("unsupported algorithm: {0}")]
  UnsupportedAlgorithm(String),

  /// A collaborator (device, file picker) did not answer within the caller's budget.
  #[error("operation timed out: {0}")]
  OperationTimedOut(&'static str),

  #[error("signature verification failed")]
  SignatureInvalid,

  #[error("operation cancelled")]
  Cancelled,

  #[error("asset too large: {size} bytes (max: {max})")]
  AssetTooLarge { size: usize, max: usize },

  #[error("configuration: {0}")]
  Config(String),

  #[error(transparent)]
  Io(#[from] std::io::Error),

  #[error(transparent)]
  Json(#[from] serde_json::Error),

  #[error(transparent)]
  Crypto(#[from] openssl::error::ErrorStack),

  #[error("feature not enabled: {0}")]
  Feature(&'static str),

  // Useful when we catch_unwind to avoid crossing FFI boundaries with panics.
  #[error("internal panic: {0}")]
  Panic(String),
}

impl EngineError {
  /// Whether the caller may simply retry the same operation.
  pub fn is_retryable(&self) -> bool {
    matches!(self, EngineError::OperationTimedOut(_))
  }
}

impl From<image::ImageError> for EngineError {
  fn from(e: image::ImageError) -> Self {
    EngineError::UnsupportedFormat(e.to_string())
  }
}

pub type EngineResult<T> = Result<T, EngineError>;
