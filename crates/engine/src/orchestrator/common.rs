// orchestrator/common.rs

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::adapters::canonical::join_error;
use crate::domain::error::{EngineError, EngineResult};

pub fn run_on_current_thread<F, T>(fut: F) -> EngineResult<T>
where
  F: Future<Output = EngineResult<T>>,
{
  // If we're already inside a Tokio runtime, avoid creating a nested runtime.
  // Use block_in_place to safely block on the current multi-thread runtime.
  if let Ok(handle) = tokio::runtime::Handle::try_current() {
    return tokio::task::block_in_place(|| handle.block_on(fut));
  }

  // Otherwise, create a lightweight current-thread runtime just for this call.
  let rt = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .map_err(|e| EngineError::Config(format!("Failed to create tokio runtime: {}", e)))?;
  rt.block_on(fut)
}

/// Run synchronous work on the blocking pool.
pub async fn blocking<F, T>(f: F) -> EngineResult<T>
where
  F: FnOnce() -> EngineResult<T> + Send + 'static,
  T: Send + 'static,
{
  tokio::task::spawn_blocking(f).await.map_err(join_error)?
}

/// Bound a collaborator call. The label names what stalled.
pub async fn with_timeout<F, T>(what: &'static str, limit: Duration, fut: F) -> EngineResult<T>
where
  F: Future<Output = EngineResult<T>>,
{
  match tokio::time::timeout(limit, fut).await {
    Ok(res) => res,
    Err(_) => Err(EngineError::OperationTimedOut(what)),
  }
}

/// Race `fut` against the token. A cancelled future is dropped, so nothing
/// it would have produced escapes.
pub async fn cancellable<F, T>(token: &CancellationToken, fut: F) -> EngineResult<T>
where
  F: Future<Output = EngineResult<T>>,
{
  tokio::select! {
    biased;
    _ = token.cancelled() => Err(EngineError::Cancelled),
    res = fut => res,
  }
}
