// orchestrator/capture.rs

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::adapters::canonical::{Canonicalizer, FrameDecoder};
use crate::crypto::fingerprint::digest;
use crate::crypto::signer::{sign_with, SigningKey};
use crate::domain::error::{EngineError, EngineResult};
use crate::domain::record::SignatureRecord;
use crate::domain::session::{Flow, ProgressListener, SessionEvent, SessionMachine};
use crate::domain::types::{CanonicalProfile, CaptureConfig, MediaArtifact};

use super::common::{blocking, cancellable, run_on_current_thread, with_timeout};
use super::sources::MediaSource;

/// Sign-on-capture: acquire, canonicalize, hash, sign.
///
/// Each `run` is independent; the session holds only configuration and the
/// cancellation token, so one session may serve many captures.
pub struct CaptureSession {
  config: CaptureConfig,
  canonicalizer: Canonicalizer,
  listener: Option<Arc<dyn ProgressListener>>,
  cancel: CancellationToken,
}

impl CaptureSession {
  pub fn new(config: CaptureConfig) -> Self {
    let canonicalizer = Canonicalizer::new(config.video);
    Self {
      config,
      canonicalizer,
      listener: None,
      cancel: CancellationToken::new(),
    }
  }

  pub fn with_listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
    self.listener = Some(listener);
    self
  }

  pub fn with_decoder(mut self, decoder: Arc<dyn FrameDecoder>) -> Self {
    self.canonicalizer = Canonicalizer::with_decoder(decoder, self.config.video);
    self
  }

  /// Token that aborts an in-flight `run`. Cancelling yields
  /// `EngineError::Cancelled` and no record.
  pub fn cancellation_token(&self) -> CancellationToken {
    self.cancel.clone()
  }

  #[instrument(skip_all)]
  pub async fn run(&self, source: Arc<dyn MediaSource>) -> EngineResult<SignatureRecord> {
    // No key, no capture: fail before the device is touched.
    let key = Arc::new(self.config.signing_key()?);
    debug!(alg = %key.alg(), "signing key loaded");

    let limits = self.config.limits;
    let artifact = cancellable(
      &self.cancel,
      with_timeout(
        "capture device",
        limits.io_timeout(),
        blocking(move || source.acquire()),
      ),
    )
    .await?;
    if artifact.len() > limits.max_in_memory_asset_size {
      return Err(EngineError::AssetTooLarge {
        size: artifact.len(),
        max: limits.max_in_memory_asset_size,
      });
    }
    info!(kind = %artifact.kind(), bytes = artifact.len(), "media acquired");

    let mut machine = SessionMachine::new(Flow::Capture, self.listener.clone());
    machine.apply(SessionEvent::Begin)?;
    let result = self.pipeline(&mut machine, artifact, key).await;
    if let Err(e) = &result {
      warn!(error = %e, "capture aborted");
      machine.apply(SessionEvent::Fail)?;
    }
    result
  }

  /// Blocking wrapper for callers without a runtime (CLI, FFI).
  pub fn run_blocking(&self, source: Arc<dyn MediaSource>) -> EngineResult<SignatureRecord> {
    run_on_current_thread(self.run(source))
  }

  async fn pipeline(
    &self,
    machine: &mut SessionMachine,
    artifact: MediaArtifact,
    key: Arc<SigningKey>,
  ) -> EngineResult<SignatureRecord> {
    let profile = CanonicalProfile::default_for(artifact.kind());
    let form = cancellable(
      &self.cancel,
      self.canonicalizer.canonicalize_cancellable(artifact, profile, self.cancel.clone()),
    )
    .await?;
    if form.is_partial() {
      warn!(frames = form.frame_count(), "short capture; fingerprinting what was captured");
    }
    machine.apply(SessionEvent::StageComplete)?;

    let fingerprint = digest(&form);
    debug!(digest = %fingerprint, "fingerprint computed");
    machine.apply(SessionEvent::StageComplete)?;

    let timestamper = self.config.timestamper.clone();
    let tool = self.config.tool.clone();
    let record = cancellable(
      &self.cancel,
      blocking(move || sign_with(&fingerprint, profile, &key, &timestamper, &tool)),
    )
    .await?;
    machine.apply(SessionEvent::StageComplete)?;

    info!(kind = %record.media_kind, "capture signed");
    Ok(record)
  }
}
