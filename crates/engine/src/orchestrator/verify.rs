// orchestrator/verify.rs

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::adapters::canonical::{container_from_mime, detect_container, Canonicalizer, FrameDecoder};
use crate::adapters::record::{decode, extract_record, MAX_RECORD_SIZE};
use crate::adapters::verifier::judge;
use crate::crypto::fingerprint::digest;
use crate::domain::error::{EngineError, EngineResult};
use crate::domain::record::SignatureRecord;
use crate::domain::session::{Flow, ProgressListener, SessionEvent, SessionMachine};
use crate::domain::types::{MediaArtifact, VerifyConfig};
use crate::domain::verify::{InvalidReason, VerificationVerdict};

use super::common::{blocking, cancellable, run_on_current_thread, with_timeout};
use super::sources::{FileSource, UploadedFile};

/// Verify-on-upload: read both uploads, then canonicalize, hash and verify.
pub struct VerifySession {
  config: VerifyConfig,
  canonicalizer: Canonicalizer,
  listener: Option<Arc<dyn ProgressListener>>,
  cancel: CancellationToken,
}

impl VerifySession {
  pub fn new(config: VerifyConfig) -> Self {
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

  pub fn cancellation_token(&self) -> CancellationToken {
    self.cancel.clone()
  }

  /// Always yields a verdict for a readable candidate. Errors are limited to
  /// collaborator trouble (timeouts, I/O, cancellation) and candidates that
  /// cannot be decoded (`UnsupportedFormat`).
  #[instrument(skip_all)]
  pub async fn run(
    &self,
    media: Arc<dyn FileSource>,
    record: Arc<dyn FileSource>,
  ) -> EngineResult<VerificationVerdict> {
    let record = match self.load_record(record).await? {
      Ok(r) => r,
      Err(reason) => return Ok(VerificationVerdict::invalid_record(reason)),
    };
    let upload = self.open_media(media).await?;
    self.check(upload, record).await
  }

  /// Like [`VerifySession::run`], reading the record embedded in the upload.
  /// `sidecar` is only opened when nothing is embedded; with neither, the
  /// verdict is `Invalid` with `MissingRecord`.
  #[instrument(skip_all)]
  pub async fn run_embedded(
    &self,
    media: Arc<dyn FileSource>,
    sidecar: Option<Arc<dyn FileSource>>,
  ) -> EngineResult<VerificationVerdict> {
    let upload = self.open_media(media).await?;
    let record = match (extract_record(&upload.bytes), sidecar) {
      (Some(bytes), _) => {
        debug!("using embedded signature record");
        decode_record(&bytes)
      }
      (None, Some(sidecar)) => self.load_record(sidecar).await?,
      (None, None) => Err(InvalidReason::MissingRecord),
    };
    match record {
      Ok(record) => self.check(upload, record).await,
      Err(reason) => Ok(VerificationVerdict::invalid_record(reason)),
    }
  }

  pub fn run_blocking(
    &self,
    media: Arc<dyn FileSource>,
    record: Arc<dyn FileSource>,
  ) -> EngineResult<VerificationVerdict> {
    run_on_current_thread(self.run(media, record))
  }

  pub fn run_embedded_blocking(
    &self,
    media: Arc<dyn FileSource>,
    sidecar: Option<Arc<dyn FileSource>>,
  ) -> EngineResult<VerificationVerdict> {
    run_on_current_thread(self.run_embedded(media, sidecar))
  }

  // A record source that overruns its limits is an unreadable record, not an
  // aborted verification.
  async fn load_record(&self, source: Arc<dyn FileSource>) -> EngineResult<Result<SignatureRecord, InvalidReason>> {
    match self.open(source, "signature file picker").await {
      Ok(file) => Ok(decode_record(&file.bytes)),
      Err(EngineError::AssetTooLarge { size, max }) => {
        info!(size, max, "signature record too large");
        Ok(Err(InvalidReason::MalformedRecord))
      }
      Err(e) => Err(e),
    }
  }

  async fn open_media(&self, media: Arc<dyn FileSource>) -> EngineResult<UploadedFile> {
    let upload = self.open(media, "media file picker").await?;
    let max = self.config.limits.max_in_memory_asset_size;
    if upload.bytes.len() > max {
      return Err(EngineError::AssetTooLarge { size: upload.bytes.len(), max });
    }
    Ok(upload)
  }

  async fn check(&self, upload: UploadedFile, record: SignatureRecord) -> EngineResult<VerificationVerdict> {
    let candidate = candidate_artifact(upload, &record);
    let mut machine = SessionMachine::new(Flow::Verify, self.listener.clone());
    machine.apply(SessionEvent::Begin)?;
    let result = self.pipeline(&mut machine, candidate, record).await;
    if let Err(e) = &result {
      warn!(error = %e, "verification aborted");
      machine.apply(SessionEvent::Fail)?;
    }
    result
  }

  async fn open(&self, source: Arc<dyn FileSource>, what: &'static str) -> EngineResult<UploadedFile> {
    cancellable(
      &self.cancel,
      with_timeout(what, self.config.limits.io_timeout(), blocking(move || source.open())),
    )
    .await
  }

  async fn pipeline(
    &self,
    machine: &mut SessionMachine,
    candidate: MediaArtifact,
    record: SignatureRecord,
  ) -> EngineResult<VerificationVerdict> {
    let form = cancellable(
      &self.cancel,
      self.canonicalizer.canonicalize_cancellable(candidate, record.metadata.format, self.cancel.clone()),
    )
    .await?;
    machine.apply(SessionEvent::StageComplete)?;

    let current = digest(&form);
    debug!(digest = %current, "candidate fingerprint computed");
    machine.apply(SessionEvent::StageComplete)?;

    let key = self.config.verifying_key.clone();
    let verdict = cancellable(&self.cancel, blocking(move || Ok(judge(&record, current, &key)))).await?;
    machine.apply(SessionEvent::StageComplete)?;

    info!(status = ?verdict.status, "verification finished");
    Ok(verdict)
  }
}

fn decode_record(bytes: &[u8]) -> Result<SignatureRecord, InvalidReason> {
  if bytes.len() > MAX_RECORD_SIZE {
    info!(size = bytes.len(), "signature record too large");
    return Err(InvalidReason::MalformedRecord);
  }
  decode(bytes).map_err(|e| {
    info!(error = %e, "signature record rejected");
    e.reason()
  })
}

// The declared MIME type is only compared against the sniffed container and
// logged; the record's profile decides how the bytes are canonicalized.
fn candidate_artifact(upload: UploadedFile, record: &SignatureRecord) -> MediaArtifact {
  let sniffed = detect_container(&upload.bytes);
  let declared = upload.declared_mime.as_deref().and_then(container_from_mime);
  match (sniffed, declared) {
    (Some(actual), Some(claimed)) if actual.mime_type() != claimed.mime_type() => {
      warn!(declared = claimed.mime_type(), detected = actual.mime_type(), "declared type disagrees with content");
    }
    (None, _) => debug!(declared = ?upload.declared_mime, "container not recognized; attempting decode"),
    _ => {}
  }
  let kind = sniffed.map(|c| c.media_kind()).unwrap_or(record.media_kind);
  MediaArtifact::new(kind, upload.bytes)
}
