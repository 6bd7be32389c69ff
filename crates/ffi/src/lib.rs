use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use trueshot_engine::crypto::signer::{generate_keypair, KeySource, VerifyingKey};
use trueshot_engine::crypto::timestamper::Timestamper;
use trueshot_engine::domain::error::EngineError;
use trueshot_engine::domain::record::format_timestamp;
use trueshot_engine::domain::session::{ProgressEvent, ProgressListener, StageStatus};
use trueshot_engine::domain::types as dt;
use trueshot_engine::domain::verify::{VerdictStatus, VerificationVerdict};
use trueshot_engine::orchestrator::{FileSource, UploadedFile};
use trueshot_engine::{catch_panic, decode, embed_record, encode, CaptureSession, VerifySession};

uniffi::setup_scaffolding!();

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum FfiError {
    /// The media could not be decoded; show "unsupported file".
    #[error("{message}")]
    UnsupportedFormat { message: String },
    /// No usable signing key; a setup problem, not a per-capture one.
    #[error("{message}")]
    KeyUnavailable { message: String },
    /// A device or picker stalled. Safe to retry.
    #[error("{message}")]
    TimedOut { message: String },
    #[error("cancelled")]
    Cancelled,
    #[error("{message}")]
    Generic { message: String },
}

impl From<EngineError> for FfiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::UnsupportedFormat(_) | EngineError::AssetTooLarge { .. } => {
                FfiError::UnsupportedFormat { message: e.to_string() }
            }
            EngineError::KeyUnavailable(_) => FfiError::KeyUnavailable { message: e.to_string() },
            EngineError::OperationTimedOut(_) => FfiError::TimedOut { message: e.to_string() },
            EngineError::Cancelled => FfiError::Cancelled,
            other => FfiError::Generic { message: other.to_string() },
        }
    }
}

// ===== FFI types mirroring the public Rust API (FFI-friendly) =====

#[derive(uniffi::Enum, Debug, Clone, Copy)]
pub enum FfiSigAlg { Ed25519, Es256 }

impl From<FfiSigAlg> for dt::SigAlg {
    fn from(v: FfiSigAlg) -> Self {
        match v { FfiSigAlg::Ed25519 => dt::SigAlg::Ed25519, FfiSigAlg::Es256 => dt::SigAlg::Es256 }
    }
}

#[derive(uniffi::Enum, Debug, Clone, Copy)]
pub enum FfiMediaKind { Image, Video }

impl From<FfiMediaKind> for dt::MediaKind {
    fn from(v: FfiMediaKind) -> Self {
        match v { FfiMediaKind::Image => dt::MediaKind::Image, FfiMediaKind::Video => dt::MediaKind::Video }
    }
}

#[derive(uniffi::Record, Debug, Clone, Copy)]
pub struct FfiLimitsConfig {
    pub max_in_memory_asset_size: u64,
    pub max_stream_copy_size: u64,
    pub io_timeout_secs: u64,
}

impl From<FfiLimitsConfig> for dt::LimitsConfig {
    fn from(v: FfiLimitsConfig) -> Self {
        dt::LimitsConfig {
            max_in_memory_asset_size: v.max_in_memory_asset_size as usize,
            max_stream_copy_size: v.max_stream_copy_size as usize,
            io_timeout_secs: v.io_timeout_secs,
        }
    }
}

impl FfiLimitsConfig {
    pub fn defaults() -> Self {
        let d = dt::LimitsConfig::defaults();
        Self {
            max_in_memory_asset_size: d.max_in_memory_asset_size as u64,
            max_stream_copy_size: d.max_stream_copy_size as u64,
            io_timeout_secs: d.io_timeout_secs,
        }
    }
}

#[derive(uniffi::Record, Debug, Clone)]
pub struct FfiCaptureConfig {
    /// `local:/path.pem` or `env:VAR`. Ignored when `key_pem` is set.
    pub key_uri: Option<String>,
    /// Private key PEM handed over by the platform keystore.
    pub key_pem: Option<String>,
    pub signing_alg: FfiSigAlg,
    /// `system` (default) or `fixed:<RFC3339>`.
    pub timestamper: Option<String>,
    pub tool: Option<String>,
    pub expected_video_windows: Option<u32>,
    pub limits: FfiLimitsConfig,
}

impl TryFrom<FfiCaptureConfig> for dt::CaptureConfig {
    type Error = FfiError;
    fn try_from(v: FfiCaptureConfig) -> Result<Self, Self::Error> {
        let key = match (v.key_pem, v.key_uri) {
            (Some(pem), _) => Some(KeySource::from_pem(pem)),
            (None, Some(uri)) => Some(uri.parse::<KeySource>().map_err(|e| FfiError::KeyUnavailable { message: format!("Invalid key URI: {e}") })?),
            (None, None) => None,
        };
        let timestamper = match v.timestamper {
            Some(t) => t.parse::<Timestamper>().map_err(|e| FfiError::Generic { message: format!("Invalid timestamper: {e}") })?,
            None => Timestamper::System,
        };
        let mut video = dt::VideoPolicy::default();
        if let Some(n) = v.expected_video_windows {
            video.expected_windows = n;
        }
        Ok(dt::CaptureConfig {
            key,
            signing_alg: v.signing_alg.into(),
            timestamper,
            tool: v.tool.unwrap_or_else(|| dt::EngineDefaults::TOOL_NAME.to_string()),
            video,
            limits: v.limits.into(),
        })
    }
}

#[derive(uniffi::Record, Debug, Clone)]
pub struct FfiVerifyConfig {
    pub public_key_pem: String,
    pub expected_video_windows: Option<u32>,
    pub limits: FfiLimitsConfig,
}

impl TryFrom<FfiVerifyConfig> for dt::VerifyConfig {
    type Error = FfiError;
    fn try_from(v: FfiVerifyConfig) -> Result<Self, Self::Error> {
        let key = VerifyingKey::from_pem(v.public_key_pem.as_bytes())?;
        let mut cfg = dt::VerifyConfig::secure_default(key);
        if let Some(n) = v.expected_video_windows {
            cfg.video.expected_windows = n;
        }
        cfg.limits = v.limits.into();
        Ok(cfg)
    }
}

// ===== Progress callbacks =====

#[derive(uniffi::Enum, Debug, Clone, Copy)]
pub enum FfiStageStatus { Pending, Processing, Complete, Failed }

impl From<StageStatus> for FfiStageStatus {
    fn from(v: StageStatus) -> Self {
        match v { StageStatus::Pending => FfiStageStatus::Pending, StageStatus::Processing => FfiStageStatus::Processing, StageStatus::Complete => FfiStageStatus::Complete, StageStatus::Failed => FfiStageStatus::Failed }
    }
}

/// Implemented by the host UI to drive its step indicator.
#[uniffi::export(with_foreign)]
pub trait FfiProgressListener: Send + Sync {
    fn on_progress(&self, stage_index: u32, stage_label: String, status: FfiStageStatus);
}

struct ForeignProgress(Arc<dyn FfiProgressListener>);

impl ProgressListener for ForeignProgress {
    fn on_progress(&self, event: ProgressEvent) {
        self.0.on_progress(event.stage_index as u32, event.stage_label.to_string(), event.status.into());
    }
}

// ===== Results =====

#[derive(uniffi::Record, Debug, Clone)]
pub struct FfiCaptureResult {
    /// Encoded signature record, ready to be saved next to the media.
    pub record_json: String,
    pub digest_hex: String,
    pub timestamp: String,
}

#[derive(uniffi::Enum, Debug, Clone, Copy)]
pub enum FfiVerdictStatus { Authentic, Tampered, Invalid }

#[derive(uniffi::Record, Debug, Clone)]
pub struct FfiVerdict {
    pub status: FfiVerdictStatus,
    pub original_digest: String,
    pub current_digest: String,
    pub timestamp: Option<String>,
    pub details: String,
}

impl From<VerificationVerdict> for FfiVerdict {
    fn from(v: VerificationVerdict) -> Self {
        FfiVerdict {
            status: match v.status { VerdictStatus::Authentic => FfiVerdictStatus::Authentic, VerdictStatus::Tampered => FfiVerdictStatus::Tampered, VerdictStatus::Invalid => FfiVerdictStatus::Invalid },
            original_digest: v.original_digest.map(|d| d.to_hex()).unwrap_or_default(),
            current_digest: v.current_digest.map(|d| d.to_hex()).unwrap_or_default(),
            timestamp: v.timestamp.as_ref().map(format_timestamp),
            details: v.details().to_string(),
        }
    }
}

#[derive(uniffi::Record, Debug, Clone)]
pub struct FfiKeyPair {
    pub private_key_pem: String,
    pub public_key_pem: String,
}

// ===== High-level API, mirroring Rust surface =====

#[uniffi::export]
pub fn default_limits_ffi() -> FfiLimitsConfig {
    FfiLimitsConfig::defaults()
}

#[uniffi::export]
pub fn capture_sign_ffi(
    media: Vec<u8>,
    kind: FfiMediaKind,
    cfg: FfiCaptureConfig,
    listener: Option<Arc<dyn FfiProgressListener>>,
) -> Result<FfiCaptureResult, FfiError> {
    let cfg: dt::CaptureConfig = cfg.try_into()?;
    let mut session = CaptureSession::new(cfg);
    if let Some(l) = listener {
        session = session.with_listener(Arc::new(ForeignProgress(l)));
    }
    let source = Arc::new(dt::MediaArtifact::new(kind.into(), media));
    let record = catch_panic(AssertUnwindSafe(|| session.run_blocking(source)))?;
    let json = encode(&record)?;
    Ok(FfiCaptureResult {
        record_json: String::from_utf8(json).map_err(|e| FfiError::Generic { message: e.to_string() })?,
        digest_hex: record.digest.to_hex(),
        timestamp: record.timestamp_string(),
    })
}

#[uniffi::export]
pub fn verify_upload_ffi(
    media: Vec<u8>,
    declared_mime: Option<String>,
    record_json: Option<Vec<u8>>,
    cfg: FfiVerifyConfig,
    listener: Option<Arc<dyn FfiProgressListener>>,
) -> Result<FfiVerdict, FfiError> {
    let cfg: dt::VerifyConfig = cfg.try_into()?;
    let mut session = VerifySession::new(cfg);
    if let Some(l) = listener {
        session = session.with_listener(Arc::new(ForeignProgress(l)));
    }
    let media = Arc::new(UploadedFile { bytes: media, declared_mime, name: None });
    // Without a record file the one embedded in the media is used.
    let record = record_json.map(|bytes| {
        Arc::new(UploadedFile { bytes, declared_mime: Some("application/json".into()), name: None }) as Arc<dyn FileSource>
    });
    let verdict = catch_panic(AssertUnwindSafe(|| match record {
        Some(record) => session.run_blocking(media, record),
        None => session.run_embedded_blocking(media, None),
    }))?;
    Ok(verdict.into())
}

/// Copy of a PNG or JPEG with the signature record embedded in its metadata.
#[uniffi::export]
pub fn embed_record_ffi(media: Vec<u8>, record_json: Vec<u8>) -> Result<Vec<u8>, FfiError> {
    let record = decode(&record_json).map_err(|e| FfiError::Generic { message: e.to_string() })?;
    Ok(embed_record(&media, &record)?)
}

#[uniffi::export]
pub fn generate_keypair_ffi(alg: FfiSigAlg) -> Result<FfiKeyPair, FfiError> {
    let (private, public) = generate_keypair(alg.into())?;
    Ok(FfiKeyPair { private_key_pem: private.as_str().to_owned(), public_key_pem: public })
}
