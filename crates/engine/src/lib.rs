// crates/engine/src/lib.rs

//! Public facade for the TrueShot engine.
//! Exposes a stable API and re-exports types for consumers (CLI, FFI).

pub mod adapters;
pub mod crypto;
pub mod domain;
pub mod orchestrator;

use adapters::canonical::{sniff_kind, Canonicalizer};
use adapters::verifier::Verifier;
use crypto::fingerprint::digest;
use domain::error::{EngineError, EngineResult};
use domain::types::{CanonicalProfile, CaptureConfig, LimitsConfig, MediaArtifact, MediaKind, VerifyConfig};

// High-level helpers for the common in-memory path.
// Both run synchronously on the calling thread.

/// Canonicalize, hash and sign media that is already in memory.
pub fn sign_media_bytes(
    bytes: &[u8],
    kind: MediaKind,
    cfg: &CaptureConfig,
) -> EngineResult<SignatureRecord> {
    check_size(bytes.len(), cfg.limits)?;
    let key = cfg.signing_key()?;
    let artifact = MediaArtifact::new(kind, bytes.to_vec());
    let form = Canonicalizer::new(cfg.video).canonicalize(&artifact)?;
    crypto::signer::sign_with(
        &digest(&form),
        CanonicalProfile::default_for(kind),
        &key,
        &cfg.timestamper,
        &cfg.tool,
    )
}

/// Verify in-memory media against an encoded signature record.
/// Record problems come back as an `Invalid` verdict, never as an error.
pub fn verify_media_bytes(
    bytes: &[u8],
    record_bytes: &[u8],
    cfg: &VerifyConfig,
) -> EngineResult<VerificationVerdict> {
    check_size(bytes.len(), cfg.limits)?;
    let kind = sniff_kind(bytes).unwrap_or(MediaKind::Image);
    let artifact = MediaArtifact::new(kind, bytes.to_vec());
    Verifier::new(Canonicalizer::new(cfg.video)).verify_bytes(&artifact, record_bytes, &cfg.verifying_key)
}

fn check_size(size: usize, limits: LimitsConfig) -> EngineResult<()> {
    if size > limits.max_in_memory_asset_size {
        return Err(EngineError::AssetTooLarge { size, max: limits.max_in_memory_asset_size });
    }
    Ok(())
}

/// Run `f`, turning a panic into `EngineError::Panic` so it never unwinds
/// across a foreign-language boundary.
#[cfg(feature = "ffi")]
pub fn catch_panic<T>(f: impl FnOnce() -> EngineResult<T> + std::panic::UnwindSafe) -> EngineResult<T> {
    std::panic::catch_unwind(f).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(EngineError::Panic(message))
    })
}

// Re-exports for convenience
pub use adapters::record::{
    decode, embed_record, encode, extract_record, read_record, write_record, RecordError, MAX_RECORD_SIZE,
};
pub use adapters::verifier::{verify, verify_bytes, verify_embedded};
pub use crypto::fingerprint::Digest;
pub use crypto::signer::{generate_keypair, verify_record_signature, KeySource, SigningKey, VerifyingKey};
pub use crypto::timestamper::Timestamper;
pub use domain::record::SignatureRecord;
pub use domain::types::SigAlg;
pub use domain::verify::{VerdictStatus, VerificationVerdict};
pub use orchestrator::{CaptureSession, VerifySession};
