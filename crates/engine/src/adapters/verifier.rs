// adapters/verifier.rs

use tracing::{debug, info, warn};

use crate::adapters::canonical::Canonicalizer;
use crate::adapters::record::{decode, extract_record};
use crate::crypto::fingerprint::{digest, Digest};
use crate::crypto::signer::{verify_record_signature, VerifyingKey};
use crate::domain::error::EngineResult;
use crate::domain::record::SignatureRecord;
use crate::domain::types::MediaArtifact;
use crate::domain::verify::{InvalidReason, VerdictStatus, VerificationVerdict};

/// Re-verifies candidates against signature records.
///
/// The signature is always checked before the record's digest is trusted;
/// a record whose signature fails is `Invalid` even when its claimed digest
/// matches the candidate.
#[derive(Clone, Default)]
pub struct Verifier {
  canonicalizer: Canonicalizer,
}

impl Verifier {
  pub fn new(canonicalizer: Canonicalizer) -> Self {
    Self { canonicalizer }
  }

  /// Full procedure for an already-decoded record.
  ///
  /// Errors are reserved for a candidate that cannot be canonicalized
  /// (`UnsupportedFormat`); every record problem is a verdict.
  pub fn verify(
    &self,
    candidate: &MediaArtifact,
    record: &SignatureRecord,
    key: &VerifyingKey,
  ) -> EngineResult<VerificationVerdict> {
    let current = self.current_digest(candidate, record)?;
    Ok(judge(record, current, key))
  }

  /// Decode the record bytes first; a record that does not decode is
  /// `Invalid` with empty digests and the candidate is never touched.
  pub fn verify_bytes(
    &self,
    candidate: &MediaArtifact,
    record_bytes: &[u8],
    key: &VerifyingKey,
  ) -> EngineResult<VerificationVerdict> {
    let record = match decode(record_bytes) {
      Ok(r) => r,
      Err(e) => {
        info!(error = %e, "signature record rejected");
        return Ok(VerificationVerdict::invalid_record(e.reason()));
      }
    };
    self.verify(candidate, &record, key)
  }

  /// Verify against the record embedded in the candidate itself. Media with
  /// nothing embedded is `Invalid` with `MissingRecord`.
  pub fn verify_embedded(&self, candidate: &MediaArtifact, key: &VerifyingKey) -> EngineResult<VerificationVerdict> {
    match extract_record(candidate.bytes()) {
      Some(record_bytes) => self.verify_bytes(candidate, &record_bytes, key),
      None => {
        info!("no embedded signature record");
        Ok(VerificationVerdict::invalid_record(InvalidReason::MissingRecord))
      }
    }
  }

  /// Canonicalize the candidate with the rules named in the record and hash it.
  pub fn current_digest(&self, candidate: &MediaArtifact, record: &SignatureRecord) -> EngineResult<Digest> {
    if candidate.kind() != record.media_kind {
      warn!(
        declared = %candidate.kind(),
        record = %record.media_kind,
        "candidate kind differs from record; replaying record's rules"
      );
    }
    let form = self.canonicalizer.canonicalize_as(candidate, record.metadata.format)?;
    Ok(digest(&form))
  }
}

/// Signature check, then digest comparison.
pub fn judge(record: &SignatureRecord, current: Digest, key: &VerifyingKey) -> VerificationVerdict {
  if let Err(e) = verify_record_signature(record, key) {
    info!(error = %e, "record signature rejected");
    return VerificationVerdict {
      status: VerdictStatus::Invalid,
      original_digest: Some(record.digest),
      current_digest: Some(current),
      timestamp: Some(record.timestamp),
      reason: Some(InvalidReason::from_error(&e).unwrap_or(InvalidReason::SignatureInvalid)),
    };
  }

  let status = if current == record.digest {
    VerdictStatus::Authentic
  } else {
    VerdictStatus::Tampered
  };
  debug!(?status, original = %record.digest, current = %current, "verdict");
  VerificationVerdict {
    status,
    original_digest: Some(record.digest),
    current_digest: Some(current),
    timestamp: Some(record.timestamp),
    reason: None,
  }
}

/// Verify with the default canonicalizer.
pub fn verify(
  candidate: &MediaArtifact,
  record: &SignatureRecord,
  key: &VerifyingKey,
) -> EngineResult<VerificationVerdict> {
  Verifier::default().verify(candidate, record, key)
}

/// Verify against an encoded record with the default canonicalizer.
pub fn verify_bytes(
  candidate: &MediaArtifact,
  record_bytes: &[u8],
  key: &VerifyingKey,
) -> EngineResult<VerificationVerdict> {
  Verifier::default().verify_bytes(candidate, record_bytes, key)
}

/// Verify against the embedded record with the default canonicalizer.
pub fn verify_embedded(candidate: &MediaArtifact, key: &VerifyingKey) -> EngineResult<VerificationVerdict> {
  Verifier::default().verify_embedded(candidate, key)
}
