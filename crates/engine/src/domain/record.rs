// crates/engine/src/domain/record.rs
use chrono::{DateTime, Utc};

use crate::crypto::fingerprint::Digest;
use super::types::{CanonicalProfile, DigestAlg, MediaKind, SigAlg};

/// Producer details carried alongside the signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    /// Name of the producing tool.
    pub tool: String,
    /// Canonicalization rules the digest was computed under.
    pub format: CanonicalProfile,
}

/// The portable proof binding a digest, media kind and instant to a signature.
///
/// Created once by the signer and never modified afterwards; the only
/// entity that outlives a single operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRecord {
    pub version: String,
    pub media_kind: MediaKind,
    pub digest_alg: DigestAlg,
    pub digest: Digest,
    pub signature_alg: SigAlg,
    /// Raw signature bytes (always `SigAlg::SIGNATURE_LEN` long).
    pub signature: Vec<u8>,
    /// Signing instant, millisecond precision.
    pub timestamp: DateTime<Utc>,
    pub metadata: RecordMetadata,
}

impl SignatureRecord {
    /// Timestamp in the exact textual form that is signed and persisted.
    pub fn timestamp_string(&self) -> String {
        format_timestamp(&self.timestamp)
    }
}

/// RFC 3339, millisecond precision, `Z` suffix (e.g. `2026-01-26T15:30:00.000Z`).
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
