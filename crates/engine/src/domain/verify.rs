// crates/engine/src/domain/verify.rs
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::crypto::fingerprint::Digest;
use crate::domain::error::EngineError;

/// Outcome classes of a verification call.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum VerdictStatus {
    /// Signature valid and the candidate's digest equals the signed digest.
    Authentic,
    /// Signature valid but the candidate's content differs.
    Tampered,
    /// The record could not be trusted (unreadable or badly signed).
    Invalid,
}

/// Why a verdict came out `Invalid`.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum InvalidReason {
    MalformedRecord,
    UnsupportedAlgorithm,
    SignatureInvalid,
    /// Nothing embedded in the media and no signature file supplied.
    MissingRecord,
}

impl InvalidReason {
    /// Map a record/signature error onto an `Invalid` reason. Other errors
    /// are not verdicts and return `None`.
    pub fn from_error(err: &EngineError) -> Option<Self> {
        match err {
            EngineError::MalformedRecord(_) | EngineError::Json(_) => Some(InvalidReason::MalformedRecord),
            EngineError::UnsupportedAlgorithm(_) => Some(InvalidReason::UnsupportedAlgorithm),
            EngineError::SignatureInvalid => Some(InvalidReason::SignatureInvalid),
            _ => None,
        }
    }
}

/// Result of one verification call. Never persisted.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationVerdict {
    pub status: VerdictStatus,
    /// Digest claimed by the record. Empty when the record was unreadable.
    #[serde(serialize_with = "serialize_opt_digest")]
    pub original_digest: Option<Digest>,
    /// Digest freshly computed from the candidate. Empty when not computed.
    #[serde(serialize_with = "serialize_opt_digest")]
    pub current_digest: Option<Digest>,
    /// Signing instant claimed by the record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<InvalidReason>,
}

impl VerificationVerdict {
    /// `Invalid` with empty digests; used when the record itself is unusable.
    pub fn invalid_record(reason: InvalidReason) -> Self {
        Self {
            status: VerdictStatus::Invalid,
            original_digest: None,
            current_digest: None,
            timestamp: None,
            reason: Some(reason),
        }
    }

    pub fn is_authentic(&self) -> bool {
        self.status == VerdictStatus::Authentic
    }

    /// Short human-readable explanation for UIs and the CLI.
    pub fn details(&self) -> &'static str {
        match (self.status, self.reason) {
            (VerdictStatus::Authentic, _) => "content matches original signature",
            (VerdictStatus::Tampered, _) => "content has been modified since signing",
            (VerdictStatus::Invalid, Some(InvalidReason::MalformedRecord)) => "signature file is unreadable",
            (VerdictStatus::Invalid, Some(InvalidReason::UnsupportedAlgorithm)) => "signature file uses an unsupported algorithm",
            (VerdictStatus::Invalid, Some(InvalidReason::MissingRecord)) => "no signature record found",
            (VerdictStatus::Invalid, _) => "signature does not validate (forged or wrong key)",
        }
    }
}

fn serialize_opt_digest<S>(d: &Option<Digest>, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match d {
        Some(d) => s.serialize_str(&d.to_hex()),
        None => s.serialize_str(""),
    }
}
