//! JSON signature-record codec.
//!
//! The encoded form is the portability boundary between signer and verifier,
//! so it only ever grows: readers ignore fields they do not know, and new
//! fields get defaults that reproduce the old meaning.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::adapters::canonical::copy_with_limits;
use crate::crypto::fingerprint::Digest;
use crate::domain::error::{EngineError, EngineResult};
use crate::domain::record::{format_timestamp, RecordMetadata, SignatureRecord};
use crate::domain::types::{CanonicalProfile, DigestAlg, MediaKind, SigAlg};
use crate::domain::verify::InvalidReason;

/// Record files are small; anything past this is not one of ours.
pub const MAX_RECORD_SIZE: usize = 1024 * 1024;

const SUPPORTED_MAJOR_VERSION: &str = "1";
const UNKNOWN_TOOL: &str = "unknown";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
  #[error("malformed signature record: {0}")]
  Malformed(String),
  #[error("unsupported algorithm: {0}")]
  UnsupportedAlgorithm(String),
}

impl RecordError {
  pub fn reason(&self) -> InvalidReason {
    match self {
      RecordError::Malformed(_) => InvalidReason::MalformedRecord,
      RecordError::UnsupportedAlgorithm(_) => InvalidReason::UnsupportedAlgorithm,
    }
  }
}

impl From<RecordError> for EngineError {
  fn from(e: RecordError) -> Self {
    match e {
      RecordError::Malformed(m) => EngineError::MalformedRecord(m),
      RecordError::UnsupportedAlgorithm(m) => EngineError::UnsupportedAlgorithm(m),
    }
  }
}

// Everything optional on the wire so that a missing field is reported by name
// rather than as a generic serde error.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRecord {
  #[serde(skip_serializing_if = "Option::is_none")]
  version: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  media_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  hash: Option<WireHash>,
  #[serde(skip_serializing_if = "Option::is_none")]
  signature: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  signature_algorithm: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  timestamp: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  metadata: Option<WireMetadata>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireHash {
  algorithm: Option<String>,
  value: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMetadata {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  tool: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  format: Option<String>,
}

/// Serialize a record as pretty-printed UTF-8 JSON.
pub fn encode(record: &SignatureRecord) -> EngineResult<Vec<u8>> {
  let wire = WireRecord {
    version: Some(record.version.clone()),
    media_type: Some(record.media_kind.as_str().to_string()),
    hash: Some(WireHash {
      algorithm: Some(record.digest_alg.as_str().to_string()),
      value: Some(record.digest.to_hex()),
    }),
    signature: Some(BASE64.encode(&record.signature)),
    signature_algorithm: Some(record.signature_alg.as_str().to_string()),
    timestamp: Some(format_timestamp(&record.timestamp)),
    metadata: Some(WireMetadata {
      tool: Some(record.metadata.tool.clone()),
      format: Some(record.metadata.format.as_str().to_string()),
    }),
  };
  Ok(serde_json::to_vec_pretty(&wire)?)
}

/// Parse and validate a record. Never panics on hostile input.
pub fn decode(bytes: &[u8]) -> Result<SignatureRecord, RecordError> {
  let wire: WireRecord =
    serde_json::from_slice(bytes).map_err(|e| RecordError::Malformed(format!("invalid JSON: {e}")))?;

  let version = required(wire.version, "version")?;
  check_version(&version)?;

  let media_type = required(wire.media_type, "mediaType")?;
  let media_kind: MediaKind = media_type
    .parse()
    .map_err(|_| RecordError::Malformed(format!("unknown mediaType '{media_type}'")))?;

  let hash = required(wire.hash, "hash")?;
  let alg_name = required(hash.algorithm, "hash.algorithm")?;
  let digest_alg = DigestAlg::parse(&alg_name)
    .ok_or_else(|| RecordError::UnsupportedAlgorithm(format!("hash algorithm '{alg_name}'")))?;
  let hex_value = required(hash.value, "hash.value")?;
  if hex_value.len() != digest_alg.output_len() * 2 {
    return Err(RecordError::Malformed(format!(
      "hash.value has {} hex chars, {} needs {}",
      hex_value.len(),
      digest_alg.as_str(),
      digest_alg.output_len() * 2
    )));
  }
  let digest = Digest::from_hex(&hex_value)
    .ok_or_else(|| RecordError::Malformed("hash.value is not hex".into()))?;

  let signature_alg = match wire.signature_algorithm {
    Some(name) => SigAlg::parse(&name)
      .ok_or_else(|| RecordError::UnsupportedAlgorithm(format!("signature algorithm '{name}'")))?,
    None => SigAlg::Ed25519,
  };
  let token = required(wire.signature, "signature")?;
  let signature = BASE64
    .decode(token.trim())
    .map_err(|e| RecordError::Malformed(format!("signature is not base64: {e}")))?;
  if signature.len() != SigAlg::SIGNATURE_LEN {
    return Err(RecordError::Malformed(format!(
      "signature is {} bytes, expected {}",
      signature.len(),
      SigAlg::SIGNATURE_LEN
    )));
  }

  let ts = required(wire.timestamp, "timestamp")?;
  let timestamp = DateTime::parse_from_rfc3339(&ts)
    .map_err(|e| RecordError::Malformed(format!("timestamp '{ts}': {e}")))?
    .with_timezone(&Utc);
  // The signed message carries the millisecond `Z` form; any other spelling
  // of the same instant would verify while reporting unsigned text.
  if format_timestamp(&timestamp) != ts {
    return Err(RecordError::Malformed(format!(
      "timestamp '{ts}' is not in canonical form '{}'",
      format_timestamp(&timestamp)
    )));
  }

  let metadata = match wire.metadata {
    Some(meta) => {
      let format = match meta.format {
        Some(name) => CanonicalProfile::parse(&name)
          .ok_or_else(|| RecordError::UnsupportedAlgorithm(format!("canonical format '{name}'")))?,
        None => CanonicalProfile::default_for(media_kind),
      };
      RecordMetadata {
        tool: meta.tool.unwrap_or_else(|| UNKNOWN_TOOL.to_string()),
        format,
      }
    }
    None => RecordMetadata {
      tool: UNKNOWN_TOOL.to_string(),
      format: CanonicalProfile::default_for(media_kind),
    },
  };
  if metadata.format.media_kind() != media_kind {
    return Err(RecordError::Malformed(format!(
      "format '{}' does not apply to mediaType '{}'",
      metadata.format, media_kind
    )));
  }

  Ok(SignatureRecord {
    version,
    media_kind,
    digest_alg,
    digest,
    signature_alg,
    signature,
    timestamp,
    metadata,
  })
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, RecordError> {
  value.ok_or_else(|| RecordError::Malformed(format!("missing field '{field}'")))
}

fn check_version(version: &str) -> Result<(), RecordError> {
  let major = version.split('.').next().unwrap_or_default();
  if major.is_empty() || !major.bytes().all(|b| b.is_ascii_digit()) {
    return Err(RecordError::Malformed(format!("version '{version}'")));
  }
  if major != SUPPORTED_MAJOR_VERSION {
    return Err(RecordError::UnsupportedAlgorithm(format!("record version '{version}'")));
  }
  Ok(())
}

/// Write a record file next to (or instead of) the media it covers.
pub fn write_record(path: &Path, record: &SignatureRecord) -> EngineResult<()> {
  let bytes = encode(record)?;
  std::fs::write(path, bytes)?;
  debug!(path = %path.display(), "signature record written");
  Ok(())
}

/// Read and decode a record file. I/O problems stay I/O errors; content
/// problems become `MalformedRecord` / `UnsupportedAlgorithm`.
pub fn read_record(path: &Path) -> EngineResult<SignatureRecord> {
  let bytes = read_record_bytes(path)?;
  Ok(decode(&bytes)?)
}

pub(crate) fn read_record_bytes(path: &Path) -> EngineResult<Vec<u8>> {
  let mut file = std::fs::File::open(path)?;
  let mut out = Vec::new();
  copy_with_limits(&mut file, &mut out, MAX_RECORD_SIZE).map_err(|e| match e {
    EngineError::AssetTooLarge { size, max } => {
      EngineError::MalformedRecord(format!("record file exceeds {max} bytes (read {size})"))
    }
    other => other,
  })?;
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample() -> SignatureRecord {
    SignatureRecord {
      version: "1.0".into(),
      media_kind: MediaKind::Image,
      digest_alg: DigestAlg::Sha256,
      digest: Digest::from_bytes([0x11; 32]),
      signature_alg: SigAlg::Ed25519,
      signature: vec![0x22; 64],
      timestamp: DateTime::parse_from_rfc3339("2026-01-26T15:30:00.123Z")
        .unwrap()
        .with_timezone(&Utc),
      metadata: RecordMetadata {
        tool: "TrueShot".into(),
        format: CanonicalProfile::ImageRgba8V1,
      },
    }
  }

  #[test]
  fn encodes_the_documented_schema() {
    let json: serde_json::Value = serde_json::from_slice(&encode(&sample()).unwrap()).unwrap();
    assert_eq!(json["version"], "1.0");
    assert_eq!(json["mediaType"], "image");
    assert_eq!(json["hash"]["algorithm"], "SHA256");
    assert_eq!(json["hash"]["value"], "11".repeat(32));
    assert_eq!(json["timestamp"], "2026-01-26T15:30:00.123Z");
    assert_eq!(json["metadata"]["tool"], "TrueShot");
    assert_eq!(json["metadata"]["format"], "rgba8-raw-v1");
    assert_eq!(json["signatureAlgorithm"], "Ed25519");
  }

  #[test]
  fn version_majors() {
    assert!(check_version("1.0").is_ok());
    assert!(check_version("1.7").is_ok());
    assert!(matches!(check_version("2.0"), Err(RecordError::UnsupportedAlgorithm(_))));
    assert!(matches!(check_version("v1"), Err(RecordError::Malformed(_))));
    assert!(matches!(check_version(""), Err(RecordError::Malformed(_))));
  }

  #[test]
  fn errors_map_to_verdict_reasons() {
    assert_eq!(RecordError::Malformed("x".into()).reason(), InvalidReason::MalformedRecord);
    assert!(matches!(
      EngineError::from(RecordError::UnsupportedAlgorithm("x".into())),
      EngineError::UnsupportedAlgorithm(_)
    ));
  }
}
