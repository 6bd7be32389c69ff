use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::EngineError;

/// What a captured artifact is. Serialized exactly as the record's `mediaType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            other => Err(EngineError::Config(format!("unknown media kind: {other}"))),
        }
    }
}

/// Supported signature algorithms. Both produce a fixed 64-byte raw signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigAlg {
    Ed25519,
    Es256,
}

impl SigAlg {
    pub const SIGNATURE_LEN: usize = 64;

    /// Identifier written to the record's `signatureAlgorithm` field.
    pub fn as_str(self) -> &'static str {
        match self {
            SigAlg::Ed25519 => "Ed25519",
            SigAlg::Es256 => "ES256",
        }
    }

    pub fn parse(id: &str) -> Option<Self> {
        match id.to_ascii_uppercase().as_str() {
            "ED25519" => Some(SigAlg::Ed25519),
            "ES256" => Some(SigAlg::Es256),
            _ => None,
        }
    }
}

impl fmt::Display for SigAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Digest algorithms understood by the fingerprint engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlg {
    Sha256,
}

impl DigestAlg {
    pub fn as_str(self) -> &'static str {
        match self {
            DigestAlg::Sha256 => "SHA256",
        }
    }

    pub fn output_len(self) -> usize {
        match self {
            DigestAlg::Sha256 => 32,
        }
    }

    pub fn parse(id: &str) -> Option<Self> {
        match id.to_ascii_uppercase().replace('-', "").as_str() {
            "SHA256" => Some(DigestAlg::Sha256),
            _ => None,
        }
    }
}

/// Named, versioned canonicalization rules. The name travels in the record
/// (`metadata.format`) so a verifier always replays the rules the signer used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalProfile {
    /// Native-resolution RGBA8 raster, uncompressed.
    ImageRgba8V1,
    /// One averaged frame per 1000 ms window, each reduced to 256x256 RGBA8.
    VideoFrameAvgV1,
}

impl CanonicalProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalProfile::ImageRgba8V1 => "rgba8-raw-v1",
            CanonicalProfile::VideoFrameAvgV1 => "frame-avg-1000ms-256px-rgba8-v1",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "rgba8-raw-v1" => Some(CanonicalProfile::ImageRgba8V1),
            "frame-avg-1000ms-256px-rgba8-v1" => Some(CanonicalProfile::VideoFrameAvgV1),
            _ => None,
        }
    }

    pub fn media_kind(self) -> MediaKind {
        match self {
            CanonicalProfile::ImageRgba8V1 => MediaKind::Image,
            CanonicalProfile::VideoFrameAvgV1 => MediaKind::Video,
        }
    }

    /// Current profile for a media kind.
    pub fn default_for(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Image => CanonicalProfile::ImageRgba8V1,
            MediaKind::Video => CanonicalProfile::VideoFrameAvgV1,
        }
    }
}

impl fmt::Display for CanonicalProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_names_round_trip() {
        for p in [CanonicalProfile::ImageRgba8V1, CanonicalProfile::VideoFrameAvgV1] {
            assert_eq!(CanonicalProfile::parse(p.as_str()), Some(p));
        }
        assert_eq!(CanonicalProfile::parse("PNG"), None);
    }

    #[test]
    fn algorithm_ids_are_case_insensitive() {
        assert_eq!(SigAlg::parse("ed25519"), Some(SigAlg::Ed25519));
        assert_eq!(SigAlg::parse("es256"), Some(SigAlg::Es256));
        assert_eq!(SigAlg::parse("RS256"), None);
        assert_eq!(DigestAlg::parse("sha-256"), Some(DigestAlg::Sha256));
        assert_eq!(DigestAlg::parse("MD5"), None);
    }
}
