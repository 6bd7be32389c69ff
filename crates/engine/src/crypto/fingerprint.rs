//! Fingerprint engine: SHA-256 over canonical bytes.

use std::fmt;

use openssl::sha::Sha256;

use crate::adapters::canonical::CanonicalForm;
use crate::domain::types::DigestAlg;

/// Fixed-length content fingerprint. Equality stands in for content equality.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    pub const ALG: DigestAlg = DigestAlg::Sha256;

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex, 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a hex digest. Returns `None` unless it decodes to exactly 32 bytes.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s.trim()).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

/// Hash raw bytes.
pub fn digest_bytes(data: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Digest(hasher.finish())
}

/// Hash a canonical form. Pure and deterministic.
pub fn digest(form: &CanonicalForm) -> Digest {
    let mut hasher = Sha256::new();
    for chunk in form.chunks() {
        hasher.update(chunk);
    }
    Digest(hasher.finish())
}
