use std::path::PathBuf;

use super::core::MediaKind;

/// A reference to media, which can be a path or in-memory bytes.
///
/// ## Memory Considerations
/// - `Path`: read through a size-limited copy; nothing is loaded until the
///   artifact is materialized.
/// - `Bytes`: suitable for captures already held by the device layer.
///
/// Both are bounded by `LimitsConfig::max_in_memory_asset_size`, since the
/// canonicalizer needs the whole artifact in memory to decode it.
#[derive(Clone)]
pub enum AssetRef {
    Path(PathBuf),
    Bytes { data: Vec<u8> },
}

impl std::fmt::Debug for AssetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetRef::Path(path) => f.debug_tuple("Path").field(path).finish(),
            AssetRef::Bytes { data } => f.debug_struct("Bytes")
                .field("data_len", &data.len())
                .finish(),
        }
    }
}

/// Opaque captured bytes plus the kind they claim to be.
///
/// Artifacts are never mutated; each pipeline stage produces a new value
/// and drops the previous one.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaArtifact {
    kind: MediaKind,
    bytes: Vec<u8>,
}

impl MediaArtifact {
    pub fn new(kind: MediaKind, bytes: Vec<u8>) -> Self {
        Self { kind, bytes }
    }

    pub fn image(bytes: Vec<u8>) -> Self {
        Self::new(MediaKind::Image, bytes)
    }

    pub fn video(bytes: Vec<u8>) -> Self {
        Self::new(MediaKind::Video, bytes)
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Same bytes, re-tagged. Used when a verifier replays the record's kind.
    pub fn with_kind(self, kind: MediaKind) -> Self {
        Self { kind, bytes: self.bytes }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl std::fmt::Debug for MediaArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaArtifact")
            .field("kind", &self.kind)
            .field("len", &self.bytes.len())
            .finish()
    }
}
