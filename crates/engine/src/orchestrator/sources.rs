// orchestrator/sources.rs
//! Capabilities the orchestrators consume from the outside world: a capture
//! device and a file picker. Both are blocking calls; the orchestrators run
//! them on the blocking pool under a timeout.

use std::path::PathBuf;

use crate::adapters::canonical::{load_asset, sniff_kind};
use crate::adapters::record::MAX_RECORD_SIZE;
use crate::domain::error::{EngineError, EngineResult};
use crate::domain::types::{AssetRef, LimitsConfig, MediaArtifact, MediaKind};

/// A capture device yielding raw media bytes and their kind.
pub trait MediaSource: Send + Sync {
  fn acquire(&self) -> EngineResult<MediaArtifact>;
}

/// An uploaded file: arbitrary bytes plus whatever the uploader claimed.
#[derive(Clone, Default)]
pub struct UploadedFile {
  pub bytes: Vec<u8>,
  /// Declared MIME type. Informational only.
  pub declared_mime: Option<String>,
  pub name: Option<String>,
}

impl std::fmt::Debug for UploadedFile {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("UploadedFile")
      .field("len", &self.bytes.len())
      .field("declared_mime", &self.declared_mime)
      .field("name", &self.name)
      .finish()
  }
}

/// A file-selection abstraction.
pub trait FileSource: Send + Sync {
  fn open(&self) -> EngineResult<UploadedFile>;
}

impl MediaSource for MediaArtifact {
  fn acquire(&self) -> EngineResult<MediaArtifact> {
    Ok(self.clone())
  }
}

impl FileSource for UploadedFile {
  fn open(&self) -> EngineResult<UploadedFile> {
    Ok(self.clone())
  }
}

/// Media or upload backed by an `AssetRef`, read under `LimitsConfig`.
#[derive(Debug, Clone)]
pub struct AssetSource {
  pub asset: AssetRef,
  /// Kind to report when acting as a capture device. `None` sniffs the bytes.
  pub kind: Option<MediaKind>,
  pub limits: LimitsConfig,
}

impl AssetSource {
  pub fn path(path: impl Into<PathBuf>) -> Self {
    Self {
      asset: AssetRef::Path(path.into()),
      kind: None,
      limits: LimitsConfig::defaults(),
    }
  }

  /// Signature record file. Reads stop at `MAX_RECORD_SIZE` whatever limits
  /// the media is read under.
  pub fn record(path: impl Into<PathBuf>) -> Self {
    let mut source = Self::path(path);
    source.limits.max_in_memory_asset_size = MAX_RECORD_SIZE;
    source.limits.max_stream_copy_size = MAX_RECORD_SIZE;
    source
  }

  pub fn bytes(data: Vec<u8>) -> Self {
    Self {
      asset: AssetRef::Bytes { data },
      kind: None,
      limits: LimitsConfig::defaults(),
    }
  }

  pub fn with_kind(mut self, kind: MediaKind) -> Self {
    self.kind = Some(kind);
    self
  }

  pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
    self.limits = limits;
    self
  }
}

impl MediaSource for AssetSource {
  fn acquire(&self) -> EngineResult<MediaArtifact> {
    let bytes = load_asset(&self.asset, self.limits)?;
    let kind = match self.kind {
      Some(kind) => kind,
      None => sniff_kind(&bytes)
        .ok_or_else(|| EngineError::UnsupportedFormat("unrecognized media container".into()))?,
    };
    Ok(MediaArtifact::new(kind, bytes))
  }
}

impl FileSource for AssetSource {
  fn open(&self) -> EngineResult<UploadedFile> {
    let name = match &self.asset {
      AssetRef::Path(p) => p.file_name().map(|n| n.to_string_lossy().into_owned()),
      AssetRef::Bytes { .. } => None,
    };
    Ok(UploadedFile {
      bytes: load_asset(&self.asset, self.limits)?,
      declared_mime: None,
      name,
    })
  }
}
