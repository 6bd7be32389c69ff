// Canonicalizer: raw media -> one deterministic byte sequence per artifact.

mod constants;
mod content_detection;
mod asset_utils;
mod image;
pub mod video;

use std::borrow::Cow;
use std::sync::Arc;

use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::error::{EngineError, EngineResult};
use crate::domain::types::{CanonicalProfile, EngineDefaults, MediaArtifact, MediaKind, VideoPolicy};

pub use asset_utils::*;
pub use constants::*;
pub use content_detection::*;
pub use self::image::{decode_pixels, encode_raster};
pub use video::{AnimatedImageDecoder, FrameDecoder, TimedFrame, VideoPayload};

/// Deterministic encoding of a media artifact under a named profile.
///
/// For a fixed artifact and profile the bytes are identical across runs and
/// platforms; that determinism is what makes the digest meaningful.
#[derive(Clone)]
pub struct CanonicalForm {
  profile: CanonicalProfile,
  frame_count: u32,
  partial: bool,
  body: Body,
}

#[derive(Clone)]
enum Body {
  Raster(Vec<u8>),
  Video(VideoPayload),
}

impl CanonicalForm {
  pub fn kind(&self) -> MediaKind {
    self.profile.media_kind()
  }

  pub fn profile(&self) -> CanonicalProfile {
    self.profile
  }

  /// Number of committed frames (1 for images).
  pub fn frame_count(&self) -> u32 {
    self.frame_count
  }

  /// Whether a video capture produced fewer windows than expected.
  pub fn is_partial(&self) -> bool {
    self.partial
  }

  /// Payload length in bytes.
  pub fn len(&self) -> usize {
    match &self.body {
      Body::Raster(bytes) => bytes.len(),
      Body::Video(payload) => payload.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// The payload as consecutive slices, without materializing repeated
  /// video windows.
  pub fn chunks(&self) -> Box<dyn Iterator<Item = &[u8]> + '_> {
    match &self.body {
      Body::Raster(bytes) => Box::new(std::iter::once(bytes.as_slice())),
      Body::Video(payload) => Box::new(payload.chunks()),
    }
  }

  /// The full payload. Borrowed for images; video payloads are copied out
  /// window by window, so hashing should go through [`CanonicalForm::chunks`].
  pub fn bytes(&self) -> Cow<'_, [u8]> {
    match &self.body {
      Body::Raster(bytes) => Cow::Borrowed(bytes.as_slice()),
      Body::Video(payload) => {
        let mut out = Vec::with_capacity(payload.len());
        payload.chunks().for_each(|c| out.extend_from_slice(c));
        Cow::Owned(out)
      }
    }
  }
}

impl PartialEq for CanonicalForm {
  fn eq(&self, other: &Self) -> bool {
    self.profile == other.profile
      && self.frame_count == other.frame_count
      && self.partial == other.partial
      && self.len() == other.len()
      && self.chunks().flatten().eq(other.chunks().flatten())
  }
}

impl Eq for CanonicalForm {}

impl std::fmt::Debug for CanonicalForm {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CanonicalForm")
      .field("profile", &self.profile)
      .field("frame_count", &self.frame_count)
      .field("partial", &self.partial)
      .field("len", &self.len())
      .finish()
  }
}

/// Applies canonicalization profiles. Cheap to clone and safe to share
/// between concurrent operations: it holds no mutable state.
#[derive(Clone)]
pub struct Canonicalizer {
  decoder: Arc<dyn FrameDecoder>,
  video: VideoPolicy,
}

impl Default for Canonicalizer {
  fn default() -> Self {
    Self::new(VideoPolicy::default())
  }
}

impl Canonicalizer {
  pub fn new(video: VideoPolicy) -> Self {
    Self::with_decoder(Arc::new(AnimatedImageDecoder), video)
  }

  pub fn with_decoder(decoder: Arc<dyn FrameDecoder>, video: VideoPolicy) -> Self {
    Self { decoder, video }
  }

  /// Canonicalize under the current profile for the artifact's kind.
  pub fn canonicalize(&self, artifact: &MediaArtifact) -> EngineResult<CanonicalForm> {
    self.canonicalize_as(artifact, CanonicalProfile::default_for(artifact.kind()))
  }

  /// Canonicalize under an explicit profile (verifiers replay the record's).
  pub fn canonicalize_as(
    &self,
    artifact: &MediaArtifact,
    profile: CanonicalProfile,
  ) -> EngineResult<CanonicalForm> {
    match profile {
      CanonicalProfile::ImageRgba8V1 => {
        let pixels = decode_pixels(artifact.bytes())?;
        debug!(width = pixels.width(), height = pixels.height(), "image decoded");
        Ok(CanonicalForm {
          profile,
          frame_count: 1,
          partial: false,
          body: Body::Raster(encode_raster(&pixels)),
        })
      }
      CanonicalProfile::VideoFrameAvgV1 => {
        #[cfg(not(feature = "video"))]
        {
          return Err(EngineError::Feature("video"));
        }
        #[cfg(feature = "video")]
        {
          let frames = self.decoder.decode(artifact.bytes())?;
          let payload = video::canonicalize_frames(
            frames,
            EngineDefaults::VIDEO_WINDOW_MS,
            EngineDefaults::VIDEO_FRAME_SIDE,
          )?;
          Ok(self.video_form(payload))
        }
      }
    }
  }

  /// Same bytes as [`Canonicalizer::canonicalize_as`], computed on the blocking
  /// pool. Video windows are reduced concurrently and reassembled in window
  /// order, whatever order the workers finish in.
  pub async fn canonicalize_parallel(
    &self,
    artifact: MediaArtifact,
    profile: CanonicalProfile,
  ) -> EngineResult<CanonicalForm> {
    self.canonicalize_cancellable(artifact, profile, CancellationToken::new()).await
  }

  /// [`Canonicalizer::canonicalize_parallel`] that stops once `cancel` fires.
  /// Queued window workers check the token before reducing their frames, so
  /// a cancelled capture stops consuming the blocking pool.
  pub async fn canonicalize_cancellable(
    &self,
    artifact: MediaArtifact,
    profile: CanonicalProfile,
    cancel: CancellationToken,
  ) -> EngineResult<CanonicalForm> {
    match profile {
      CanonicalProfile::ImageRgba8V1 => {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.canonicalize_as(&artifact, profile))
          .await
          .map_err(join_error)?
      }
      CanonicalProfile::VideoFrameAvgV1 => {
        #[cfg(not(feature = "video"))]
        {
          let _ = cancel;
          return Err(EngineError::Feature("video"));
        }
        #[cfg(feature = "video")]
        {
          let decoder = self.decoder.clone();
          let plan = tokio::task::spawn_blocking(move || {
            let frames = decoder.decode(artifact.bytes())?;
            video::group_windows(frames, EngineDefaults::VIDEO_WINDOW_MS)
          })
          .await
          .map_err(join_error)??;
          if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
          }

          let side = EngineDefaults::VIDEO_FRAME_SIDE;
          let handles: Vec<_> = plan
            .groups
            .into_iter()
            .map(|group| {
              let cancel = cancel.clone();
              tokio::task::spawn_blocking(move || {
                if cancel.is_cancelled() {
                  return Err(EngineError::Cancelled);
                }
                video::canonical_window(group, side)
              })
            })
            .collect();

          let mut rasters = Vec::with_capacity(handles.len());
          for handle in handles {
            rasters.push(handle.await.map_err(join_error)??);
          }
          let payload = video::assemble(rasters, plan.layout, EngineDefaults::VIDEO_WINDOW_MS, side)?;
          Ok(self.video_form(payload))
        }
      }
    }
  }

  fn video_form(&self, payload: VideoPayload) -> CanonicalForm {
    let frame_count = payload.frame_count();
    let partial = frame_count < self.video.expected_windows;
    if partial {
      debug!(frame_count, expected = self.video.expected_windows, "partial video capture");
    }
    CanonicalForm {
      profile: CanonicalProfile::VideoFrameAvgV1,
      frame_count,
      partial,
      body: Body::Video(payload),
    }
  }
}

pub(crate) fn join_error(e: JoinError) -> EngineError {
  if e.is_cancelled() {
    EngineError::Cancelled
  } else {
    EngineError::Panic(e.to_string())
  }
}

/// Media kind implied by the bytes themselves, if recognizable.
pub fn sniff_kind(bytes: &[u8]) -> Option<MediaKind> {
  detect_container(bytes).map(Container::media_kind)
}

/// Canonicalize with the default canonicalizer.
pub fn canonicalize(artifact: &MediaArtifact) -> EngineResult<CanonicalForm> {
  Canonicalizer::default().canonicalize(artifact)
}
