//! Video canonicalization: fixed windows, per-window frame averaging,
//! fixed-size reduction. Re-muxing or re-encoding without content change
//! keeps the fingerprint; a truncated capture is fingerprinted as-is.

use std::io::Cursor;

use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::imageops::FilterType;
use image::{AnimationDecoder, RgbaImage};
use tracing::debug;

use crate::domain::error::{EngineError, EngineResult};
use super::constants::{RGBA_CHANNELS, VIDEO_MAGIC};
use super::content_detection::{detect_container, Container};
use super::image::{decode_pixels, encode_raster};

/// Longest capture accepted, in windows (one hour at 1000 ms).
pub const MAX_WINDOWS: u64 = 3600;

/// A decoded frame and the instant (from capture start) it appears.
#[derive(Debug, Clone)]
pub struct TimedFrame {
  pub start_us: u64,
  pub image: RgbaImage,
}

/// Turns container bytes into presentation-ordered frames.
///
/// The built-in [`AnimatedImageDecoder`] handles GIF and APNG captures;
/// platform decoders for MP4/WebM plug in here.
pub trait FrameDecoder: Send + Sync {
  fn decode(&self, bytes: &[u8]) -> EngineResult<Vec<TimedFrame>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnimatedImageDecoder;

impl FrameDecoder for AnimatedImageDecoder {
  fn decode(&self, bytes: &[u8]) -> EngineResult<Vec<TimedFrame>> {
    match detect_container(bytes) {
      Some(Container::Gif | Container::AnimatedGif) => {
        timed_frames(GifDecoder::new(Cursor::new(bytes))?)
      }
      Some(Container::Png | Container::Apng) => {
        let decoder = PngDecoder::new(Cursor::new(bytes))?;
        if decoder.is_apng() {
          timed_frames(decoder.apng())
        } else {
          single_frame(bytes)
        }
      }
      Some(Container::Mp4 | Container::Mov | Container::WebM) => Err(EngineError::UnsupportedFormat(
        "container needs a platform frame decoder".into(),
      )),
      Some(_) => single_frame(bytes),
      None => Err(EngineError::UnsupportedFormat("unrecognized video container".into())),
    }
  }
}

fn single_frame(bytes: &[u8]) -> EngineResult<Vec<TimedFrame>> {
  Ok(vec![TimedFrame { start_us: 0, image: decode_pixels(bytes)? }])
}

fn timed_frames<'a, D: AnimationDecoder<'a>>(decoder: D) -> EngineResult<Vec<TimedFrame>> {
  let mut frames = Vec::new();
  let mut elapsed_us = 0u64;
  for frame in decoder.into_frames() {
    let frame = frame?;
    let (numer, denom) = frame.delay().numer_denom_ms();
    frames.push(TimedFrame {
      start_us: elapsed_us,
      image: frame.into_buffer(),
    });
    if denom > 0 {
      elapsed_us = elapsed_us.saturating_add(numer as u64 * 1000 / denom as u64);
    }
  }
  Ok(frames)
}

/// Windows of a capture as distinct frame groups plus, per window, the
/// index of the group it shows. A run of windows in which no frame starts
/// shares one group holding the frame still on screen, so a long still
/// stretch costs one frame rather than one per window.
#[derive(Debug)]
pub struct WindowPlan {
  pub groups: Vec<Vec<RgbaImage>>,
  pub layout: Vec<usize>,
}

impl WindowPlan {
  pub fn window_count(&self) -> usize {
    self.layout.len()
  }
}

/// Bucket frames into consecutive windows by start time.
pub fn group_windows(frames: Vec<TimedFrame>, window_ms: u32) -> EngineResult<WindowPlan> {
  let first = frames
    .first()
    .ok_or_else(|| EngineError::UnsupportedFormat("no frames decoded".into()))?;
  let dims = first.image.dimensions();
  if dims.0 == 0 || dims.1 == 0 {
    return Err(EngineError::UnsupportedFormat("frame has no pixels".into()));
  }
  if let Some(bad) = frames.iter().find(|f| f.image.dimensions() != dims) {
    return Err(EngineError::UnsupportedFormat(format!(
      "frame size changed mid-capture: {:?} then {:?}",
      dims,
      bad.image.dimensions()
    )));
  }

  let window_us = window_ms as u64 * 1000;
  let last_start = frames.iter().map(|f| f.start_us).max().unwrap_or(0);
  let count = last_start / window_us + 1;
  if count > MAX_WINDOWS {
    return Err(EngineError::UnsupportedFormat(format!("capture spans {count} windows")));
  }

  let mut buckets: Vec<Vec<RgbaImage>> = (0..count).map(|_| Vec::new()).collect();
  for frame in frames {
    buckets[(frame.start_us / window_us) as usize].push(frame.image);
  }

  let mut groups: Vec<Vec<RgbaImage>> = Vec::new();
  let mut layout = Vec::with_capacity(buckets.len());
  let mut held: Option<usize> = None;
  for bucket in buckets {
    if bucket.is_empty() {
      let group = match held {
        Some(g) => g,
        None => {
          let on_screen = groups
            .last()
            .and_then(|g| g.last())
            .cloned()
            .ok_or_else(|| EngineError::UnsupportedFormat("no frame on screen in first window".into()))?;
          groups.push(vec![on_screen]);
          groups.len() - 1
        }
      };
      held = Some(group);
      layout.push(group);
    } else {
      groups.push(bucket);
      layout.push(groups.len() - 1);
      held = None;
    }
  }
  Ok(WindowPlan { groups, layout })
}

/// Per-channel integer mean over equally sized frames (truncating).
pub fn average_frames(frames: &[RgbaImage]) -> EngineResult<RgbaImage> {
  let first = frames
    .first()
    .ok_or_else(|| EngineError::UnsupportedFormat("empty frame window".into()))?;
  if frames.len() == 1 {
    return Ok(first.clone());
  }
  let (w, h) = first.dimensions();
  let mut sums = vec![0u32; w as usize * h as usize * RGBA_CHANNELS];
  for frame in frames {
    for (sum, v) in sums.iter_mut().zip(frame.as_raw()) {
      *sum += *v as u32;
    }
  }
  let n = frames.len() as u32;
  let averaged: Vec<u8> = sums.into_iter().map(|s| (s / n) as u8).collect();
  RgbaImage::from_raw(w, h, averaged)
    .ok_or_else(|| EngineError::UnsupportedFormat("frame buffer size mismatch".into()))
}

/// Canonical raster for one window: averaged, then reduced to `side`x`side`.
pub fn canonical_window(frames: Vec<RgbaImage>, side: u32) -> EngineResult<Vec<u8>> {
  let averaged = average_frames(&frames)?;
  let reduced = image::imageops::resize(&averaged, side, side, FilterType::Triangle);
  Ok(encode_raster(&reduced))
}

/// Canonical video payload: the header followed by one raster per window,
/// in window order. Windows showing the same group share a raster, so the
/// payload is held as distinct rasters plus the window layout and streamed
/// through [`VideoPayload::chunks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoPayload {
  header: Vec<u8>,
  rasters: Vec<Vec<u8>>,
  layout: Vec<usize>,
}

impl VideoPayload {
  pub fn frame_count(&self) -> u32 {
    self.layout.len() as u32
  }

  /// Number of rasters actually stored.
  pub fn distinct_rasters(&self) -> usize {
    self.rasters.len()
  }

  pub fn len(&self) -> usize {
    self.header.len() + self.layout.iter().map(|&g| self.rasters[g].len()).sum::<usize>()
  }

  pub fn is_empty(&self) -> bool {
    self.layout.is_empty()
  }

  pub fn chunks(&self) -> impl Iterator<Item = &[u8]> + '_ {
    std::iter::once(self.header.as_slice()).chain(self.layout.iter().map(|&g| self.rasters[g].as_slice()))
  }
}

/// Put group rasters behind the video header in window order.
pub fn assemble(group_rasters: Vec<Vec<u8>>, layout: Vec<usize>, window_ms: u32, side: u32) -> EngineResult<VideoPayload> {
  if layout.iter().any(|&g| g >= group_rasters.len()) {
    return Err(EngineError::UnsupportedFormat("window refers to a missing frame group".into()));
  }
  let mut header = Vec::with_capacity(VIDEO_MAGIC.len() + 12);
  header.extend_from_slice(VIDEO_MAGIC);
  header.extend_from_slice(&window_ms.to_be_bytes());
  header.extend_from_slice(&(layout.len() as u32).to_be_bytes());
  header.extend_from_slice(&side.to_be_bytes());
  let payload = VideoPayload { header, rasters: group_rasters, layout };
  debug!(
    windows = payload.layout.len(),
    rasters = payload.rasters.len(),
    bytes = payload.len(),
    "video canonical payload assembled"
  );
  Ok(payload)
}

/// Sequential variant of the full video path.
pub fn canonicalize_frames(frames: Vec<TimedFrame>, window_ms: u32, side: u32) -> EngineResult<VideoPayload> {
  let plan = group_windows(frames, window_ms)?;
  let rasters = plan
    .groups
    .into_iter()
    .map(|g| canonical_window(g, side))
    .collect::<EngineResult<Vec<_>>>()?;
  assemble(rasters, plan.layout, window_ms, side)
}
