//! Signature records carried inside the media file itself.
//!
//! PNG files get a `tEXt` chunk keyed `TrueShot`; JPEG files get an EXIF
//! `UserComment` in an APP1 segment. Neither changes the decoded pixels, so
//! the carrier canonicalizes to the same bytes and keeps its digest.

use std::io::Cursor;
use std::ops::Range;

use tracing::debug;

use crate::adapters::canonical::{detect_container, Container};
use crate::domain::error::{EngineError, EngineResult};
use crate::domain::record::SignatureRecord;

use super::codec::{encode, MAX_RECORD_SIZE};

/// Text keyword the record is stored under.
pub const EMBED_KEY: &str = "TrueShot";

const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const SOS: u8 = 0xDA;
const EOI: u8 = 0xD9;

const EXIF_HEADER: &[u8] = b"Exif\0\0";
const USER_COMMENT_CHARSET: &[u8; 8] = b"ASCII\0\0\0";
const TAG_EXIF_IFD: u16 = 0x8769;
const TAG_USER_COMMENT: u16 = 0x9286;
const TYPE_UNDEFINED: u16 = 7;
const TYPE_LONG: u16 = 4;

/// Copy of `media` with `record` embedded, replacing any record embedded
/// earlier. Only PNG and JPEG stills can carry one.
pub fn embed_record(media: &[u8], record: &SignatureRecord) -> EngineResult<Vec<u8>> {
  let json = encode(record)?;
  let out = match detect_container(media) {
    Some(Container::Png) => embed_png(media, &json)?,
    Some(Container::Jpeg) => embed_jpeg(media, &json)?,
    other => {
      return Err(EngineError::UnsupportedFormat(format!(
        "cannot embed a signature record in {}",
        other.map(Container::mime_type).unwrap_or("unrecognized media")
      )))
    }
  };
  debug!(before = media.len(), after = out.len(), "signature record embedded");
  Ok(out)
}

/// Encoded record embedded in `media`, if there is one. The bytes still have
/// to go through [`super::decode`]; a damaged record is returned as found.
pub fn extract_record(media: &[u8]) -> Option<Vec<u8>> {
  let found = match detect_container(media)? {
    Container::Png => extract_png(media),
    Container::Jpeg => extract_jpeg(media),
    _ => None,
  };
  found.filter(|bytes| bytes.len() <= MAX_RECORD_SIZE)
}

fn png_error(e: impl std::fmt::Display) -> EngineError {
  EngineError::UnsupportedFormat(format!("png: {e}"))
}

// Re-encodes the stored samples untouched; only the ancillary chunks change.
fn embed_png(media: &[u8], json: &[u8]) -> EngineResult<Vec<u8>> {
  let text = String::from_utf8(json.to_vec()).map_err(|e| EngineError::MalformedRecord(e.to_string()))?;

  let mut decoder = png::Decoder::new(Cursor::new(media));
  decoder.set_transformations(png::Transformations::IDENTITY);
  let mut reader = decoder.read_info().map_err(png_error)?;
  let mut samples = vec![0; reader.output_buffer_size()];
  let frame = reader.next_frame(&mut samples).map_err(png_error)?;
  samples.truncate(frame.buffer_size());
  let info = reader.info();

  let mut out = Vec::with_capacity(media.len() + json.len() + 64);
  let mut encoder = png::Encoder::new(&mut out, info.width, info.height);
  encoder.set_color(info.color_type);
  encoder.set_depth(info.bit_depth);
  if let Some(palette) = &info.palette {
    encoder.set_palette(palette.to_vec());
  }
  if let Some(trns) = &info.trns {
    encoder.set_trns(trns.to_vec());
  }
  for chunk in info.uncompressed_latin1_text.iter().filter(|c| c.keyword != EMBED_KEY) {
    encoder
      .add_text_chunk(chunk.keyword.clone(), chunk.text.clone())
      .map_err(png_error)?;
  }
  encoder.add_text_chunk(EMBED_KEY.to_string(), text).map_err(png_error)?;

  let mut writer = encoder.write_header().map_err(png_error)?;
  writer.write_image_data(&samples).map_err(png_error)?;
  writer.finish().map_err(png_error)?;
  Ok(out)
}

// Text chunks ahead of the image data are parsed by `read_info`; that is
// where the encoder puts ours.
fn extract_png(media: &[u8]) -> Option<Vec<u8>> {
  let reader = png::Decoder::new(Cursor::new(media)).read_info().ok()?;
  reader
    .info()
    .uncompressed_latin1_text
    .iter()
    .find(|chunk| chunk.keyword == EMBED_KEY)
    .map(|chunk| chunk.text.clone().into_bytes())
}

/// A marker segment ahead of the scan data. `start` points at the marker's
/// first 0xFF; `body` excludes the marker and length bytes.
struct Segment {
  marker: u8,
  start: usize,
  body: Range<usize>,
}

impl Segment {
  fn end(&self) -> usize {
    self.body.end
  }
}

fn jpeg_header(media: &[u8]) -> Option<Vec<Segment>> {
  if !media.starts_with(&[0xFF, 0xD8]) {
    return None;
  }
  let mut segments = Vec::new();
  let mut pos = 2;
  loop {
    if *media.get(pos)? != 0xFF {
      return None;
    }
    let mut at = pos + 1;
    while *media.get(at)? == 0xFF {
      at += 1;
    }
    let marker = media[at];
    if marker == SOS || marker == EOI {
      return Some(segments);
    }
    let len = u16::from_be_bytes([*media.get(at + 1)?, *media.get(at + 2)?]) as usize;
    if len < 2 || at + 1 + len > media.len() {
      return None;
    }
    let body = at + 3..at + 1 + len;
    let next = body.end;
    segments.push(Segment { marker, start: pos, body });
    pos = next;
  }
}

fn embed_jpeg(media: &[u8], json: &[u8]) -> EngineResult<Vec<u8>> {
  let segments =
    jpeg_header(media).ok_or_else(|| EngineError::UnsupportedFormat("jpeg: unreadable marker segments".into()))?;
  let app1 = exif_segment(json)?;

  // Ours goes after any JFIF APP0; earlier records are dropped.
  let mut out = Vec::with_capacity(media.len() + app1.len());
  out.extend_from_slice(&media[..2]);
  let mut inserted = false;
  let mut scan = 2;
  for seg in &segments {
    if !inserted && seg.marker != APP0 {
      out.extend_from_slice(&app1);
      inserted = true;
    }
    if !carries_record(media, seg) {
      out.extend_from_slice(&media[seg.start..seg.end()]);
    }
    scan = seg.end();
  }
  if !inserted {
    out.extend_from_slice(&app1);
  }
  out.extend_from_slice(&media[scan..]);
  Ok(out)
}

fn extract_jpeg(media: &[u8]) -> Option<Vec<u8>> {
  jpeg_header(media)?
    .iter()
    .filter(|seg| seg.marker == APP1)
    .filter_map(|seg| exif_user_comment(&media[seg.body.clone()]))
    .find(|comment| looks_like_record(comment))
}

fn carries_record(media: &[u8], seg: &Segment) -> bool {
  seg.marker == APP1
    && exif_user_comment(&media[seg.body.clone()]).is_some_and(|comment| looks_like_record(&comment))
}

// Cameras write their own UserComment; ours is a JSON object with a hash.
fn looks_like_record(bytes: &[u8]) -> bool {
  serde_json::from_slice::<serde_json::Value>(bytes).is_ok_and(|v| v.get("hash").is_some())
}

/// Little-endian EXIF block: IFD0 holds only the Exif IFD pointer and the
/// Exif IFD holds only `UserComment`.
fn exif_segment(json: &[u8]) -> EngineResult<Vec<u8>> {
  const IFD0_AT: u32 = 8;
  const EXIF_IFD_AT: u32 = IFD0_AT + 18;
  const COMMENT_AT: u32 = EXIF_IFD_AT + 18;

  let comment_len = USER_COMMENT_CHARSET.len() + json.len();
  let mut tiff = Vec::with_capacity(COMMENT_AT as usize + comment_len);
  tiff.extend_from_slice(b"II*\0");
  tiff.extend_from_slice(&IFD0_AT.to_le_bytes());
  push_single_entry_ifd(&mut tiff, TAG_EXIF_IFD, TYPE_LONG, 1, EXIF_IFD_AT);
  push_single_entry_ifd(&mut tiff, TAG_USER_COMMENT, TYPE_UNDEFINED, comment_len as u32, COMMENT_AT);
  tiff.extend_from_slice(USER_COMMENT_CHARSET);
  tiff.extend_from_slice(json);

  let len = u16::try_from(2 + EXIF_HEADER.len() + tiff.len()).map_err(|_| {
    EngineError::MalformedRecord(format!("{}-byte record does not fit in a JPEG APP1 segment", json.len()))
  })?;
  let mut seg = Vec::with_capacity(len as usize + 2);
  seg.extend_from_slice(&[0xFF, APP1]);
  seg.extend_from_slice(&len.to_be_bytes());
  seg.extend_from_slice(EXIF_HEADER);
  seg.extend_from_slice(&tiff);
  Ok(seg)
}

fn push_single_entry_ifd(out: &mut Vec<u8>, tag: u16, kind: u16, count: u32, value: u32) {
  out.extend_from_slice(&1u16.to_le_bytes());
  out.extend_from_slice(&tag.to_le_bytes());
  out.extend_from_slice(&kind.to_le_bytes());
  out.extend_from_slice(&count.to_le_bytes());
  out.extend_from_slice(&value.to_le_bytes());
  out.extend_from_slice(&0u32.to_le_bytes());
}

/// `UserComment` payload (without its charset prefix) from an APP1 body,
/// in either TIFF byte order.
fn exif_user_comment(body: &[u8]) -> Option<Vec<u8>> {
  let tiff = body.strip_prefix(EXIF_HEADER)?;
  let little = match tiff.get(..4)? {
    b"II*\0" => true,
    b"MM\0*" => false,
    _ => return None,
  };
  let u16_at = |at: usize| -> Option<u16> {
    let b: [u8; 2] = tiff.get(at..at + 2)?.try_into().ok()?;
    Some(if little { u16::from_le_bytes(b) } else { u16::from_be_bytes(b) })
  };
  let u32_at = |at: usize| -> Option<u32> {
    let b: [u8; 4] = tiff.get(at..at + 4)?.try_into().ok()?;
    Some(if little { u32::from_le_bytes(b) } else { u32::from_be_bytes(b) })
  };
  // (count, value-or-offset) of `tag` in the IFD at `ifd`.
  let entry = |ifd: usize, tag: u16| -> Option<(usize, usize)> {
    let n = u16_at(ifd)? as usize;
    let at = (0..n).map(|i| ifd + 2 + i * 12).find(|&e| u16_at(e) == Some(tag))?;
    Some((u32_at(at + 4)? as usize, u32_at(at + 8)? as usize))
  };

  let (_, exif_ifd) = entry(u32_at(4)? as usize, TAG_EXIF_IFD)?;
  let (count, offset) = entry(exif_ifd, TAG_USER_COMMENT)?;
  let comment = tiff.get(offset..offset.checked_add(count)?)?;
  let text = comment.get(USER_COMMENT_CHARSET.len()..)?;
  let trimmed = text.iter().rposition(|&b| b != 0).map_or(&text[..0], |last| &text[..=last]);
  Some(trimmed.to_vec())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn jpeg_with(segments: &[(u8, &[u8])]) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];
    for (marker, body) in segments {
      out.extend_from_slice(&[0xFF, *marker]);
      out.extend_from_slice(&((body.len() + 2) as u16).to_be_bytes());
      out.extend_from_slice(body);
    }
    out.extend_from_slice(&[0xFF, SOS, 0x00, 0x02, 0x12, 0x34, 0xFF, EOI]);
    out
  }

  #[test]
  fn exif_comment_reads_back() {
    let json = br#"{"hash":{"value":"00"}}"#;
    let seg = exif_segment(json).unwrap();
    assert_eq!(&seg[..2], &[0xFF, APP1]);
    assert_eq!(u16::from_be_bytes([seg[2], seg[3]]) as usize, seg.len() - 2);
    assert_eq!(exif_user_comment(&seg[4..]).unwrap(), json.to_vec());
  }

  #[test]
  fn big_endian_exif_is_read() {
    let mut tiff = b"MM\0*".to_vec();
    tiff.extend_from_slice(&8u32.to_be_bytes());
    for (tag, kind, count, value) in [(TAG_EXIF_IFD, TYPE_LONG, 1u32, 26u32), (TAG_USER_COMMENT, TYPE_UNDEFINED, 10, 44)] {
      tiff.extend_from_slice(&1u16.to_be_bytes());
      tiff.extend_from_slice(&tag.to_be_bytes());
      tiff.extend_from_slice(&kind.to_be_bytes());
      tiff.extend_from_slice(&count.to_be_bytes());
      tiff.extend_from_slice(&value.to_be_bytes());
      tiff.extend_from_slice(&0u32.to_be_bytes());
    }
    tiff.extend_from_slice(b"ASCII\0\0\0{}");
    let mut body = EXIF_HEADER.to_vec();
    body.extend_from_slice(&tiff);
    assert_eq!(exif_user_comment(&body).unwrap(), b"{}".to_vec());
  }

  #[test]
  fn truncated_exif_is_ignored() {
    let seg = exif_segment(br#"{"hash":1}"#).unwrap();
    for cut in [6, 10, 20, 40, seg.len() - 5] {
      assert!(exif_user_comment(&seg[4..cut]).is_none(), "cut at {cut}");
    }
  }

  #[test]
  fn jpeg_segments_stop_at_scan() {
    let jpeg = jpeg_with(&[(APP0, b"JFIF\0"), (0xDB, &[0; 5])]);
    let segments = jpeg_header(&jpeg).unwrap();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].start, 2);
    assert_eq!(segments[1].start, segments[0].end());
    assert_eq!(jpeg[segments[1].end() + 1], SOS);
    assert!(jpeg_header(&jpeg[..9]).is_none());
  }

  #[test]
  fn camera_comments_survive_and_old_records_are_replaced() {
    let camera = exif_segment(b"shot on a phone").unwrap();
    let old = exif_segment(br#"{"hash":"old"}"#).unwrap();
    let jpeg = jpeg_with(&[(APP0, b"JFIF\0"), (APP1, &camera[4..]), (APP1, &old[4..])]);

    let out = embed_jpeg(&jpeg, br#"{"hash":"new"}"#).unwrap();
    let segments = jpeg_header(&out).unwrap();
    let comments: Vec<_> = segments
      .iter()
      .filter(|s| s.marker == APP1)
      .filter_map(|s| exif_user_comment(&out[s.body.clone()]))
      .collect();
    assert_eq!(segments[0].marker, APP0);
    assert_eq!(comments, vec![br#"{"hash":"new"}"#.to_vec(), b"shot on a phone".to_vec()]);
    assert_eq!(extract_jpeg(&out).unwrap(), br#"{"hash":"new"}"#.to_vec());
    assert!(out.ends_with(&[0xFF, SOS, 0x00, 0x02, 0x12, 0x34, 0xFF, EOI]));
  }
}
