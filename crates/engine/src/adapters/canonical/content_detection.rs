use crate::domain::types::MediaKind;

/// Containers recognized by magic number. Declared MIME types from uploads
/// are never trusted; this is what the bytes actually are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
  Jpeg,
  Png,
  Apng,
  Gif,
  AnimatedGif,
  WebP,
  Bmp,
  Tiff,
  Mp4,
  Mov,
  WebM,
}

impl Container {
  /// Kind of media this container normally carries.
  pub fn media_kind(self) -> MediaKind {
    match self {
      Container::Apng | Container::AnimatedGif | Container::Mp4 | Container::Mov | Container::WebM => {
        MediaKind::Video
      }
      _ => MediaKind::Image,
    }
  }

  pub fn mime_type(self) -> &'static str {
    match self {
      Container::Jpeg => "image/jpeg",
      Container::Png => "image/png",
      Container::Apng => "image/apng",
      Container::Gif | Container::AnimatedGif => "image/gif",
      Container::WebP => "image/webp",
      Container::Bmp => "image/bmp",
      Container::Tiff => "image/tiff",
      Container::Mp4 => "video/mp4",
      Container::Mov => "video/quicktime",
      Container::WebM => "video/webm",
    }
  }
}

pub fn detect_container(data: &[u8]) -> Option<Container> {
  // JPEG
  if data.len() >= 3 && data[0] == 0xFF && data[1] == 0xD8 && data[2] == 0xFF {
    return Some(Container::Jpeg);
  }

  // PNG / APNG
  if data.len() >= 8 && data[..8] == [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A] {
    return Some(if has_png_animation_control(data) { Container::Apng } else { Container::Png });
  }

  // GIF
  if data.len() >= 6 && (&data[..6] == b"GIF87a" || &data[..6] == b"GIF89a") {
    return Some(if contains(data, b"NETSCAPE2.0") { Container::AnimatedGif } else { Container::Gif });
  }

  // WebP
  if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
    return Some(Container::WebP);
  }

  // BMP
  if data.len() >= 2 && &data[..2] == b"BM" {
    return Some(Container::Bmp);
  }

  // TIFF
  if data.len() >= 4 && ((&data[..4] == b"II*\0") || (&data[..4] == b"MM\0*")) {
    return Some(Container::Tiff);
  }

  // MP4/MOV (ftyp box)
  if data.len() >= 12 && &data[4..8] == b"ftyp" {
    if &data[8..12] == b"qt  " {
      return Some(Container::Mov);
    }
    return Some(Container::Mp4);
  }

  // WebM / Matroska (EBML header)
  if data.len() >= 4 && data[..4] == [0x1A, 0x45, 0xDF, 0xA3] {
    return Some(Container::WebM);
  }

  None
}

/// Map a declared MIME type to a container, for comparison with what was sniffed.
pub fn container_from_mime(mime: &str) -> Option<Container> {
  let mime = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
  match mime.as_str() {
    "image/jpeg" | "image/jpg" => Some(Container::Jpeg),
    "image/png" => Some(Container::Png),
    "image/apng" => Some(Container::Apng),
    "image/gif" => Some(Container::Gif),
    "image/webp" => Some(Container::WebP),
    "image/bmp" => Some(Container::Bmp),
    "image/tiff" => Some(Container::Tiff),
    "video/mp4" => Some(Container::Mp4),
    "video/quicktime" => Some(Container::Mov),
    "video/webm" => Some(Container::WebM),
    _ => None,
  }
}

// Walks PNG chunks looking for `acTL` before the first `IDAT`.
fn has_png_animation_control(data: &[u8]) -> bool {
  let mut pos = 8;
  while pos + 8 <= data.len() {
    let len = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
    let kind = &data[pos + 4..pos + 8];
    if kind == b"acTL" {
      return true;
    }
    if kind == b"IDAT" {
      return false;
    }
    pos = match pos.checked_add(12 + len) {
      Some(next) => next,
      None => return false,
    };
  }
  false
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
  haystack.windows(needle.len()).any(|w| w == needle)
}
