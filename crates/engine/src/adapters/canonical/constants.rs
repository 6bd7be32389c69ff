// Canonical payload layouts. Changing any of these changes every digest:
// bump the profile name instead.

/// Header of a canonical raster: magic || width:u32be || height:u32be || RGBA8 rows.
pub const IMAGE_MAGIC: &[u8; 8] = b"TSIMG1\0\0";

/// Header of a canonical video: magic || window_ms:u32be || frame_count:u32be || side:u32be.
pub const VIDEO_MAGIC: &[u8; 8] = b"TSVID1\0\0";

pub const RGBA_CHANNELS: usize = 4;
