use std::io::{Read, Write};

use crate::domain::error::{EngineError, EngineResult};
use crate::domain::types::{AssetRef, LimitsConfig};

/// Copy data from reader to writer with size limits to prevent memory exhaustion
pub fn copy_with_limits<R: Read, W: Write>(
  reader: &mut R,
  writer: &mut W,
  max_bytes: usize,
) -> EngineResult<u64> {
  let mut buffer = [0u8; 8192]; // 8KB chunks for efficient copying
  let mut total_bytes = 0usize;

  loop {
    let bytes_read = reader.read(&mut buffer)?;

    if bytes_read == 0 {
      break; // EOF reached
    }

    // Check if this chunk would exceed the limit
    let new_total = total_bytes + bytes_read;
    if new_total > max_bytes {
      return Err(EngineError::AssetTooLarge { size: new_total, max: max_bytes });
    }

    writer.write_all(&buffer[..bytes_read])?;
    total_bytes = new_total;
  }

  writer.flush()?;
  Ok(total_bytes as u64)
}

/// Materialize an asset in memory, enforcing the in-memory limit.
pub fn load_asset(asset: &AssetRef, limits: LimitsConfig) -> EngineResult<Vec<u8>> {
  let max = limits.max_in_memory_asset_size.min(limits.max_stream_copy_size);
  match asset {
    AssetRef::Path(path) => {
      let mut file = std::fs::File::open(path)?;
      let mut out = Vec::new();
      copy_with_limits(&mut file, &mut out, max)?;
      Ok(out)
    }
    AssetRef::Bytes { data } => {
      if data.len() > max {
        return Err(EngineError::AssetTooLarge { size: data.len(), max });
      }
      Ok(data.clone())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn copy_stops_at_limit() {
    let data = vec![7u8; 20_000];
    let mut out = Vec::new();
    let err = copy_with_limits(&mut data.as_slice(), &mut out, 10_000).unwrap_err();
    assert!(matches!(err, EngineError::AssetTooLarge { max: 10_000, .. }));
  }

  #[test]
  fn bytes_asset_respects_limit() {
    let mut limits = LimitsConfig::defaults();
    limits.max_in_memory_asset_size = 4;
    let err = load_asset(&AssetRef::Bytes { data: vec![0; 5] }, limits).unwrap_err();
    assert!(matches!(err, EngineError::AssetTooLarge { size: 5, max: 4 }));
    let ok = load_asset(&AssetRef::Bytes { data: vec![1; 4] }, limits).unwrap();
    assert_eq!(ok, vec![1; 4]);
  }
}
