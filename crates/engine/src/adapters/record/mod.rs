mod codec;
mod embed;

pub use codec::*;
pub use embed::{embed_record, extract_record, EMBED_KEY};
