// Re-export all types so callers can use `domain::types::*`
// while the definitions stay organized by concern.

pub use core::*;
pub use asset::*;
pub use config::*;

// Module declarations
mod core;
mod asset;
mod config;
