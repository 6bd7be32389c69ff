pub mod types;
pub mod record;
pub mod session;
pub mod verify;
pub mod error;
