pub mod canonical;
pub mod record;
pub mod verifier;
