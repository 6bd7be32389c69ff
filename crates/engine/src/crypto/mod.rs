pub mod fingerprint;
pub mod signer;
pub mod timestamper;
