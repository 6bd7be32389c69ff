use std::time::Duration;

use crate::crypto::signer::{KeySource, SigningKey, VerifyingKey};
use crate::crypto::timestamper::Timestamper;
use crate::domain::error::{EngineError, EngineResult};

use super::core::SigAlg;

/// Centralized defaults for the TrueShot engine.
/// All opinionated defaults should be defined here for consistency.
pub struct EngineDefaults;

impl EngineDefaults {
    // Record defaults
    pub const RECORD_VERSION: &'static str = "1.0";
    pub const TOOL_NAME: &'static str = "TrueShot";
    pub const SIGNING_ALGORITHM: SigAlg = SigAlg::Ed25519; // Matches the capture keys we provision

    // Canonicalization defaults (part of the v1 profiles, not tunable per call)
    pub const VIDEO_WINDOW_MS: u32 = 1000;
    pub const VIDEO_FRAME_SIDE: u32 = 256;
    pub const VIDEO_EXPECTED_WINDOWS: u32 = 5; // 5 second capture

    // I/O defaults
    pub const IO_TIMEOUT_SECS: u64 = 30;
}

/// Configurable per-call limits to control memory and collaborator stalls.
#[derive(Debug, Clone, Copy)]
pub struct LimitsConfig {
    /// Max size allowed for an artifact held in memory for canonicalization.
    pub max_in_memory_asset_size: usize,
    /// Max number of bytes to copy from a file or stream.
    pub max_stream_copy_size: usize,
    /// Max time (in seconds) a device or file collaborator may take to deliver.
    pub io_timeout_secs: u64,
}

impl LimitsConfig {
    /// Opinionated production defaults.
    pub fn defaults() -> Self {
        Self {
            max_in_memory_asset_size: 128 * 1024 * 1024, // 128 MB
            max_stream_copy_size: 1024 * 1024 * 1024,    // 1 GB
            io_timeout_secs: EngineDefaults::IO_TIMEOUT_SECS,
        }
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Capture-duration expectations for video. The window length and frame size
/// are fixed by the canonical profile; only the expected window count is
/// tunable, and it only affects whether a form is tagged partial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoPolicy {
    pub expected_windows: u32,
}

impl Default for VideoPolicy {
    fn default() -> Self {
        Self {
            expected_windows: EngineDefaults::VIDEO_EXPECTED_WINDOWS,
        }
    }
}

/// Configuration for the sign-on-capture flow.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Where the signing key lives. `None` means no key is provisioned.
    pub key: Option<KeySource>,
    /// Algorithm the provisioned key is expected to use.
    pub signing_alg: SigAlg,
    pub timestamper: Timestamper,
    /// Producer name written to `metadata.tool`.
    pub tool: String,
    pub video: VideoPolicy,
    pub limits: LimitsConfig,
}

impl CaptureConfig {
    /// Secure opinionated defaults; caller supplies the key.
    pub fn secure_default(key: KeySource) -> Self {
        Self {
            key: Some(key),
            signing_alg: EngineDefaults::SIGNING_ALGORITHM,
            timestamper: Timestamper::System,
            tool: EngineDefaults::TOOL_NAME.to_string(),
            video: VideoPolicy::default(),
            limits: LimitsConfig::defaults(),
        }
    }

    /// Load the provisioned key and check it is of the expected algorithm.
    pub fn signing_key(&self) -> EngineResult<SigningKey> {
        let source = self
            .key
            .as_ref()
            .ok_or_else(|| EngineError::KeyUnavailable("no signing key provisioned".into()))?;
        let key = source.resolve()?;
        if key.alg() != self.signing_alg {
            return Err(EngineError::KeyUnavailable(format!(
                "provisioned key is {}, expected {}",
                key.alg(),
                self.signing_alg
            )));
        }
        Ok(key)
    }
}

/// Configuration for the verify-on-upload flow.
#[derive(Debug, Clone)]
pub struct VerifyConfig {
    /// Public key of the expected signer.
    pub verifying_key: VerifyingKey,
    pub video: VideoPolicy,
    pub limits: LimitsConfig,
}

impl VerifyConfig {
    /// Secure opinionated defaults; caller supplies the signer's public key.
    pub fn secure_default(verifying_key: VerifyingKey) -> Self {
        Self {
            verifying_key,
            video: VideoPolicy::default(),
            limits: LimitsConfig::defaults(),
        }
    }
}
