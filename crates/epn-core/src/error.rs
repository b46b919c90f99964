use thiserror::Error;

pub type EpnResult<T> = Result<T, EpnError>;

/// Error taxonomy for the decrypt path.
///
/// The pipeline catches all of these and falls open; the diagnostic entry
/// points surface them typed. `AuthenticationFailed` deliberately carries no
/// detail: a GCM tag mismatch and a wrong-key failure must be
/// indistinguishable to the caller.
#[derive(Debug, Error)]
pub enum EpnError {
    #[error("key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("malformed envelope: {0}")]
    EnvelopeMalformed(String),

    #[error("RSA unwrap failed")]
    UnwrapFailed,

    #[error("unwrapped AES key has wrong size: {0} bytes (expected 32)")]
    InvalidAesKey(usize),

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("decrypted payload is not JSON: {0}")]
    PayloadNotJson(String),
}

impl EpnError {
    /// Stable label for logs and metrics. Never includes key or payload
    /// material.
    pub fn kind(&self) -> &'static str {
        match self {
            EpnError::KeyUnavailable(_) => "key_unavailable",
            EpnError::KeyGenerationFailed(_) => "key_generation_failed",
            EpnError::EnvelopeMalformed(_) => "envelope_malformed",
            EpnError::UnwrapFailed => "unwrap_failed",
            EpnError::InvalidAesKey(_) => "invalid_aes_key",
            EpnError::AuthenticationFailed => "authentication_failed",
            EpnError::PayloadNotJson(_) => "payload_not_json",
        }
    }
}
