//! Encrypted envelope wire format
//!
//! ```text
//! {"encrypted_key": "<b64 RSA-OAEP-SHA1 ciphertext of a 32-byte AES key>",
//!  "cipher_text":  "<b64 AES-256-GCM ciphertext>",
//!  "nonce":        "<b64 12-byte IV>",
//!  "tag":          "<b64 16-byte auth tag>"}
//! ```
//!
//! Carried as a JSON string value under [`ENVELOPE_KEY`] in the
//! notification's data payload. Field names, base64 alphabet, and the
//! OAEP-SHA1 / AES-256-GCM parameters are a fixed interop contract with the
//! server-side encryptor; changing any of them breaks decryption silently.

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::{EpnError, EpnResult};

/// Key in the notification data payload that carries the envelope.
pub const ENVELOPE_KEY: &str = "encrypted_data";

/// Size of the wrapped symmetric key (AES-256)
pub const AES_KEY_SIZE: usize = 32;

/// Size of the AES-GCM initialization vector
pub const NONCE_SIZE: usize = 12;

/// Size of the GCM authentication tag (128-bit)
pub const TAG_SIZE: usize = 16;

/// The envelope as it appears on the wire: four base64 fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    pub encrypted_key: String,
    pub cipher_text: String,
    pub nonce: String,
    pub tag: String,
}

/// The envelope with all fields base64-decoded and length-checked.
#[derive(Debug, Clone)]
pub struct DecodedEnvelope {
    pub encrypted_key: Vec<u8>,
    pub cipher_text: Vec<u8>,
    pub nonce: [u8; NONCE_SIZE],
    pub tag: [u8; TAG_SIZE],
}

impl EncryptedEnvelope {
    /// Parse an envelope from its JSON string form.
    pub fn from_json(raw: &str) -> EpnResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| EpnError::EnvelopeMalformed(format!("envelope JSON: {e}")))
    }

    /// Base64-decode all four fields, validating nonce and tag lengths.
    ///
    /// The wrapped key length is not checked here: its plaintext length is
    /// only known after RSA decryption (see `unwrap_aes_key`).
    pub fn decode(&self) -> EpnResult<DecodedEnvelope> {
        let encrypted_key = decode_field("encrypted_key", &self.encrypted_key)?;
        let cipher_text = decode_field("cipher_text", &self.cipher_text)?;
        let nonce_bytes = decode_field("nonce", &self.nonce)?;
        let tag_bytes = decode_field("tag", &self.tag)?;

        let nonce: [u8; NONCE_SIZE] = nonce_bytes.as_slice().try_into().map_err(|_| {
            EpnError::EnvelopeMalformed(format!(
                "nonce is {} bytes (expected {NONCE_SIZE})",
                nonce_bytes.len()
            ))
        })?;
        let tag: [u8; TAG_SIZE] = tag_bytes.as_slice().try_into().map_err(|_| {
            EpnError::EnvelopeMalformed(format!(
                "tag is {} bytes (expected {TAG_SIZE})",
                tag_bytes.len()
            ))
        })?;

        Ok(DecodedEnvelope {
            encrypted_key,
            cipher_text,
            nonce,
            tag,
        })
    }
}

fn decode_field(name: &str, value: &str) -> EpnResult<Vec<u8>> {
    B64.decode(value)
        .map_err(|e| EpnError::EnvelopeMalformed(format!("{name} is not valid base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> EncryptedEnvelope {
        EncryptedEnvelope {
            encrypted_key: B64.encode([7u8; 256]),
            cipher_text: B64.encode(b"ciphertext"),
            nonce: B64.encode([1u8; NONCE_SIZE]),
            tag: B64.encode([2u8; TAG_SIZE]),
        }
    }

    #[test]
    fn test_decode_valid_envelope() {
        let decoded = sample().decode().unwrap();
        assert_eq!(decoded.encrypted_key.len(), 256);
        assert_eq!(decoded.nonce, [1u8; NONCE_SIZE]);
        assert_eq!(decoded.tag, [2u8; TAG_SIZE]);
    }

    #[test]
    fn test_from_json_roundtrip() {
        let json = serde_json::to_string(&sample()).unwrap();
        let parsed = EncryptedEnvelope::from_json(&json).unwrap();
        assert_eq!(parsed.cipher_text, sample().cipher_text);
    }

    #[test]
    fn test_from_json_rejects_missing_field() {
        let err = EncryptedEnvelope::from_json(r#"{"encrypted_key":"aGk="}"#).unwrap_err();
        assert_eq!(err.kind(), "envelope_malformed");
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        let mut env = sample();
        env.cipher_text = "not base64!!".into();
        assert_eq!(env.decode().unwrap_err().kind(), "envelope_malformed");
    }

    #[test]
    fn test_decode_rejects_wrong_nonce_length() {
        let mut env = sample();
        env.nonce = B64.encode([1u8; 16]);
        assert_eq!(env.decode().unwrap_err().kind(), "envelope_malformed");
    }

    #[test]
    fn test_decode_rejects_wrong_tag_length() {
        let mut env = sample();
        env.tag = B64.encode([2u8; 12]);
        assert_eq!(env.decode().unwrap_err().kind(), "envelope_malformed");
    }

    proptest! {
        // Arbitrary input never panics, it only errors.
        #[test]
        fn prop_from_json_total(raw in ".*") {
            let _ = EncryptedEnvelope::from_json(&raw);
        }

        #[test]
        fn prop_decode_total(
            k in ".*", c in ".*", n in ".*", t in ".*"
        ) {
            let env = EncryptedEnvelope {
                encrypted_key: k,
                cipher_text: c,
                nonce: n,
                tag: t,
            };
            let _ = env.decode();
        }
    }
}
