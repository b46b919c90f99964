//! Hybrid envelope open: RSA-OAEP unwrap, then AES-256-GCM.
//!
//! Fail-closed by construction: a GCM tag mismatch and a key-confusion
//! failure both surface as the single detail-free `AuthenticationFailed`,
//! and no plaintext escapes unless the tag check passes. The decrypt path
//! has no hidden randomness; identical envelope plus identical key material
//! always yields identical plaintext.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use rand::RngCore;
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use zeroize::Zeroize;

use epn_core::envelope::{EncryptedEnvelope, AES_KEY_SIZE, NONCE_SIZE, TAG_SIZE};
use epn_core::{EpnError, EpnResult};

use crate::provider::{oaep, KeyProvider};

/// Open an envelope: unwrap the AES key via the provider, verify and
/// decrypt the ciphertext, decode the result as UTF-8.
pub fn hybrid_decrypt(
    provider: &dyn KeyProvider,
    envelope: &EncryptedEnvelope,
) -> EpnResult<String> {
    let decoded = envelope.decode()?;
    let mut aes_key = provider.unwrap_aes_key(&decoded.encrypted_key)?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&aes_key));
    let nonce = Nonce::from_slice(&decoded.nonce);

    // aes-gcm wants the tag appended to the ciphertext
    let mut sealed = Vec::with_capacity(decoded.cipher_text.len() + TAG_SIZE);
    sealed.extend_from_slice(&decoded.cipher_text);
    sealed.extend_from_slice(&decoded.tag);

    let plaintext = cipher.decrypt(nonce, sealed.as_slice());
    aes_key.zeroize();
    let plaintext = plaintext.map_err(|_| EpnError::AuthenticationFailed)?;

    String::from_utf8(plaintext)
        .map_err(|_| EpnError::PayloadNotJson("plaintext is not valid UTF-8".into()))
}

/// Seal a payload against a device public key (base64 SPKI).
///
/// This is the server-side counterpart of [`hybrid_decrypt`], kept here for
/// the CLI self-test and the test suites. A fresh AES-256 key and 12-byte
/// nonce are sampled per call; a nonce is never reused under the same key.
pub fn hybrid_encrypt(public_key_b64: &str, plaintext: &[u8]) -> anyhow::Result<EncryptedEnvelope> {
    let spki = B64
        .decode(public_key_b64)
        .map_err(|e| anyhow::anyhow!("public key base64: {e}"))?;
    let public_key = RsaPublicKey::from_public_key_der(&spki)
        .map_err(|e| anyhow::anyhow!("public key SPKI: {e}"))?;

    let mut aes_key = [0u8; AES_KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut aes_key);
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&aes_key));
    let mut sealed = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| anyhow::anyhow!("AES-GCM encryption failed: {e}"))?;
    let tag = sealed.split_off(sealed.len() - TAG_SIZE);

    let encrypted_key = public_key
        .encrypt(&mut rand::rngs::OsRng, oaep(), &aes_key)
        .map_err(|e| anyhow::anyhow!("RSA-OAEP wrap failed: {e}"))?;
    aes_key.zeroize();

    Ok(EncryptedEnvelope {
        encrypted_key: B64.encode(encrypted_key),
        cipher_text: B64.encode(&sealed),
        nonce: B64.encode(nonce_bytes),
        tag: B64.encode(&tag),
    })
}

/// Key-health check: encrypt a message with the device public key, decrypt
/// it back, compare. Needs no server-issued material.
pub fn self_test(provider: &dyn KeyProvider, message: &str) -> EpnResult<bool> {
    let encrypted = provider.rsa_encrypt(message.as_bytes())?;
    let decrypted = provider.rsa_decrypt(&encrypted)?;
    Ok(decrypted == message.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryKeyProvider;

    fn flip_bit_b64(field: &str) -> String {
        let mut bytes = B64.decode(field).unwrap();
        bytes[0] ^= 0x01;
        B64.encode(bytes)
    }

    #[test]
    fn test_hybrid_roundtrip() {
        let provider = MemoryKeyProvider::new();
        let payload = r#"{"title":"Hi","message":"Hello"}"#;

        let envelope = hybrid_encrypt(&provider.public_key().unwrap(), payload.as_bytes()).unwrap();
        let plaintext = hybrid_decrypt(&provider, &envelope).unwrap();

        assert_eq!(plaintext, payload);
    }

    #[test]
    fn test_decrypt_is_deterministic() {
        let provider = MemoryKeyProvider::new();
        let envelope =
            hybrid_encrypt(&provider.public_key().unwrap(), b"{\"title\":\"x\"}").unwrap();

        let first = hybrid_decrypt(&provider, &envelope).unwrap();
        let second = hybrid_decrypt(&provider, &envelope).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_tampered_cipher_text_fails_closed() {
        let provider = MemoryKeyProvider::new();
        let mut envelope =
            hybrid_encrypt(&provider.public_key().unwrap(), b"secret payload").unwrap();
        envelope.cipher_text = flip_bit_b64(&envelope.cipher_text);

        let err = hybrid_decrypt(&provider, &envelope).unwrap_err();
        assert_eq!(err.kind(), "authentication_failed");
    }

    #[test]
    fn test_tampered_tag_fails_closed() {
        let provider = MemoryKeyProvider::new();
        let mut envelope =
            hybrid_encrypt(&provider.public_key().unwrap(), b"secret payload").unwrap();
        envelope.tag = flip_bit_b64(&envelope.tag);

        let err = hybrid_decrypt(&provider, &envelope).unwrap_err();
        assert_eq!(err.kind(), "authentication_failed");
    }

    #[test]
    fn test_rotated_key_cannot_open_old_envelope() {
        let provider = MemoryKeyProvider::new();
        let envelope =
            hybrid_encrypt(&provider.public_key().unwrap(), b"{\"title\":\"x\"}").unwrap();

        provider.delete_key_pair().unwrap();

        let err = hybrid_decrypt(&provider, &envelope).unwrap_err();
        assert_eq!(err.kind(), "unwrap_failed");
    }

    #[test]
    fn test_non_utf8_plaintext() {
        let provider = MemoryKeyProvider::new();
        let envelope =
            hybrid_encrypt(&provider.public_key().unwrap(), &[0xFF, 0xFE, 0x00]).unwrap();

        let err = hybrid_decrypt(&provider, &envelope).unwrap_err();
        assert_eq!(err.kind(), "payload_not_json");
    }

    #[test]
    fn test_short_wrapped_key_is_rejected() {
        let provider = MemoryKeyProvider::new();
        // A wrapped key that unwraps to 16 bytes instead of 32.
        let short = provider.rsa_encrypt(&[1u8; 16]).unwrap();
        let envelope = EncryptedEnvelope {
            encrypted_key: B64.encode(short),
            cipher_text: B64.encode(b"irrelevant"),
            nonce: B64.encode([0u8; NONCE_SIZE]),
            tag: B64.encode([0u8; TAG_SIZE]),
        };

        let err = hybrid_decrypt(&provider, &envelope).unwrap_err();
        assert_eq!(err.kind(), "invalid_aes_key");
    }

    #[test]
    fn test_self_test_passes_on_healthy_key() {
        let provider = MemoryKeyProvider::new();
        assert!(self_test(&provider, "epn self-test probe").unwrap());
    }

    #[test]
    fn test_self_test_surfaces_unavailable_key() {
        let provider = MemoryKeyProvider::locked();
        let err = self_test(&provider, "probe").unwrap_err();
        assert_eq!(err.kind(), "key_unavailable");
    }
}
