//! The key provider capability: one RSA-2048 key pair per device.
//!
//! The private key is only ever *used* through a provider, never handed out.
//! `unwrap_aes_key` is the single operation the decrypt path needs; the raw
//! `rsa_encrypt`/`rsa_decrypt` primitives exist so a self-test can validate
//! key health without any server-issued material.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use rand::rngs::OsRng;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use rsa::pkcs8::EncodePublicKey;
use sha1::Sha1;
use zeroize::Zeroize;

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use epn_core::envelope::AES_KEY_SIZE;
use epn_core::{EpnError, EpnResult};

/// RSA modulus size. Part of the wire contract with the server encryptor.
pub const RSA_BITS: usize = 2048;

/// OAEP padding with SHA-1 digest and MGF1. Fixed interop parameter.
pub(crate) fn oaep() -> Oaep {
    Oaep::new::<Sha1>()
}

/// Generate a fresh device key pair.
pub(crate) fn generate_key_pair() -> EpnResult<RsaPrivateKey> {
    RsaPrivateKey::new(&mut OsRng, RSA_BITS)
        .map_err(|e| EpnError::KeyGenerationFailed(format!("RSA keygen: {e}")))
}

/// SPKI-encode a public key as a base64 string (the registration export).
pub(crate) fn encode_public_key(public_key: &RsaPublicKey) -> EpnResult<String> {
    let der = public_key
        .to_public_key_der()
        .map_err(|e| EpnError::KeyGenerationFailed(format!("SPKI encoding: {e}")))?;
    Ok(B64.encode(der.as_bytes()))
}

/// Access to the device's RSA key pair.
///
/// `public_key` is idempotent get-or-create; concurrent first use must not
/// race-create two distinct pairs. All other operations are read-only and
/// safe under concurrent invocation.
pub trait KeyProvider: Send + Sync {
    /// Return the device public key, base64 SPKI, generating the pair on
    /// first use.
    fn public_key(&self) -> EpnResult<String>;

    /// RSA-OAEP(SHA-1) encrypt with the device public key (self-test).
    fn rsa_encrypt(&self, plaintext: &[u8]) -> EpnResult<Vec<u8>>;

    /// RSA-OAEP(SHA-1) decrypt with the device private key.
    fn rsa_decrypt(&self, ciphertext: &[u8]) -> EpnResult<Vec<u8>>;

    /// Remove the persisted key pair. The next `public_key` call generates a
    /// fresh, unrelated pair; envelopes wrapped against the old key then
    /// fail with `UnwrapFailed`.
    fn delete_key_pair(&self) -> EpnResult<()>;

    /// Unwrap the envelope's AES key: RSA decrypt plus an exact-length
    /// check. The intermediate buffer is wiped either way.
    fn unwrap_aes_key(&self, wrapped: &[u8]) -> EpnResult<[u8; AES_KEY_SIZE]> {
        let mut plaintext = self.rsa_decrypt(wrapped)?;
        if plaintext.len() != AES_KEY_SIZE {
            let got = plaintext.len();
            plaintext.zeroize();
            return Err(EpnError::InvalidAesKey(got));
        }
        let mut key = [0u8; AES_KEY_SIZE];
        key.copy_from_slice(&plaintext);
        plaintext.zeroize();
        Ok(key)
    }
}

/// In-process provider for tests and diagnostics.
///
/// Holds the key pair in memory only. The `locked` flag simulates a device
/// that has not been unlocked since boot: every operation fails with
/// `KeyUnavailable` until it is cleared.
pub struct MemoryKeyProvider {
    key: RwLock<Option<RsaPrivateKey>>,
    locked: AtomicBool,
}

impl MemoryKeyProvider {
    pub fn new() -> Self {
        Self {
            key: RwLock::new(None),
            locked: AtomicBool::new(false),
        }
    }

    /// Start in the pre-first-unlock state.
    pub fn locked() -> Self {
        Self {
            key: RwLock::new(None),
            locked: AtomicBool::new(true),
        }
    }

    pub fn set_locked(&self, locked: bool) {
        self.locked.store(locked, Ordering::SeqCst);
    }

    fn ensure_unlocked(&self) -> EpnResult<()> {
        if self.locked.load(Ordering::SeqCst) {
            return Err(EpnError::KeyUnavailable(
                "device not yet unlocked since boot".into(),
            ));
        }
        Ok(())
    }

    fn get_or_create(&self) -> EpnResult<RsaPrivateKey> {
        if let Ok(guard) = self.key.read() {
            if let Some(key) = guard.as_ref() {
                return Ok(key.clone());
            }
        }
        let mut guard = self
            .key
            .write()
            .map_err(|_| EpnError::KeyUnavailable("key store lock poisoned".into()))?;
        match guard.as_ref() {
            Some(key) => Ok(key.clone()),
            None => {
                let key = generate_key_pair()?;
                *guard = Some(key.clone());
                Ok(key)
            }
        }
    }
}

impl Default for MemoryKeyProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyProvider for MemoryKeyProvider {
    fn public_key(&self) -> EpnResult<String> {
        self.ensure_unlocked()?;
        let key = self.get_or_create()?;
        encode_public_key(&RsaPublicKey::from(&key))
    }

    fn rsa_encrypt(&self, plaintext: &[u8]) -> EpnResult<Vec<u8>> {
        self.ensure_unlocked()?;
        let key = self.get_or_create()?;
        RsaPublicKey::from(&key)
            .encrypt(&mut OsRng, oaep(), plaintext)
            .map_err(|_| EpnError::UnwrapFailed)
    }

    fn rsa_decrypt(&self, ciphertext: &[u8]) -> EpnResult<Vec<u8>> {
        self.ensure_unlocked()?;
        let key = self.get_or_create()?;
        key.decrypt(oaep(), ciphertext)
            .map_err(|_| EpnError::UnwrapFailed)
    }

    fn delete_key_pair(&self) -> EpnResult<()> {
        self.ensure_unlocked()?;
        let mut guard = self
            .key
            .write()
            .map_err(|_| EpnError::KeyUnavailable("key store lock poisoned".into()))?;
        *guard = None;
        Ok(())
    }
}
