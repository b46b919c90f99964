//! Platform keychain backing for the device key pair.
//!
//! Uses the `keyring` crate:
//! - macOS/iOS: Keychain Services (after-first-unlock access class)
//! - Linux: Secret Service (D-Bus)
//! - Windows: Credential Manager (DPAPI)
//!
//! The private key is stored as base64 PKCS#8 DER under a fixed
//! service/alias pair and loaded only for the duration of one operation.
//! Keychain access before the first device unlock surfaces as
//! `KeyUnavailable`, which the pipeline treats as non-fatal.

use std::sync::Mutex;

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroize;

use epn_core::config::KeystoreConfig;
use epn_core::{EpnError, EpnResult};

use crate::provider::{encode_public_key, generate_key_pair, oaep, KeyProvider};

// Guards create-if-absent process-wide: concurrent first use cannot
// race-create two distinct pairs against the same alias, even through
// separate provider instances.
static CREATE_LOCK: Mutex<()> = Mutex::new(());

/// Keychain-backed [`KeyProvider`]. One logical key pair per device, created
/// lazily on first use.
pub struct KeychainKeyProvider {
    service: String,
    alias: String,
}

impl KeychainKeyProvider {
    pub fn new(config: &KeystoreConfig) -> Self {
        Self {
            service: config.service.clone(),
            alias: config.alias.clone(),
        }
    }

    fn entry(&self) -> EpnResult<keyring::Entry> {
        keyring::Entry::new(&self.service, &self.alias)
            .map_err(|e| EpnError::KeyUnavailable(format!("keychain entry creation: {e}")))
    }

    /// Load the stored private key, or `None` if no pair exists yet.
    fn load_key(&self) -> EpnResult<Option<RsaPrivateKey>> {
        match self.entry()?.get_password() {
            Ok(mut der_b64) => {
                let der = B64.decode(der_b64.as_bytes()).map_err(|e| {
                    EpnError::KeyUnavailable(format!("stored key is not valid base64: {e}"))
                });
                der_b64.zeroize();
                let mut der = der?;
                let key = RsaPrivateKey::from_pkcs8_der(&der);
                der.zeroize();
                let key = key.map_err(|e| {
                    EpnError::KeyUnavailable(format!("stored key is not valid PKCS#8: {e}"))
                })?;
                Ok(Some(key))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(EpnError::KeyUnavailable(format!(
                "keychain get for '{}': {e}",
                self.alias
            ))),
        }
    }

    fn get_or_create(&self) -> EpnResult<RsaPrivateKey> {
        if let Some(key) = self.load_key()? {
            return Ok(key);
        }

        let _guard = CREATE_LOCK
            .lock()
            .map_err(|_| EpnError::KeyUnavailable("creation lock poisoned".into()))?;

        // Another invocation may have won the race while we waited.
        if let Some(key) = self.load_key()? {
            return Ok(key);
        }

        let key = generate_key_pair()?;
        let der = key
            .to_pkcs8_der()
            .map_err(|e| EpnError::KeyGenerationFailed(format!("PKCS#8 encoding: {e}")))?;
        let mut der_b64 = B64.encode(der.as_bytes());
        let stored = self.entry()?.set_password(&der_b64);
        der_b64.zeroize();
        stored.map_err(|e| {
            EpnError::KeyUnavailable(format!("keychain store for '{}': {e}", self.alias))
        })?;

        tracing::debug!(alias = %self.alias, "generated device RSA key pair");
        Ok(key)
    }
}

impl KeyProvider for KeychainKeyProvider {
    fn public_key(&self) -> EpnResult<String> {
        let key = self.get_or_create()?;
        encode_public_key(&RsaPublicKey::from(&key))
    }

    fn rsa_encrypt(&self, plaintext: &[u8]) -> EpnResult<Vec<u8>> {
        let key = self.get_or_create()?;
        RsaPublicKey::from(&key)
            .encrypt(&mut OsRng, oaep(), plaintext)
            .map_err(|_| EpnError::UnwrapFailed)
    }

    fn rsa_decrypt(&self, ciphertext: &[u8]) -> EpnResult<Vec<u8>> {
        let key = self.get_or_create()?;
        key.decrypt(oaep(), ciphertext)
            .map_err(|_| EpnError::UnwrapFailed)
    }

    fn delete_key_pair(&self) -> EpnResult<()> {
        match self.entry()?.delete_credential() {
            Ok(()) => {
                tracing::debug!(alias = %self.alias, "deleted device RSA key pair");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()), // already deleted
            Err(e) => Err(EpnError::KeyUnavailable(format!(
                "keychain delete for '{}': {e}",
                self.alias
            ))),
        }
    }
}

// No unit tests here: exercising this needs a live platform keychain.
// Everything above the provider seam is tested through MemoryKeyProvider.
