//! epn-crypto: device key lifecycle and the hybrid envelope cipher.
//!
//! Scheme (fixed interop contract with the server-side encryptor):
//! ```text
//! server:  random AES-256 key ──AES-256-GCM(12-byte nonce, 128-bit tag)──> cipher_text
//!            └──RSA-OAEP(SHA-1, device 2048-bit public key)──> encrypted_key
//! device:  encrypted_key ──private key (platform keychain)──> AES key ──> plaintext JSON
//! ```
//!
//! OAEP is fixed to SHA-1 for compatibility with the external encryptor;
//! any deviation makes server ciphertexts unwrappable with no other symptom.
//!
//! The [`provider::KeyProvider`] trait is the only seam: the pipeline and
//! cipher are written against it, with [`keystore::KeychainKeyProvider`]
//! backing production and [`provider::MemoryKeyProvider`] backing tests.

pub mod hybrid;
pub mod keystore;
pub mod provider;

pub use hybrid::{hybrid_decrypt, hybrid_encrypt, self_test};
pub use keystore::KeychainKeyProvider;
pub use provider::{KeyProvider, MemoryKeyProvider, RSA_BITS};
