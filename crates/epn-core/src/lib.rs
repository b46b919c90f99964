//! epn-core: shared types for encrypted push notification processing.
//!
//! The wire contract with the server-side encryptor lives here: the
//! [`envelope::EncryptedEnvelope`] JSON object carried under
//! [`envelope::ENVELOPE_KEY`] in a notification's data payload, plus the
//! [`content::NotificationContent`] shape that the pipeline mutates and the
//! [`error::EpnError`] taxonomy every other crate speaks.

pub mod config;
pub mod content;
pub mod envelope;
pub mod error;

pub use content::NotificationContent;
pub use envelope::{DecodedEnvelope, EncryptedEnvelope};
pub use error::{EpnError, EpnResult};
