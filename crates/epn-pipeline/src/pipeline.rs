//! The per-notification processing state machine.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use epn_core::config::PipelineConfig;
use epn_core::envelope::EncryptedEnvelope;
use epn_core::{EpnError, EpnResult, NotificationContent};
use epn_crypto::{hybrid_decrypt, KeyProvider};

use crate::merge::merge_payload;

/// Terminal result of one pipeline invocation. The content is handed to
/// presentation exactly once in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Envelope decrypted and fields merged.
    Merged,
    /// No envelope present; content passed through untouched.
    NoEnvelope,
    /// Decrypt or parse failed; original content presented with the
    /// envelope stripped. `reason` is the log-safe error kind label.
    Fallback { reason: &'static str },
}

/// One pipeline instance serves many concurrent invocations; the only
/// shared state is the key provider, which is read-mostly.
pub struct Pipeline {
    provider: Arc<dyn KeyProvider>,
    merge_keys: Vec<String>,
}

impl Pipeline {
    pub fn new(provider: Arc<dyn KeyProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            merge_keys: config.merge_keys.clone(),
        }
    }

    /// Process one notification in place. Never fails: every error kind
    /// degrades to presenting the original content.
    pub fn process(&self, content: &mut NotificationContent) -> Outcome {
        // Removing the envelope first guarantees ciphertext never reaches
        // presentation, whatever happens next.
        let raw = match content.take_envelope() {
            Some(raw) => raw,
            None => {
                debug!("no envelope present, passing through");
                return Outcome::NoEnvelope;
            }
        };

        match self.decrypt_and_merge(raw, content) {
            Ok(()) => Outcome::Merged,
            Err(e) => {
                warn!(kind = e.kind(), "decrypt failed, presenting original content");
                Outcome::Fallback { reason: e.kind() }
            }
        }
    }

    fn decrypt_and_merge(&self, raw: Value, content: &mut NotificationContent) -> EpnResult<()> {
        let envelope = parse_envelope(raw)?;
        let plaintext = hybrid_decrypt(self.provider.as_ref(), &envelope)?;

        let payload = match serde_json::from_str::<Value>(&plaintext) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                return Err(EpnError::PayloadNotJson(
                    "payload is not a JSON object".into(),
                ))
            }
            Err(e) => return Err(EpnError::PayloadNotJson(format!("payload JSON: {e}"))),
        };

        merge_payload(&payload, content, &self.merge_keys);
        Ok(())
    }
}

/// The transport delivers the envelope as a JSON string; an already-parsed
/// object is accepted too.
fn parse_envelope(raw: Value) -> EpnResult<EncryptedEnvelope> {
    match raw {
        Value::String(s) => EncryptedEnvelope::from_json(&s),
        obj @ Value::Object(_) => serde_json::from_value(obj)
            .map_err(|e| EpnError::EnvelopeMalformed(format!("envelope object: {e}"))),
        _ => Err(EpnError::EnvelopeMalformed(
            "envelope field has unexpected JSON type".into(),
        )),
    }
}
