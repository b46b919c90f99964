//! Apply decrypted fields onto notification content under an allow-list.

use serde_json::Value;

use epn_core::content::{NotificationContent, UserInfo};

/// Merge a decrypted payload into the content.
///
/// - `title` overwrites the content title, `message` the body.
/// - A nested `aps.alert` object, if present, has its `title`/`body` kept in
///   step with the top-level fields.
/// - Keys in `merge_keys` are copied into the auxiliary mapping; every other
///   original key is preserved exactly.
/// - The raw envelope field is removed unconditionally.
///
/// Total: never fails for any well-formed payload.
pub fn merge_payload(
    decrypted: &UserInfo,
    content: &mut NotificationContent,
    merge_keys: &[String],
) {
    let title = decrypted.get("title").and_then(Value::as_str);
    // "message" is the canonical body override; a plain-string "body" is
    // accepted as a fallback (a structured "body" travels via the
    // allow-list instead).
    let message = decrypted
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| decrypted.get("body").and_then(Value::as_str));

    if let Some(title) = title {
        content.title = title.to_string();
    }
    if let Some(message) = message {
        content.body = message.to_string();
    }

    if let Some(alert) = content.alert_mut() {
        if let Some(title) = title {
            alert.insert("title".into(), Value::String(title.to_string()));
        }
        if let Some(message) = message {
            alert.insert("body".into(), Value::String(message.to_string()));
        }
    }

    for key in merge_keys {
        if let Some(value) = decrypted.get(key) {
            content.user_info.insert(key.clone(), value.clone());
        }
    }

    content.strip_envelope();
}
