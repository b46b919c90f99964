//! Mutable notification content, owned by one pipeline invocation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::envelope::ENVELOPE_KEY;

/// String-keyed auxiliary payload of a notification (the platform
/// `userInfo` / FCM data dictionary).
pub type UserInfo = Map<String, Value>;

/// Notification content as handed over by the host delivery layer.
///
/// Mutated in place by the merge step, then handed to presentation exactly
/// once. Discarded afterwards; nothing here is persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationContent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub user_info: UserInfo,
}

impl NotificationContent {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            user_info: UserInfo::new(),
        }
    }

    /// Remove and return the raw envelope value, if any.
    ///
    /// Every pipeline path calls this before doing anything else, so the
    /// ciphertext can never reach presentation or logging.
    pub fn take_envelope(&mut self) -> Option<Value> {
        self.user_info.remove(ENVELOPE_KEY)
    }

    /// Remove the raw envelope value without returning it.
    pub fn strip_envelope(&mut self) {
        self.user_info.remove(ENVELOPE_KEY);
    }

    /// Mutable access to the nested `aps.alert` object, when present.
    ///
    /// iOS carries a copy of title/body under `aps.alert`; the merge step
    /// mirrors its changes there.
    pub fn alert_mut(&mut self) -> Option<&mut Map<String, Value>> {
        self.user_info
            .get_mut("aps")
            .and_then(Value::as_object_mut)?
            .get_mut("alert")
            .and_then(Value::as_object_mut)
    }
}
