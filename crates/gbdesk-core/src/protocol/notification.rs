//! Notification-intake payload normalization
//!
//! The phone writes one of two JSON shapes to the notification characteristic:
//! an app notification `{title, body}` or a call event `{name, number}`. Both are
//! mapped onto a single [`NotificationRecord`]. Shapes are tried in a fixed order
//! and anything that matches neither is rejected.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{GattError, Result};

// ----------------------------------------------------------------------------
// Notification Record
// ----------------------------------------------------------------------------

/// A desktop notification derived from one intake write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub title: String,
    pub message: String,
    /// Icon shown next to the toast; attached by the caller, never by `normalize`
    pub icon: Option<PathBuf>,
}

impl NotificationRecord {
    /// Create a record without an icon
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            icon: None,
        }
    }

    /// Attach an icon path
    pub fn with_icon(mut self, icon: Option<PathBuf>) -> Self {
        self.icon = icon;
        self
    }
}

// ----------------------------------------------------------------------------
// Source Shapes
// ----------------------------------------------------------------------------

/// Incoming call: `{name, number}`
#[derive(Debug, Deserialize)]
struct CallShape {
    name: String,
    number: PhoneNumber,
}

/// Phone numbers arrive as strings or, from some serializers, as bare integers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PhoneNumber {
    Text(String),
    Numeric(serde_json::Number),
}

impl PhoneNumber {
    fn into_string(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Numeric(number) => number.to_string(),
        }
    }
}

/// App notification: `{title, body}`, with `sender` standing in for a missing title
#[derive(Debug, Deserialize)]
struct AppNotificationShape {
    title: Option<String>,
    sender: Option<String>,
    body: String,
}

// ----------------------------------------------------------------------------
// Normalization
// ----------------------------------------------------------------------------

/// Map a raw intake write onto a [`NotificationRecord`].
///
/// Fails with [`GattError::MalformedPayload`] when the bytes are not UTF-8 JSON,
/// or when the object matches neither known shape.
pub fn normalize(bytes: &[u8]) -> Result<NotificationRecord> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| GattError::malformed_payload(format!("not UTF-8: {}", e)))?;

    let mut value: Value = serde_json::from_str(text)
        .map_err(|e| GattError::malformed_payload(format!("not JSON: {}", e)))?;

    // The client's serializer sometimes wraps the object in a JSON string
    if let Value::String(inner) = &value {
        value = serde_json::from_str(inner)
            .map_err(|e| GattError::malformed_payload(format!("inner payload not JSON: {}", e)))?;
    }

    let object = value
        .as_object()
        .ok_or_else(|| GattError::malformed_payload("payload is not a JSON object"))?;

    if object.contains_key("number") {
        let call: CallShape = serde_json::from_value(value)
            .map_err(|e| GattError::malformed_payload(format!("call payload: {}", e)))?;
        return Ok(NotificationRecord::new(call.name, call.number.into_string()));
    }

    let notification: AppNotificationShape = serde_json::from_value(value)
        .map_err(|e| GattError::malformed_payload(format!("notification payload: {}", e)))?;
    let title = notification
        .title
        .or(notification.sender)
        .ok_or_else(|| GattError::malformed_payload("notification payload: missing field `title`"))?;

    Ok(NotificationRecord::new(title, notification.body))
}
