//! Feed messages and their wire decoding.
//!
//! Each transport frame carries one JSON object:
//!
//! ```text
//! { "type": "text" | "gift" | "subscribe" | "superchat",
//!   "userName": "...", "content": "...",
//!   "avatar"?: "...", "color"?: "#rrggbb", "timestamp"?: 1700000000000,
//!   "price"?: 30.0, "platform"?: "bilibili" }
//! ```
//!
//! The relay also emits `chat`, `like`, `enterroom` and `endlive`; `chat` is
//! an alias of `text` and every other unknown type is shown as plain text.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// The closed set of message variants the feed renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Ordinary chat line.
    #[serde(alias = "chat")]
    Text,
    /// Gift notification.
    Gift,
    /// Subscription / membership notification.
    Subscribe,
    /// Paid message, styled by funding level.
    SuperChat,
}

impl MessageKind {
    /// Map a wire `type` string onto a variant. Unknown types render as text.
    pub fn from_wire(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "gift" => Self::Gift,
            "subscribe" => Self::Subscribe,
            "superchat" => Self::SuperChat,
            "text" | "chat" => Self::Text,
            other => {
                tracing::debug!(kind = other, "unknown message type, rendering as text");
                Self::Text
            }
        }
    }

    /// Wire name of the variant.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Gift => "gift",
            Self::Subscribe => "subscribe",
            Self::SuperChat => "superchat",
        }
    }
}

/// A decoded feed message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Which variant this is.
    pub kind: MessageKind,
    /// Display name of the sender.
    pub user_name: String,
    /// Message body.
    pub content: String,
    /// Avatar URL, if any.
    pub avatar: Option<String>,
    /// Display colour for the author name, as sent.
    pub color: Option<String>,
    /// Server-side timestamp; `None` means "use the arrival time".
    pub timestamp: Option<DateTime<Utc>>,
    /// Price. Always `Some(p)` with `p > 0` for super chats.
    pub price: Option<f64>,
    /// Originating platform, e.g. `bilibili`.
    pub platform: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    #[serde(rename = "type")]
    kind: String,
    user_name: String,
    content: String,
    #[serde(default)]
    avatar: Option<String>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    timestamp: Option<WireTimestamp>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    platform: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Millis(i64),
    Fractional(f64),
    Text(String),
}

impl WireTimestamp {
    // Zero and empty values mean "absent", matching how the relay's page
    // treated falsy timestamps.
    fn resolve(self) -> Result<Option<DateTime<Utc>>, DecodeError> {
        match self {
            Self::Millis(0) => Ok(None),
            Self::Millis(ms) => Utc
                .timestamp_millis_opt(ms)
                .single()
                .map(Some)
                .ok_or_else(|| DecodeError::InvalidTimestamp(ms.to_string())),
            Self::Fractional(ms) if ms.is_finite() => Self::Millis(ms.trunc() as i64).resolve(),
            Self::Fractional(ms) => Err(DecodeError::InvalidTimestamp(ms.to_string())),
            Self::Text(text) if text.trim().is_empty() => Ok(None),
            Self::Text(text) => DateTime::parse_from_rfc3339(text.trim())
                .map(|t| Some(t.with_timezone(&Utc)))
                .map_err(|_| DecodeError::InvalidTimestamp(text)),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Message {
    /// Decode one text frame.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let wire: WireMessage = serde_json::from_str(raw)?;
        Self::try_from(wire)
    }

    /// Decode one binary frame, which must hold UTF-8 JSON.
    pub fn decode_bytes(raw: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(raw).map_err(|_| DecodeError::NotUtf8)?;
        Self::decode(text)
    }

    /// Price if it is meaningful for display (present and positive).
    pub fn display_price(&self) -> Option<f64> {
        self.price.filter(|p| *p > 0.0)
    }
}

impl TryFrom<WireMessage> for Message {
    type Error = DecodeError;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        let kind = MessageKind::from_wire(&wire.kind);

        if let Some(price) = wire.price {
            if !price.is_finite() || price < 0.0 {
                return Err(DecodeError::InvalidPrice(price));
            }
        }
        if kind == MessageKind::SuperChat && !wire.price.is_some_and(|p| p > 0.0) {
            return Err(DecodeError::MissingPrice {
                user: wire.user_name,
            });
        }

        let timestamp = match wire.timestamp {
            Some(ts) => ts.resolve()?,
            None => None,
        };

        Ok(Self {
            kind,
            user_name: wire.user_name,
            content: wire.content,
            avatar: non_empty(wire.avatar),
            color: non_empty(wire.color),
            timestamp,
            price: wire.price,
            platform: non_empty(wire.platform),
        })
    }
}
