//! # Bus Events
//!
//! Wire shapes exchanged over the message bus and the closed set of inbound
//! events the dispatcher understands. Raw bytes are decoded exactly once, in
//! [`InboundEvent::decode`]; everything downstream works with typed payloads.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::notification::NewNotification;

pub const EVENT_NOTIFICATION: &str = "notification";
pub const EVENT_REWARDBACK_COMMISSION: &str = "rewardback_commission";
pub const EVENT_CASHBACK_COMMISSION: &str = "cashback_commission";
pub const EVENT_REFERRAL_COMMISSION: &str = "referral_commission";
pub const EVENT_INDICATOR_ALERT: &str = "indicator_alert";

/// Event names persisted as in-app notifications.
pub const PERSISTABLE_EVENTS: &[&str] = &[
    EVENT_NOTIFICATION,
    EVENT_REWARDBACK_COMMISSION,
    EVENT_CASHBACK_COMMISSION,
    EVENT_REFERRAL_COMMISSION,
];

/// Type tag requesting realtime re-publish.
pub const TAG_SOCKET: &str = "socket";
/// Type tag requesting bot delivery.
pub const TAG_TELEGRAM: &str = "telegram";

/// JSON envelope carried on both the inbound and the realtime subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope<T = serde_json::Value> {
    pub event_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_type: Vec<String>,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub data: T,
}

impl<T> EventEnvelope<T> {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.event_type.iter().any(|t| t == tag)
    }
}

/// Indicator alert payload (the envelope's `data` for alert events).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndicatorAlert {
    pub id: i64,
    pub signal_id: i64,
    pub indicator_name: String,
    pub source: String,
    pub signal_status: String,
    pub is_update: bool,
    pub symbol: String,
    pub time_frame: String,
    pub signal: String,
    pub close_time: i64,
    pub timestamp: i64,
    pub close_price: f64,
    /// `real_time` for intra-candle alerts, anything else means candle close.
    #[serde(rename = "type")]
    pub alert_type: String,
    /// Name of the upstream feed that went down, empty when all sources are up.
    pub source_down: String,
    pub is_test: bool,
}

impl IndicatorAlert {
    pub fn is_realtime(&self) -> bool {
        self.alert_type == "real_time"
    }
}

/// Alert event after classification.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertEvent {
    pub user_id: String,
    /// Tagged `socket`: forward `raw` to the realtime subject.
    pub realtime: bool,
    /// Tagged `telegram`: the decoded alert, or why it failed to decode.
    pub bot: Option<Result<IndicatorAlert, String>>,
    /// The message body exactly as received.
    pub raw: Vec<u8>,
}

/// Every inbound message becomes exactly one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// One of [`PERSISTABLE_EVENTS`].
    Notification {
        event_name: String,
        notification: NewNotification,
    },
    IndicatorAlert(AlertEvent),
    /// Well-formed envelope with an event name this service does not handle.
    Ignored { event_name: String },
}

/// Reasons an inbound message is rejected outright.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty message body")]
    Empty,
    #[error("malformed event: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl InboundEvent {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.iter().all(u8::is_ascii_whitespace) {
            return Err(DecodeError::Empty);
        }

        let envelope: EventEnvelope = serde_json::from_slice(payload)?;
        let event_name = envelope.event_name.as_str();

        if PERSISTABLE_EVENTS.contains(&event_name) {
            // Persistable events carry title_key/user_id/data at the top level.
            let notification: NewNotification = serde_json::from_slice(payload)?;
            return Ok(InboundEvent::Notification {
                event_name: envelope.event_name,
                notification,
            });
        }

        if event_name == EVENT_INDICATOR_ALERT {
            let bot = envelope.has_tag(TAG_TELEGRAM).then(|| {
                serde_json::from_value::<IndicatorAlert>(envelope.data.clone())
                    .map_err(|err| err.to_string())
            });
            return Ok(InboundEvent::IndicatorAlert(AlertEvent {
                realtime: envelope.has_tag(TAG_SOCKET),
                user_id: envelope.user_id,
                bot,
                raw: payload.to_vec(),
            }));
        }

        Ok(InboundEvent::Ignored {
            event_name: envelope.event_name,
        })
    }

    pub fn event_name(&self) -> &str {
        match self {
            InboundEvent::Notification { event_name, .. }
            | InboundEvent::Ignored { event_name } => event_name,
            InboundEvent::IndicatorAlert(_) => EVENT_INDICATOR_ALERT,
        }
    }
}
