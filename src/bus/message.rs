//! Bus message envelope: a UUID, string metadata and a JSON payload.

use crate::errors::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Metadata keys understood across the bus.
pub mod keys {
    pub const CORRELATION_ID: &str = "correlation_id";
    pub const GUILD_ID: &str = "guild_id";
    /// Output-topic hint. Only honoured when the router has no rule.
    pub const TOPIC: &str = "topic";
    pub const RECEIVED_TOPIC: &str = "received_topic";
    pub const HANDLER_NAME: &str = "handler_name";
    pub const DOMAIN: &str = "domain";
    pub const INTERACTION_ID: &str = "interaction_id";
    pub const INTERACTION_TOKEN: &str = "interaction_token";
    pub const REQUESTING_USER_ID: &str = "requesting_user_id";
    pub const CHANNEL_ID: &str = "channel_id";
    pub const MESSAGE_ID: &str = "message_id";
    pub const SUBMITTED_AT: &str = "submitted_at";
    pub const USER_TIMEZONE: &str = "user_timezone";
    pub const RAW_START_TIME: &str = "raw_start_time";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub uuid: String,
    pub metadata: BTreeMap<String, String>,
    pub payload: Vec<u8>,
}

impl BusMessage {
    #[must_use]
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            metadata: BTreeMap::new(),
            payload,
        }
    }

    /// Serializes `payload` as JSON into a fresh message.
    pub fn from_payload<T: Serialize>(payload: &T) -> Result<Self> {
        Ok(Self::new(serde_json::to_vec(payload)?))
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.payload)?)
    }

    #[must_use]
    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_metadata(key, value);
        self
    }

    pub fn set_metadata(&mut self, key: &str, value: impl Into<String>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    /// Empty values count as absent.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> {
        self.metadata(keys::CORRELATION_ID)
    }

    #[must_use]
    pub fn guild_id(&self) -> Option<&str> {
        self.metadata(keys::GUILD_ID)
    }

    #[must_use]
    pub fn topic_hint(&self) -> Option<&str> {
        self.metadata(keys::TOPIC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Ping {
        guild_id: String,
        count: u32,
    }

    #[test]
    fn test_payload_and_metadata() {
        let msg = BusMessage::from_payload(&Ping {
            guild_id: "g1".to_string(),
            count: 3,
        })
        .unwrap()
        .with_metadata(keys::CORRELATION_ID, "c1")
        .with_metadata(keys::GUILD_ID, "g1")
        .with_metadata(keys::TOPIC, "");

        assert_eq!(msg.correlation_id(), Some("c1"));
        assert_eq!(msg.guild_id(), Some("g1"));
        assert_eq!(msg.topic_hint(), None);
        assert!(Uuid::parse_str(&msg.uuid).is_ok());

        let decoded: Ping = msg.decode().unwrap();
        assert_eq!(decoded.count, 3);
        assert_eq!(
            String::from_utf8(msg.payload).unwrap(),
            r#"{"guild_id":"g1","count":3}"#
        );
    }

    #[test]
    fn test_decode_failure_is_validation_error() {
        let msg = BusMessage::new(b"not json".to_vec());
        let err = msg.decode::<Ping>().unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::ValidationError);
    }
}
