//! Event types for the DCB event log
//!
//! Events are immutable once written. Two representations exist:
//! - `Event`: typed form, payload decoded to JSON
//! - `SerializableEvent`: wire form, payload kept as opaque bytes
//!
//! Catch-up and archival only ever need the wire form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::sortable_id::{timestamp_of, SortableIdError};

/// Error produced when a tag string is not `group:content`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid tag '{0}': expected 'group:content'")]
pub struct InvalidTag(pub String);

/// A stream identifier of the form `group:content`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag {
    group: String,
    content: String,
}

impl Tag {
    pub fn new(group: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            content: content.into(),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

impl FromStr for Tag {
    type Err = InvalidTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((group, content)) if !group.is_empty() && !content.is_empty() => {
                Ok(Tag::new(group, content))
            }
            _ => Err(InvalidTag(s.to_string())),
        }
    }
}

impl TryFrom<String> for Tag {
    type Error = InvalidTag;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.to_string()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.content)
    }
}

/// Provenance of an event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    pub causation_id: String,
    pub correlation_id: String,
    pub executed_user: String,
}

impl EventMetadata {
    pub fn new(
        causation_id: impl Into<String>,
        correlation_id: impl Into<String>,
        executed_user: impl Into<String>,
    ) -> Self {
        Self {
            causation_id: causation_id.into(),
            correlation_id: correlation_id.into(),
            executed_user: executed_user.into(),
        }
    }
}

/// Typed event with a decoded JSON payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub sortable_unique_id_value: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub tags: Vec<String>,
    pub event_metadata: EventMetadata,
}

impl Event {
    /// Encode into the wire form
    pub fn to_serializable(&self) -> Result<SerializableEvent, serde_json::Error> {
        Ok(SerializableEvent {
            payload: serde_json::to_vec(&self.payload)?,
            sortable_unique_id_value: self.sortable_unique_id_value.clone(),
            id: self.id,
            event_metadata: self.event_metadata.clone(),
            tags: self.tags.clone(),
            event_payload_name: self.event_type.clone(),
        })
    }

    /// Check whether this event belongs to the given tag's stream
    pub fn has_tag(&self, tag: &Tag) -> bool {
        let tag = tag.to_string();
        self.tags.iter().any(|t| *t == tag)
    }
}

/// Wire form of an event: payload bytes are base64 in JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializableEvent {
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
    pub sortable_unique_id_value: String,
    pub id: Uuid,
    pub event_metadata: EventMetadata,
    pub tags: Vec<String>,
    pub event_payload_name: String,
}

impl SerializableEvent {
    /// Decode into the typed form
    pub fn to_event(&self) -> Result<Event, serde_json::Error> {
        Ok(Event {
            id: self.id,
            sortable_unique_id_value: self.sortable_unique_id_value.clone(),
            event_type: self.event_payload_name.clone(),
            payload: serde_json::from_slice(&self.payload)?,
            tags: self.tags.clone(),
            event_metadata: self.event_metadata.clone(),
        })
    }

    /// Timestamp decoded from the sortable ID
    pub fn timestamp(&self) -> Result<chrono::DateTime<chrono::Utc>, SortableIdError> {
        timestamp_of(&self.sortable_unique_id_value)
    }

    pub fn has_tag(&self, tag: &Tag) -> bool {
        let tag = tag.to_string();
        self.tags.iter().any(|t| *t == tag)
    }

    /// Serialize to a single JSON line (no trailing newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_event() -> SerializableEvent {
        SerializableEvent {
            payload: br#"{"name":"Widget"}"#.to_vec(),
            sortable_unique_id_value: "063871236000000000000000000042".to_string(),
            id: Uuid::new_v4(),
            event_metadata: EventMetadata::new("cause", "corr", "user"),
            tags: vec!["item:42".to_string()],
            event_payload_name: "ItemCreated".to_string(),
        }
    }

    #[test]
    fn test_tag_parse() {
        let tag: Tag = "student:abc".parse().unwrap();
        assert_eq!(tag.group(), "student");
        assert_eq!(tag.content(), "abc");
        assert_eq!(tag.to_string(), "student:abc");
        assert!("no-colon".parse::<Tag>().is_err());
        assert!(":empty".parse::<Tag>().is_err());
    }

    #[test]
    fn test_serializable_event_json_shape() {
        let event = sample_event();
        let line = event.to_json_line().unwrap();
        assert!(line.contains("\"sortableUniqueIdValue\":\"063871236000000000000000000042\""));
        assert!(line.contains("\"eventPayloadName\":\"ItemCreated\""));
        assert!(!line.contains('\n'));

        let parsed = SerializableEvent::from_json_line(&line).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_typed_conversion() {
        let wire = sample_event();
        let typed = wire.to_event().unwrap();
        assert_eq!(typed.payload, json!({"name": "Widget"}));
        assert_eq!(typed.event_type, "ItemCreated");
        assert!(typed.has_tag(&Tag::new("item", "42")));

        let back = typed.to_serializable().unwrap();
        assert_eq!(back.id, wire.id);
        assert_eq!(back.to_event().unwrap().payload, typed.payload);
    }

    #[test]
    fn test_timestamp_decodes_from_id() {
        let mut event = sample_event();
        assert!(event.timestamp().is_ok());
        event.sortable_unique_id_value = "bogus".to_string();
        assert!(event.timestamp().is_err());
    }
}
