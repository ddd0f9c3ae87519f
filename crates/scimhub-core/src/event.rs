//! SCIM event notifications.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// Schema URN carried by every event notification document.
pub const EVENT_SCHEMA: &str = "urn:ietf:params:scim:schemas:notify:2.0:Event";

/// Kind of change an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Create,
    Update,
    Delete,
    Add,
    Remove,
    Activate,
    Deactivate,
}

/// One event notification.
///
/// Events are immutable once built. Equality is structural over every field,
/// which is also how a poll collapses the same event reached through several feeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    feed_uris: Vec<String>,
    #[serde(default)]
    publisher_uri: Option<String>,
    #[serde(default, alias = "resourceUri")]
    resource_uris: Vec<String>,
    #[serde(rename = "type")]
    event_type: EventType,
    #[serde(default)]
    attributes: Vec<String>,
    #[serde(default = "empty_values")]
    values: Value,
}

fn empty_values() -> Value {
    Value::Object(Map::new())
}

/// Wire form of an event, including the `schemas` envelope.
#[derive(Serialize, Deserialize)]
struct EventDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schemas: Option<Vec<String>>,
    #[serde(flatten)]
    event: Event,
}

impl Event {
    /// Create an event of the given type that targets no feeds yet.
    pub fn new(event_type: EventType) -> Self {
        Self {
            feed_uris: Vec::new(),
            publisher_uri: None,
            resource_uris: Vec::new(),
            event_type,
            attributes: Vec::new(),
            values: empty_values(),
        }
    }

    /// Add a target feed.
    pub fn with_feed(mut self, feed_uri: impl Into<String>) -> Self {
        self.feed_uris.push(feed_uri.into());
        self
    }

    /// Set the publisher.
    pub fn with_publisher(mut self, publisher_uri: impl Into<String>) -> Self {
        self.publisher_uri = Some(publisher_uri.into());
        self
    }

    /// Add an affected resource.
    pub fn with_resource(mut self, resource_uri: impl Into<String>) -> Self {
        self.resource_uris.push(resource_uri.into());
        self
    }

    /// Add a changed attribute name.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attributes.push(attribute.into());
        self
    }

    /// Set the opaque values document.
    pub fn with_values(mut self, values: Value) -> Self {
        self.values = values;
        self
    }

    /// Parse and validate an event notification document.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let document: EventDocument = serde_json::from_str(json)
            .map_err(|e| Error::InvalidInput(format!("invalid event document: {}", e)))?;

        if let Some(schemas) = &document.schemas {
            if !schemas.iter().any(|s| s == EVENT_SCHEMA) {
                return Err(Error::InvalidInput(format!(
                    "event document must declare schema {}",
                    EVENT_SCHEMA
                )));
            }
        }

        document.event.validate()?;
        Ok(document.event)
    }

    /// Render the event as a notification document.
    pub fn to_json(&self) -> Value {
        let document = EventDocument {
            schemas: Some(vec![EVENT_SCHEMA.to_string()]),
            event: self.clone(),
        };
        // Serializing plain strings and an existing Value cannot fail.
        serde_json::to_value(document).unwrap_or(Value::Null)
    }

    /// Check the event is routable.
    pub fn validate(&self) -> Result<(), Error> {
        if self.feed_uris.iter().any(|uri| uri.trim().is_empty()) {
            return Err(Error::InvalidInput("feed URI cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Feeds this event is routed to, in first-occurrence order without duplicates.
    pub fn feed_uris(&self) -> Vec<&str> {
        let mut uris: Vec<&str> = Vec::with_capacity(self.feed_uris.len());
        for uri in &self.feed_uris {
            if !uris.contains(&uri.as_str()) {
                uris.push(uri);
            }
        }
        uris
    }

    pub fn publisher_uri(&self) -> Option<&str> {
        self.publisher_uri.as_deref()
    }

    pub fn resource_uris(&self) -> &[String] {
        &self.resource_uris
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn values(&self) -> &Value {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MAILMAN: &str = "https://perun.cesnet.cz/scim-notification/storage-fi.ics.muni.cz/mailman";

    fn document() -> String {
        json!({
            "schemas": [EVENT_SCHEMA],
            "feedUris": [MAILMAN],
            "publisherUri": "https://perun.cesnet.cz/scim-notification",
            "resourceUris": ["https://perun.cesnet.cz/scim/Users/2819c223"],
            "type": "CREATE",
            "attributes": ["id", "name", "userName"],
            "values": { "id": "2819c223", "userName": "jdoe" }
        })
        .to_string()
    }

    #[test]
    fn test_parse_event() {
        let event = Event::from_json(&document()).unwrap();

        assert_eq!(event.feed_uris(), vec![MAILMAN]);
        assert_eq!(event.event_type(), EventType::Create);
        assert_eq!(event.attributes().len(), 3);
        assert_eq!(event.values()["userName"], "jdoe");
    }

    #[test]
    fn test_invalid_json_rejected() {
        let err = Event::from_json("invalid json (}").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = Event::from_json("{\"valid json\"}").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_missing_type_rejected() {
        let err = Event::from_json(r#"{"feedUris": ["a"]}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_foreign_schema_rejected() {
        let doc = json!({
            "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"],
            "type": "UPDATE"
        });
        assert!(Event::from_json(&doc.to_string()).is_err());
    }

    #[test]
    fn test_empty_feed_uri_rejected() {
        let doc = json!({ "feedUris": [""], "type": "DELETE" });
        assert!(Event::from_json(&doc.to_string()).is_err());
    }

    #[test]
    fn test_feed_uris_deduplicated() {
        let event = Event::new(EventType::Update)
            .with_feed("b")
            .with_feed("a")
            .with_feed("b");
        assert_eq!(event.feed_uris(), vec!["b", "a"]);
    }

    #[test]
    fn test_to_json_carries_schema() {
        let event = Event::from_json(&document()).unwrap();
        let rendered = event.to_json();

        assert_eq!(rendered["schemas"][0], EVENT_SCHEMA);
        assert_eq!(rendered["type"], "CREATE");
        assert_eq!(Event::from_json(&rendered.to_string()).unwrap(), event);
    }

    #[test]
    fn test_no_feeds_is_valid() {
        let event = Event::from_json(r#"{"type": "ACTIVATE"}"#).unwrap();
        assert!(event.feed_uris().is_empty());
        assert!(event.values().is_object());
    }
}
