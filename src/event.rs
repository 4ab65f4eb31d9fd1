//! Event envelope and the bridge to typed, adjacently tagged domain enums.
//!
//! Domain events are closed enums using `#[serde(tag = "type", content =
//! "payload")]`, so one enum value serializes to exactly the `type`/`payload`
//! half of an [`Event`]. The functions here split and rebuild that shape; no
//! I/O occurs in this module.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single immutable entry in a stream kind's log.
///
/// Equality is field-wise; the on-wire form is one JSON object per log line,
/// with the enum tag under the `type` key:
///
/// ```text
/// {"type":"StudentCreated","aggregateId":"1","payload":{"name":"Ann"}}
/// ```
///
/// Instance identifiers are strings end-to-end, so numeric ids that would
/// exceed safe-integer precision in the wire format never lose digits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event type tag (e.g. `"StudentCreated"`).
    #[serde(rename = "type")]
    pub event_type: String,
    /// Identifier of the aggregate instance this event belongs to.
    #[serde(rename = "aggregateId")]
    pub aggregate_id: String,
    /// Domain payload; `null` for events that carry no fields.
    #[serde(default)]
    pub payload: Value,
}

impl Event {
    /// Create a new event envelope.
    pub fn new(
        event_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            aggregate_id: aggregate_id.into(),
            payload,
        }
    }
}

/// Encode a typed domain event into an [`Event`] envelope.
///
/// The domain event must use `#[serde(tag = "type", content = "payload")]`
/// adjacently tagged serialization. The `"type"` field becomes
/// [`Event::event_type`] and the `"payload"` content (absent for unit
/// variants) becomes [`Event::payload`].
///
/// # Errors
///
/// Returns `serde_json::Error` if the domain event cannot be serialized.
pub fn encode_domain_event<E: Serialize>(
    aggregate_id: &str,
    domain_event: &E,
) -> serde_json::Result<Event> {
    // Serialize the adjacently tagged domain event. This produces JSON like:
    //   {"type": "TeacherCreated"}                    (unit variant)
    //   {"type": "StudentCreated", "payload": {...}}  (variant with fields)
    let value = serde_json::to_value(domain_event)?;
    let obj = value
        .as_object()
        .expect("adjacently tagged enum must serialize to a JSON object");

    let event_type = obj["type"]
        .as_str()
        .expect("adjacently tagged enum must have a string 'type' field")
        .to_string();

    let payload = obj.get("payload").cloned().unwrap_or(Value::Null);

    Ok(Event {
        event_type,
        aggregate_id: aggregate_id.to_string(),
        payload,
    })
}

/// Decode an [`Event`] envelope into a typed domain event.
///
/// Rebuilds the adjacently tagged JSON object from the envelope fields and
/// deserializes it. Returns `None` for event types the enum does not know or
/// for payloads that no longer match the variant shape, so callers can treat
/// unrecognized events as a no-op for forward compatibility.
pub fn decode_event<E: DeserializeOwned>(event: &Event) -> Option<E> {
    let tagged = if event.payload.is_null() {
        // Unit variant: just `{"type": "VariantName"}`.
        serde_json::json!({ "type": event.event_type })
    } else {
        serde_json::json!({
            "type": event.event_type,
            "payload": event.payload,
        })
    };

    serde_json::from_value(tagged).ok()
}
