//! Event types routed through the context.
//!
//! An [`Event`] is an immutable message identified by an explicit
//! [`EventType`] discriminator. Matching is always by exact type equality,
//! there is no notion of a supertype.

use std::fmt;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{Result, StepflowError, common::Vars};

/// Stable, registered identifier of an event type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(String);

impl EventType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventType {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for EventType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Payload types that can travel as an [`Event`].
///
/// ```rust,ignore
/// #[derive(Serialize, Deserialize)]
/// struct Ping { id: u32 }
///
/// impl TypedEvent for Ping {
///     const EVENT_TYPE: &'static str = "ping";
/// }
/// ```
pub trait TypedEvent: Serialize + DeserializeOwned {
    /// Discriminator assigned when the payload type is defined.
    const EVENT_TYPE: &'static str;

    fn event_type() -> EventType {
        EventType::from(Self::EVENT_TYPE)
    }
}

/// A typed message exchanged between steps.
///
/// Two events are equal when their type and every field are equal; this is the
/// identity used to clear in-progress bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    event_type: EventType,
    #[serde(default)]
    data: Vars,
}

impl Event {
    pub fn new(
        event_type: impl Into<EventType>,
        data: Vars,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            data,
        }
    }

    /// An event that carries no fields.
    pub fn empty(event_type: impl Into<EventType>) -> Self {
        Self::new(event_type, Vars::new())
    }

    /// Build an event from a typed payload. The payload must serialize to a
    /// JSON object (or to nothing, for unit payloads).
    pub fn from_typed<T: TypedEvent>(payload: &T) -> Result<Self> {
        let data = match serde_json::to_value(payload)? {
            Value::Object(map) => Vars::from(map),
            Value::Null => Vars::new(),
            other => {
                return Err(StepflowError::Convert(format!(
                    "event payload {} must serialize to an object, got {other}",
                    T::EVENT_TYPE
                )));
            }
        };

        Ok(Self::new(T::event_type(), data))
    }

    /// Decode this event back into its typed payload.
    pub fn to_typed<T: TypedEvent>(&self) -> Result<T> {
        if self.event_type.as_str() != T::EVENT_TYPE {
            return Err(StepflowError::Convert(format!(
                "event of type {} cannot be decoded as {}",
                self.event_type,
                T::EVENT_TYPE
            )));
        }

        let value = Value::from(self.data.clone());
        match serde_json::from_value(value) {
            Ok(payload) => Ok(payload),
            Err(_) if self.data.is_empty() => Ok(serde_json::from_value(Value::Null)?),
            Err(e) => Err(e.into()),
        }
    }

    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    pub fn data(&self) -> &Vars {
        &self.data
    }

    /// Named field of the event; `None` stands for "no value" when the event
    /// does not carry that field.
    pub fn field(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.data.get_value(name)
    }

    /// Exact type match plus field equality for every requirement. A missing
    /// field compares as JSON `null`.
    pub fn matches(
        &self,
        event_type: &EventType,
        requirements: Option<&Vars>,
    ) -> bool {
        if &self.event_type != event_type {
            return false;
        }

        requirements.is_none_or(|reqs| reqs.iter().all(|(k, v)| self.field(k).unwrap_or(&Value::Null) == v))
    }
}

/// Item written to the streaming sink.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Event(Event),
    /// Explicit end-of-stream marker.
    End,
}

impl From<Option<Event>> for StreamItem {
    fn from(event: Option<Event>) -> Self {
        match event {
            Some(e) => StreamItem::Event(e),
            None => StreamItem::End,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Ping {
        id: u32,
    }

    impl TypedEvent for Ping {
        const EVENT_TYPE: &'static str = "ping";
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Tick;

    impl TypedEvent for Tick {
        const EVENT_TYPE: &'static str = "tick";
    }

    #[test]
    fn test_event_from_typed() {
        let event = Event::from_typed(&Ping { id: 7 }).unwrap();
        assert_eq!(event.event_type().as_str(), "ping");
        assert_eq!(event.field("id"), Some(&json!(7)));
        assert_eq!(event.to_typed::<Ping>().unwrap(), Ping { id: 7 });
    }

    #[test]
    fn test_event_unit_payload() {
        let event = Event::from_typed(&Tick).unwrap();
        assert!(event.data().is_empty());
        assert_eq!(event.to_typed::<Tick>().unwrap(), Tick);
    }

    #[test]
    fn test_event_to_typed_wrong_type() {
        let event = Event::empty("pong");
        let err = event.to_typed::<Ping>().unwrap_err();
        assert!(err.to_string().contains("cannot be decoded as ping"));
    }

    #[test]
    fn test_event_matches_exact_type_only() {
        let event = Event::new("ping", Vars::new().with("id", 5));
        assert!(event.matches(&"ping".into(), None));
        assert!(!event.matches(&"ping_v2".into(), None));
    }

    #[test]
    fn test_event_matches_requirements() {
        let event = Event::new("ping", Vars::new().with("id", 5));

        assert!(event.matches(&"ping".into(), Some(&Vars::new().with("id", 5))));
        assert!(!event.matches(&"ping".into(), Some(&Vars::new().with("id", 7))));
        // missing fields compare as "no value"
        assert!(!event.matches(&"ping".into(), Some(&Vars::new().with("name", "a"))));
        assert!(event.matches(&"ping".into(), Some(&Vars::new().with("name", Value::Null))));
    }

    #[test]
    fn test_event_serde_shape() {
        let event = Event::new("ping", Vars::new().with("id", 1));
        assert_eq!(serde_json::to_value(&event).unwrap(), json!({"type": "ping", "data": {"id": 1}}));
    }

    #[test]
    fn test_stream_item_from_option() {
        assert_eq!(StreamItem::from(None), StreamItem::End);
        assert_eq!(StreamItem::from(Some(Event::empty("a"))), StreamItem::Event(Event::empty("a")));
    }
}
