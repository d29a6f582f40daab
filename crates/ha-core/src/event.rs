//! Event types for the hub event bus

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{attrs, EntityId, State, MATCH_ALL};

/// Event type identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventType(String);

impl EventType {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self(event_type.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The wildcard listener key
    pub fn match_all() -> Self {
        Self(MATCH_ALL.to_string())
    }

    pub fn is_match_all(&self) -> bool {
        self.0 == MATCH_ALL
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&EventType> for EventType {
    fn from(t: &EventType) -> Self {
        t.clone()
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Origin of an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventOrigin {
    /// Fired inside this process
    #[default]
    Local,
    /// Forwarded from another instance
    Remote,
}

/// Payload of a `state_changed` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChangedData {
    pub entity_id: EntityId,
    pub old_state: Option<Arc<State>>,
    /// `None` when the entity was removed
    pub new_state: Option<Arc<State>>,
}

/// Payload of a `call_service` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallServiceData {
    pub domain: String,
    pub service: String,
    pub service_data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_call_id: Option<String>,
}

impl CallServiceData {
    /// Read a service request out of an event payload
    ///
    /// Accepts the typed variant, and the flat JSON shape remote instances
    /// send (`domain`, `service`, `service_call_id` next to the call data).
    pub fn from_event_data(data: &EventData) -> Option<Self> {
        match data {
            EventData::CallService(call) => Some(call.clone()),
            EventData::Custom(Value::Object(map)) => {
                let domain = map.get(attrs::DOMAIN)?.as_str()?.to_lowercase();
                let service = map.get(attrs::SERVICE)?.as_str()?.to_lowercase();
                let service_call_id = map
                    .get(attrs::SERVICE_CALL_ID)
                    .and_then(Value::as_str)
                    .map(String::from);
                let service_data: Map<String, Value> = map
                    .iter()
                    .filter(|(key, _)| {
                        !matches!(
                            key.as_str(),
                            attrs::DOMAIN | attrs::SERVICE | attrs::SERVICE_CALL_ID
                        )
                    })
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();

                Some(Self {
                    domain,
                    service,
                    service_data: Value::Object(service_data),
                    service_call_id,
                })
            }
            _ => None,
        }
    }
}

/// Payload of a `service_executed` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceExecutedData {
    pub service_call_id: String,
}

impl ServiceExecutedData {
    pub fn from_event_data(data: &EventData) -> Option<Self> {
        match data {
            EventData::ServiceExecuted(executed) => Some(executed.clone()),
            EventData::Custom(Value::Object(map)) => map
                .get(attrs::SERVICE_CALL_ID)
                .and_then(Value::as_str)
                .map(|id| Self {
                    service_call_id: id.to_string(),
                }),
            _ => None,
        }
    }
}

/// Payload of a `service_registered` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRegisteredData {
    pub domain: String,
    pub service: String,
}

/// Payload of a `time_changed` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeChangedData {
    pub now: DateTime<Utc>,
}

/// Event payload
///
/// Core events carry typed fields; anything else an integration fires goes
/// in `Custom` as an open JSON value (normally an object).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventData {
    StateChanged(StateChangedData),
    CallService(CallServiceData),
    ServiceExecuted(ServiceExecutedData),
    ServiceRegistered(ServiceRegisteredData),
    TimeChanged(TimeChangedData),
    Custom(Value),
}

impl EventData {
    /// Empty custom payload
    pub fn empty() -> Self {
        EventData::Custom(Value::Object(Map::new()))
    }

    pub fn as_state_changed(&self) -> Option<&StateChangedData> {
        match self {
            EventData::StateChanged(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_time_changed(&self) -> Option<&TimeChangedData> {
        match self {
            EventData::TimeChanged(data) => Some(data),
            _ => None,
        }
    }

    /// The payload as JSON, the shape remote listeners see
    pub fn to_value(&self) -> Value {
        match self {
            EventData::Custom(value) => value.clone(),
            typed => serde_json::to_value(typed).unwrap_or_default(),
        }
    }

    /// Look up one top-level key of the JSON payload
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            EventData::Custom(value) => value.get(key).cloned(),
            typed => typed.to_value().get(key).cloned(),
        }
    }
}

impl Default for EventData {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Value> for EventData {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => EventData::empty(),
            other => EventData::Custom(other),
        }
    }
}

impl From<Map<String, Value>> for EventData {
    fn from(map: Map<String, Value>) -> Self {
        EventData::Custom(Value::Object(map))
    }
}

impl From<StateChangedData> for EventData {
    fn from(data: StateChangedData) -> Self {
        EventData::StateChanged(data)
    }
}

impl From<CallServiceData> for EventData {
    fn from(data: CallServiceData) -> Self {
        EventData::CallService(data)
    }
}

impl From<ServiceExecutedData> for EventData {
    fn from(data: ServiceExecutedData) -> Self {
        EventData::ServiceExecuted(data)
    }
}

impl From<ServiceRegisteredData> for EventData {
    fn from(data: ServiceRegisteredData) -> Self {
        EventData::ServiceRegistered(data)
    }
}

impl From<TimeChangedData> for EventData {
    fn from(data: TimeChangedData) -> Self {
        EventData::TimeChanged(data)
    }
}

/// An event fired on the bus
///
/// Immutable once fired; listeners share one instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub event_type: EventType,
    pub data: EventData,
    pub origin: EventOrigin,
    pub time_fired: DateTime<Utc>,
}

impl Event {
    /// Create a local event stamped with the current time
    pub fn new(event_type: impl Into<EventType>, data: impl Into<EventData>) -> Self {
        Self {
            event_type: event_type.into(),
            data: data.into(),
            origin: EventOrigin::Local,
            time_fired: Utc::now(),
        }
    }

    pub fn with_origin(mut self, origin: EventOrigin) -> Self {
        self.origin = origin;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_custom_payload_from_json() {
        let event = Event::new("test_event", json!({"a": 1}));
        assert_eq!(event.data, EventData::Custom(json!({"a": 1})));
        assert_eq!(event.data.get("a"), Some(json!(1)));
        assert_eq!(event.origin, EventOrigin::Local);

        let empty = Event::new("test_event", Value::Null);
        assert_eq!(empty.data.to_value(), json!({}));
    }

    #[test]
    fn test_typed_payload_to_value() {
        let data = EventData::from(ServiceExecutedData {
            service_call_id: "abc-1".into(),
        });
        assert_eq!(data.to_value(), json!({"service_call_id": "abc-1"}));
        assert_eq!(data.get(attrs::SERVICE_CALL_ID), Some(json!("abc-1")));
    }

    #[test]
    fn test_call_service_from_remote_payload() {
        let data = EventData::from(json!({
            "domain": "Light",
            "service": "turn_on",
            "service_call_id": "remote-7",
            "entity_id": "light.kitchen",
        }));

        let call = CallServiceData::from_event_data(&data).unwrap();
        assert_eq!(call.domain, "light");
        assert_eq!(call.service, "turn_on");
        assert_eq!(call.service_call_id.as_deref(), Some("remote-7"));
        assert_eq!(call.service_data, json!({"entity_id": "light.kitchen"}));

        assert!(CallServiceData::from_event_data(&EventData::from(json!({"domain": "x"}))).is_none());
    }

    #[test]
    fn test_origin_serializes_upper_case() {
        let event = Event::new("x", Value::Null).with_origin(EventOrigin::Remote);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["origin"], "REMOTE");
        assert_eq!(json["event_type"], "x");
    }
}
