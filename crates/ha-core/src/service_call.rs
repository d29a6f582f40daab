//! Service call type handed to service handlers

use serde::{Deserialize, Serialize};

use crate::{attrs, CallServiceData};

/// A request to run a registered service
///
/// Built by the service registry from a `call_service` event and passed to
/// the handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCall {
    /// The domain the service belongs to (e.g., "light")
    pub domain: String,

    /// The service name (e.g., "turn_on")
    pub service: String,

    /// Call data, always a JSON object
    pub data: serde_json::Value,

    /// Correlates the call with its `service_executed` event
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
}

impl ServiceCall {
    pub fn new(
        domain: impl Into<String>,
        service: impl Into<String>,
        data: serde_json::Value,
        call_id: Option<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            data,
            call_id,
        }
    }

    /// Full service identifier (domain.service)
    pub fn service_id(&self) -> String {
        format!("{}.{}", self.domain, self.service)
    }

    /// Get a typed value from the call data
    pub fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Entity ids targeted by the call, from a single string or a list
    pub fn entity_ids(&self) -> Vec<String> {
        match self.data.get(attrs::ENTITY_ID) {
            Some(serde_json::Value::String(s)) => vec![s.to_lowercase()],
            Some(serde_json::Value::Array(arr)) => arr
                .iter()
                .filter_map(|v| v.as_str().map(str::to_lowercase))
                .collect(),
            _ => vec![],
        }
    }
}

impl From<CallServiceData> for ServiceCall {
    fn from(event: CallServiceData) -> Self {
        Self::new(
            event.domain,
            event.service,
            event.service_data,
            event.service_call_id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_call_creation() {
        let call = ServiceCall::new(
            "light",
            "turn_on",
            json!({"entity_id": "light.living_room", "brightness": 255}),
            Some("c-1".into()),
        );

        assert_eq!(call.service_id(), "light.turn_on");
        assert_eq!(call.get::<i32>("brightness"), Some(255));
        assert_eq!(call.get::<String>("missing"), None);
    }

    #[test]
    fn test_entity_ids_single_and_multiple() {
        let single = ServiceCall::new("light", "turn_on", json!({"entity_id": "Light.Den"}), None);
        assert_eq!(single.entity_ids(), vec!["light.den"]);

        let many = ServiceCall::new(
            "light",
            "turn_on",
            json!({"entity_id": ["light.living_room", "light.bedroom"]}),
            None,
        );
        assert_eq!(many.entity_ids(), vec!["light.living_room", "light.bedroom"]);

        let none = ServiceCall::new("homeassistant", "stop", json!({}), None);
        assert!(none.entity_ids().is_empty());
    }

    #[test]
    fn test_from_call_service_data() {
        let call: ServiceCall = CallServiceData {
            domain: "test".into(),
            service: "echo".into(),
            service_data: json!({"x": 1}),
            service_call_id: Some("id-9".into()),
        }
        .into();

        assert_eq!(call.service_id(), "test.echo");
        assert_eq!(call.call_id.as_deref(), Some("id-9"));
        assert_eq!(call.data, json!({"x": 1}));
    }
}
