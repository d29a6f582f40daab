//! Service call actions

use ha_core::attrs;
use ha_service_registry::{ServiceError, ServiceRegistry};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::automation::{AutomationError, AutomationResult};
use crate::trigger::EntityIdSpec;

/// Calls `domain.service` with the configured data
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServiceAction {
    /// Target as `domain.service`
    pub service: String,

    #[serde(default, alias = "service_data")]
    pub data: Map<String, Value>,

    /// Merged into the call data as `entity_id`
    #[serde(default)]
    pub entity_id: Option<EntityIdSpec>,
}

impl ServiceAction {
    pub fn validate(&self) -> AutomationResult<()> {
        self.target().map(|_| ())
    }

    fn target(&self) -> AutomationResult<(&str, &str)> {
        match self.service.split_once('.') {
            Some((domain, service)) if !domain.is_empty() && !service.is_empty() => {
                Ok((domain, service))
            }
            _ => Err(AutomationError::InvalidConfig(format!(
                "service must look like domain.service, got {:?}",
                self.service
            ))),
        }
    }

    /// The call data with `entity_id` merged in
    pub fn call_data(&self) -> Map<String, Value> {
        let mut data = self.data.clone();
        if let Some(entity_id) = &self.entity_id {
            data.insert(
                attrs::ENTITY_ID.to_string(),
                Value::from(entity_id.ids()),
            );
        }
        data
    }

    /// Fire the call without waiting for the handler
    pub fn run(&self, services: &ServiceRegistry) -> AutomationResult<()> {
        let (domain, service) = self.target()?;
        services
            .call(domain, service, Value::Object(self.call_data()), false)
            .map(|_| ())
            .map_err(|err: ServiceError| AutomationError::Action(err.to_string()))
    }
}
