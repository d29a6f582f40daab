//! Core types for the hub
//!
//! This crate provides the fundamental value types shared by every other
//! crate in the workspace: EntityId, State, Event (with its typed payloads)
//! and ServiceCall, plus the reserved event types and attribute keys.

mod entity_id;
mod event;
mod service_call;
mod state;

pub use entity_id::{EntityId, EntityIdError};
pub use event::{
    CallServiceData, Event, EventData, EventOrigin, EventType, ServiceExecutedData,
    ServiceRegisteredData, StateChangedData, TimeChangedData,
};
pub use service_call::ServiceCall;
pub use state::{Attributes, State};

/// Event type / listener key that matches every event
pub const MATCH_ALL: &str = "*";

/// Reserved event types fired and consumed by the core
pub mod events {
    /// An entity state was written or removed
    pub const STATE_CHANGED: &str = "state_changed";

    /// A service was requested
    pub const CALL_SERVICE: &str = "call_service";

    /// A service handler finished successfully
    pub const SERVICE_EXECUTED: &str = "service_executed";

    /// A new service handler was registered
    pub const SERVICE_REGISTERED: &str = "service_registered";

    /// Periodic clock tick fired by the hub timer
    pub const TIME_CHANGED: &str = "time_changed";

    /// The hub has started
    pub const HOMEASSISTANT_START: &str = "homeassistant_start";

    /// The hub is shutting down
    pub const HOMEASSISTANT_STOP: &str = "homeassistant_stop";

    /// A discovery source found a platform
    pub const PLATFORM_DISCOVERED: &str = "platform_discovered";

    /// A component finished loading
    pub const COMPONENT_LOADED: &str = "component_loaded";
}

/// Reserved attribute keys on events and states
pub mod attrs {
    pub const ENTITY_ID: &str = "entity_id";
    pub const DOMAIN: &str = "domain";
    pub const SERVICE: &str = "service";
    pub const SERVICE_CALL_ID: &str = "service_call_id";
    pub const OLD_STATE: &str = "old_state";
    pub const NEW_STATE: &str = "new_state";
    pub const NOW: &str = "now";

    /// Display name of an entity
    pub const FRIENDLY_NAME: &str = "friendly_name";
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";
    /// Zone radius in meters
    pub const RADIUS: &str = "radius";
    /// Location accuracy of a tracked device in meters
    pub const GPS_ACCURACY: &str = "gps_accuracy";
}

/// Common state values
pub mod states {
    pub const ON: &str = "on";
    pub const OFF: &str = "off";
    pub const HOME: &str = "home";
    pub const NOT_HOME: &str = "not_home";
    pub const UNKNOWN: &str = "unknown";
}
