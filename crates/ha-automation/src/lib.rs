//! Automation Engine
//!
//! Automations are event-driven rules that run service calls when triggers
//! fire and conditions are met. The engine only talks to the hub through its
//! bus, state store and service registry.
//!
//! # Architecture
//!
//! ```text
//! AUTOMATION = TRIGGER → CONDITIONS → ACTIONS
//! ```
//!
//! - **Triggers**: `event`, `state`, `numeric_state`, `time`, `zone` and
//!   `template` platforms
//! - **Conditions**: `state`, `numeric_state`, `time`, `zone` and `template` checks,
//!   combined with `condition_type: and|or`
//! - **Actions**: service calls
//!
//! # Example
//!
//! ```yaml
//! automation:
//!   - alias: Porch light at dusk
//!     trigger:
//!       platform: numeric_state
//!       entity_id: sensor.outside_lux
//!       below: 40
//!     action:
//!       service: light.turn_on
//!       entity_id: light.porch
//! ```

pub mod action;
pub mod automation;
pub mod condition;
pub mod trigger;

pub use action::ServiceAction;
pub use automation::{setup, Automation, AutomationConfig, AutomationError, AutomationResult};
pub use condition::{Condition, ConditionType, TemplateCondition};
pub use trigger::{EntityIdSpec, TemplateTrigger, Trigger, ZoneEvent};
