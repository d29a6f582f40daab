//! Jinja2-compatible templates for the hub
//!
//! Built on minijinja with state access added:
//!
//! - `states('entity_id')` - state value as a string
//! - `states.light.living_room` - full state object
//! - `is_state('entity_id', 'on')` - compare the current state
//! - `state_attr('entity_id', 'brightness')` - one attribute
//! - `| multiply(10)`, `| float`, `| int`, `| round(2)` - numeric filters
//!
//! # Example
//!
//! ```ignore
//! use ha_template::TemplateEngine;
//!
//! let engine = TemplateEngine::new(hass.states());
//! let result = engine.render("{{ states('sensor.temperature') }}")?;
//! ```

mod engine;
mod error;
mod filters;
mod states;

pub use engine::{create_test_engine, TemplateEngine};
pub use error::{TemplateError, TemplateResult};
pub use states::{StateWrapper, StatesObject};

// Re-export minijinja Value for convenience
pub use minijinja::Value;
