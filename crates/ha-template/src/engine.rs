//! Template engine for the hub
//!
//! Jinja2-compatible rendering with state access functions and numeric filters.

use std::sync::Arc;

use ha_core::State;
use ha_state_store::StateStore;
use minijinja::{context, Environment, Value};
use tracing::debug;

use crate::error::TemplateResult;
use crate::filters;
use crate::states::{self, StateWrapper, StatesObject};

/// Template engine with state access
///
/// The engine provides:
/// - Access to entity states via the `states` object
/// - State functions like `is_state()`, `state_attr()`, `is_state_attr()`
/// - Filters like `multiply`, `float`, `int`, `round`
pub struct TemplateEngine {
    env: Environment<'static>,
    states: Arc<StatesObject>,
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine").finish_non_exhaustive()
    }
}

impl TemplateEngine {
    /// Create a new template engine reading from `store`
    pub fn new(store: &Arc<StateStore>) -> Self {
        Self::with_states(StatesObject::new(store))
    }

    fn with_states(states: StatesObject) -> Self {
        let states = Arc::new(states);
        let mut env = Environment::new();

        env.set_debug(true);

        Self::register_filters(&mut env);
        Self::register_globals(&mut env, states.clone());

        Self { env, states }
    }

    fn register_filters(env: &mut Environment<'static>) {
        env.add_filter("multiply", filters::multiply);
        env.add_filter("round", filters::round_filter);
        env.add_filter("float", filters::to_float);
        env.add_filter("int", filters::to_int);
    }

    fn register_globals(env: &mut Environment<'static>, states: Arc<StatesObject>) {
        env.add_global("states", Value::from_object((*states).clone()));

        let states_for_is_state = states.clone();
        env.add_function("is_state", move |entity_id: &str, state: Value| {
            states::is_state_fn(&states_for_is_state, entity_id, state)
        });

        let states_for_state_attr = states.clone();
        env.add_function("state_attr", move |entity_id: &str, attribute: &str| {
            states_for_state_attr.state_attr(entity_id, attribute)
        });

        env.add_function(
            "is_state_attr",
            move |entity_id: &str, attribute: &str, value: Value| {
                states.is_state_attr(entity_id, attribute, value)
            },
        );
    }

    /// Render a template string
    pub fn render(&self, template: &str) -> TemplateResult<String> {
        self.render_with_context(template, ())
    }

    /// Render a template with additional context variables
    pub fn render_with_context(
        &self,
        template: &str,
        context: impl serde::Serialize,
    ) -> TemplateResult<String> {
        debug!(template, "Rendering template");
        Ok(self.env.render_str(template, context)?)
    }

    /// Render with `state` bound to the given state object
    pub fn render_with_state(&self, template: &str, state: &State) -> TemplateResult<String> {
        let state = Value::from_object(StateWrapper(Arc::new(state.clone())));
        self.render_with_context(template, context! { state => state })
    }

    /// Whether a string contains template markup
    pub fn is_template(text: &str) -> bool {
        text.contains("{{") || text.contains("{%") || text.contains("{#")
    }

    /// The states object this engine reads through
    pub fn states(&self) -> &StatesObject {
        &self.states
    }
}

/// An engine with no state store behind it; every state lookup is undefined
pub fn create_test_engine() -> TemplateEngine {
    TemplateEngine::with_states(StatesObject::detached())
}
