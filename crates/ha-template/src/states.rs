//! States object for accessing entity states in templates
//!
//! Provides the `states` object that allows templates to access entity states.

use std::sync::{Arc, Weak};

use ha_core::State;
use ha_state_store::StateStore;
use minijinja::value::{Object, ObjectRepr, Value};
use minijinja::{Error, ErrorKind};

use crate::filters::value_to_f64;

/// The states object exposed to templates
///
/// Allows access to entity states via:
/// - `states('entity_id')` - Get state value as string
/// - `states.entity_id` - Get full state object
/// - `states.domain` - Get domain proxy for `states.domain.entity`
///
/// Holds the store weakly; once the hub is gone every lookup is undefined.
#[derive(Clone)]
pub struct StatesObject {
    store: Weak<StateStore>,
}

impl std::fmt::Debug for StatesObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatesObject").finish_non_exhaustive()
    }
}

impl StatesObject {
    pub fn new(store: &Arc<StateStore>) -> Self {
        Self {
            store: Arc::downgrade(store),
        }
    }

    /// A states object with nothing behind it
    pub(crate) fn detached() -> Self {
        Self { store: Weak::new() }
    }

    /// Get the full state object
    pub fn get(&self, entity_id: &str) -> Option<Arc<State>> {
        self.store.upgrade()?.get(entity_id)
    }

    /// Get the state value as a string
    pub fn get_state(&self, entity_id: &str) -> Option<String> {
        self.get(entity_id).map(|state| state.state.clone())
    }

    /// Check if entity is in a specific state
    pub fn is_state(&self, entity_id: &str, state: &str) -> bool {
        self.get_state(entity_id).is_some_and(|current| current == state)
    }

    /// Get an attribute value
    pub fn state_attr(&self, entity_id: &str, attribute: &str) -> Value {
        self.get(entity_id)
            .and_then(|state| state.attributes.get(attribute).map(Value::from_serialize))
            .unwrap_or(Value::UNDEFINED)
    }

    /// Check if entity attribute matches value
    pub fn is_state_attr(&self, entity_id: &str, attribute: &str, value: Value) -> bool {
        values_equal(&self.state_attr(entity_id, attribute), &value)
    }
}

impl Object for StatesObject {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let key = key.as_str()?;

        // Check if this is a full entity_id (domain.object_id)
        if key.contains('.') {
            return self.get(key).map(state_to_value);
        }

        // Otherwise, return a domain proxy
        Some(Value::from_object(DomainProxy {
            domain: key.to_string(),
            states: (**self).clone(),
        }))
    }

    fn call(self: &Arc<Self>, _state: &minijinja::State, args: &[Value]) -> Result<Value, Error> {
        // states('entity_id') -> returns state string
        let entity_id = args.first().and_then(|v| v.as_str()).ok_or_else(|| {
            Error::new(ErrorKind::InvalidOperation, "states() requires entity_id")
        })?;

        Ok(self
            .get_state(entity_id)
            .map(Value::from)
            .unwrap_or(Value::UNDEFINED))
    }
}

/// Proxy for accessing entities by domain
///
/// Allows `states.light.living_room` syntax
#[derive(Debug, Clone)]
struct DomainProxy {
    domain: String,
    states: StatesObject,
}

impl Object for DomainProxy {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let object_id = key.as_str()?;
        let entity_id = format!("{}.{}", self.domain, object_id);

        self.states.get(&entity_id).map(state_to_value)
    }
}

/// Convert a State to a template Value
pub(crate) fn state_to_value(state: Arc<State>) -> Value {
    Value::from_object(StateWrapper(state))
}

/// Wrapper for State to expose to templates
#[derive(Debug, Clone)]
pub struct StateWrapper(pub Arc<State>);

impl std::fmt::Display for StateWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.state)
    }
}

impl Object for StateWrapper {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let key = key.as_str()?;
        match key {
            "state" => Some(Value::from(self.0.state.as_str())),
            "entity_id" => Some(Value::from(self.0.entity_id.to_string())),
            "domain" => Some(Value::from(self.0.entity_id.domain())),
            "object_id" => Some(Value::from(self.0.entity_id.object_id())),
            "name" => Some(Value::from(self.0.name())),
            "last_changed" => Some(Value::from(self.0.last_changed.to_rfc3339())),
            "last_updated" => Some(Value::from(self.0.last_updated.to_rfc3339())),
            "attributes" => Some(Value::from_serialize(&self.0.attributes)),
            _ => None,
        }
    }
}

/// Compare two Values for equality
fn values_equal(a: &Value, b: &Value) -> bool {
    if a.is_undefined() || b.is_undefined() {
        return a.is_undefined() && b.is_undefined();
    }
    if let (Some(a_str), Some(b_str)) = (a.as_str(), b.as_str()) {
        return a_str == b_str;
    }
    if let (Some(a_num), Some(b_num)) = (value_to_f64(a), value_to_f64(b)) {
        return (a_num - b_num).abs() < f64::EPSILON;
    }
    a == b
}

/// Function wrapper for is_state
pub fn is_state_fn(states: &StatesObject, entity_id: &str, state: Value) -> bool {
    // Check for string first (strings are iterable in minijinja)
    if let Some(s) = state.as_str() {
        states.is_state(entity_id, s)
    } else if let Ok(iter) = state.try_iter() {
        let current = states.get_state(entity_id);
        iter.filter_map(|v| v.as_str().map(str::to_string))
            .any(|candidate| current.as_deref() == Some(candidate.as_str()))
    } else {
        false
    }
}
