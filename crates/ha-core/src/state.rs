//! State type representing an entity's current value

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{attrs, EntityId};

/// Integration-specific attributes attached to a state
pub type Attributes = HashMap<String, serde_json::Value>;

/// Snapshot of an entity at a point in time
///
/// A `State` is a value: the store never mutates one in place, it swaps in a
/// new snapshot. Anything holding an earlier snapshot keeps seeing exactly
/// what it was handed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    /// The entity this state belongs to
    pub entity_id: EntityId,

    /// The state value (e.g., "on", "off", "23.5")
    pub state: String,

    /// Additional attributes associated with the state
    #[serde(default)]
    pub attributes: Attributes,

    /// When `state` last took a different value
    pub last_changed: DateTime<Utc>,

    /// When this entity was last written, value change or not
    pub last_updated: DateTime<Utc>,
}

impl State {
    /// Create a first snapshot for an entity
    pub fn new(entity_id: EntityId, state: impl Into<String>, attributes: Attributes) -> Self {
        let now = Utc::now();
        Self {
            entity_id,
            state: state.into(),
            attributes,
            last_changed: now,
            last_updated: now,
        }
    }

    /// Create the snapshot that follows this one
    ///
    /// `last_changed` carries over when the state string is unchanged;
    /// `last_updated` always moves to now.
    pub fn successor(&self, new_state: impl Into<String>, new_attributes: Attributes) -> Self {
        let now = Utc::now();
        let new_state = new_state.into();
        let last_changed = if self.state == new_state {
            self.last_changed
        } else {
            now
        };

        Self {
            entity_id: self.entity_id.clone(),
            state: new_state,
            attributes: new_attributes,
            last_changed,
            last_updated: now,
        }
    }

    pub fn domain(&self) -> &str {
        self.entity_id.domain()
    }

    pub fn object_id(&self) -> &str {
        self.entity_id.object_id()
    }

    /// Display name: the `friendly_name` attribute, else the object id with
    /// underscores as spaces
    pub fn name(&self) -> String {
        match self.attributes.get(attrs::FRIENDLY_NAME) {
            Some(serde_json::Value::String(name)) => name.clone(),
            _ => self.object_id().replace('_', " "),
        }
    }

    /// Get an attribute value by key
    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        // Timestamps are not part of equality
        self.entity_id == other.entity_id
            && self.state == other.state
            && self.attributes == other.attributes
    }
}
