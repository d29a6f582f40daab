//! Entity state storage
//!
//! Holds the current `State` snapshot of every entity, in insertion order,
//! and fires `state_changed` on the bus for every write and removal.

use std::sync::Arc;

use ha_core::{events, Attributes, EntityId, EntityIdError, State, StateChangedData};
use ha_event_bus::EventBus;
use ha_job_pool::PoolError;
use indexmap::IndexMap;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, instrument, trace, warn};

/// Errors returned by the state store
#[derive(Debug, Error)]
pub enum StateError {
    #[error("invalid entity id '{entity_id}': {source}")]
    InvalidEntityId {
        entity_id: String,
        #[source]
        source: EntityIdError,
    },

    #[error("could not fire state_changed: {0}")]
    Pool(#[from] PoolError),
}

pub type StateResult<T> = Result<T, StateError>;

/// The state store
pub struct StateStore {
    states: Mutex<IndexMap<String, Arc<State>>>,
    bus: Arc<EventBus>,
}

impl StateStore {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            states: Mutex::new(IndexMap::new()),
            bus,
        }
    }

    /// Write the state of an entity
    ///
    /// Every call fires `state_changed`, including writes that repeat the
    /// current value. `last_changed` only moves when the value differs.
    /// Nothing is written once the bus has stopped.
    #[instrument(skip(self, state, attributes))]
    pub fn set(
        &self,
        entity_id: &str,
        state: impl Into<String>,
        attributes: Option<Attributes>,
    ) -> StateResult<Arc<State>> {
        let id = parse_entity_id(entity_id)?;
        let state = state.into();
        let attributes = attributes.unwrap_or_default();

        let (old_state, new_state) = {
            let mut states = self.states.lock();
            if !self.bus.is_running() {
                return Err(PoolError::NotRunning.into());
            }
            let key = id.to_string();
            let old_state = states.get(&key).cloned();
            let new_state = Arc::new(match &old_state {
                Some(existing) => existing.successor(state, attributes),
                None => State::new(id.clone(), state, attributes),
            });
            states.insert(key, Arc::clone(&new_state));
            (old_state, new_state)
        };

        debug!(
            state = %new_state.state,
            changed = old_state.as_ref().map_or(true, |old| old.state != new_state.state),
            "Setting entity state"
        );

        let fired = self.bus.fire(
            events::STATE_CHANGED,
            StateChangedData {
                entity_id: id,
                old_state,
                new_state: Some(Arc::clone(&new_state)),
            },
        );
        if let Err(err) = fired {
            warn!(%err, "State written but state_changed not fired");
        }

        Ok(new_state)
    }

    /// Current snapshot of an entity
    pub fn get(&self, entity_id: &str) -> Option<Arc<State>> {
        self.states.lock().get(&entity_id.to_lowercase()).cloned()
    }

    /// Remove an entity
    ///
    /// Returns the removed snapshot, or `None` (and fires nothing) when the
    /// entity was unknown.
    #[instrument(skip(self))]
    pub fn remove(&self, entity_id: &str) -> StateResult<Option<Arc<State>>> {
        let key = entity_id.to_lowercase();
        let removed = {
            let mut states = self.states.lock();
            if !self.bus.is_running() {
                return Err(PoolError::NotRunning.into());
            }
            states.shift_remove(&key)
        };
        let Some(old_state) = removed else {
            return Ok(None);
        };

        trace!("Removed entity state");
        let fired = self.bus.fire(
            events::STATE_CHANGED,
            StateChangedData {
                entity_id: old_state.entity_id.clone(),
                old_state: Some(Arc::clone(&old_state)),
                new_state: None,
            },
        );
        if let Err(err) = fired {
            warn!(%err, "State removed but state_changed not fired");
        }

        Ok(Some(old_state))
    }

    /// Whether the entity exists and currently has `state`
    pub fn is_state(&self, entity_id: &str, state: &str) -> bool {
        self.get(entity_id)
            .is_some_and(|current| current.state == state)
    }

    /// Whether the entity exists and its attribute `name` equals `value`
    pub fn is_state_attr(&self, entity_id: &str, name: &str, value: &serde_json::Value) -> bool {
        self.get(entity_id)
            .is_some_and(|current| current.attributes.get(name) == Some(value))
    }

    /// Entity ids in insertion order, optionally limited to one domain
    ///
    /// The ids are collected when this is called; later writes do not show
    /// up in the returned iterator.
    pub fn entity_ids(&self, domain_filter: Option<&str>) -> impl Iterator<Item = String> {
        let domain_filter = domain_filter.map(str::to_lowercase);
        let ids: Vec<String> = self
            .states
            .lock()
            .values()
            .filter(|state| {
                domain_filter
                    .as_deref()
                    .map_or(true, |domain| state.domain() == domain)
            })
            .map(|state| state.entity_id.to_string())
            .collect();
        ids.into_iter()
    }

    /// Snapshot of every state, in insertion order
    pub fn all(&self) -> Vec<Arc<State>> {
        self.states.lock().values().cloned().collect()
    }

    /// Distinct domains that currently have entities
    pub fn domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self
            .states
            .lock()
            .values()
            .map(|state| state.domain().to_string())
            .collect();
        domains.sort();
        domains.dedup();
        domains
    }

    pub fn entity_count(&self) -> usize {
        self.states.lock().len()
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("entities", &self.entity_count())
            .finish_non_exhaustive()
    }
}

fn parse_entity_id(raw: &str) -> StateResult<EntityId> {
    EntityId::normalize(raw).map_err(|source| StateError::InvalidEntityId {
        entity_id: raw.to_string(),
        source,
    })
}
