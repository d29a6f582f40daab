//! Event bus for the hub
//!
//! Listeners register per event type (or for every type with `MATCH_ALL`).
//! Firing never runs a listener inline: each matching listener becomes one
//! job on the pool, prioritised by event type.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ha_core::{events, Event, EventData, EventOrigin, EventType};
use ha_job_pool::{Job, JobPool, JobPriority, PoolError};
use parking_lot::Mutex;
use tracing::{debug, trace};

/// Listener callback; runs on a pool worker
pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Handle for removing a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    callback: Listener,
    once: bool,
}

/// A listener picked for one fired event
struct Target {
    event_type: EventType,
    id: ListenerId,
    callback: Listener,
    once: bool,
}

/// The event bus
pub struct EventBus {
    pool: Arc<JobPool>,
    listeners: Mutex<HashMap<EventType, Vec<Registration>>>,
    next_listener_id: AtomicU64,
}

impl EventBus {
    pub fn new(pool: Arc<JobPool>) -> Self {
        Self {
            pool,
            listeners: Mutex::new(HashMap::new()),
            next_listener_id: AtomicU64::new(1),
        }
    }

    /// The pool listeners run on
    pub fn pool(&self) -> &Arc<JobPool> {
        &self.pool
    }

    /// Whether fired events still reach a running pool
    pub fn is_running(&self) -> bool {
        self.pool.is_running()
    }

    /// Register `callback` for `event_type`
    ///
    /// Registering the same callback twice means it runs twice per event.
    pub fn listen<F>(&self, event_type: impl Into<EventType>, callback: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.register(event_type.into(), Arc::new(callback), false)
    }

    /// Register an already shared callback
    pub fn listen_shared(&self, event_type: impl Into<EventType>, callback: Listener) -> ListenerId {
        self.register(event_type.into(), callback, false)
    }

    /// Register `callback` for the next matching event only
    pub fn listen_once<F>(&self, event_type: impl Into<EventType>, callback: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.register(event_type.into(), Arc::new(callback), true)
    }

    fn register(&self, event_type: EventType, callback: Listener, once: bool) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        trace!(event_type = %event_type, once, "Adding listener");

        self.listeners
            .lock()
            .entry(event_type)
            .or_default()
            .push(Registration { id, callback, once });
        id
    }

    /// Remove a listener; returns whether it was registered
    pub fn remove_listener(&self, event_type: impl Into<EventType>, id: ListenerId) -> bool {
        let event_type = event_type.into();
        let mut listeners = self.listeners.lock();

        let Some(registrations) = listeners.get_mut(&event_type) else {
            return false;
        };
        let before = registrations.len();
        registrations.retain(|registration| registration.id != id);
        let removed = registrations.len() != before;

        if registrations.is_empty() {
            listeners.remove(&event_type);
        }
        removed
    }

    /// Fire a local event
    pub fn fire(
        &self,
        event_type: impl Into<EventType>,
        data: impl Into<EventData>,
    ) -> Result<(), PoolError> {
        self.fire_event(Event::new(event_type, data))
    }

    pub fn fire_with_origin(
        &self,
        event_type: impl Into<EventType>,
        data: impl Into<EventData>,
        origin: EventOrigin,
    ) -> Result<(), PoolError> {
        self.fire_event(Event::new(event_type, data).with_origin(origin))
    }

    /// Schedule every listener matching `event` on the pool
    pub fn fire_event(&self, event: Event) -> Result<(), PoolError> {
        if event.event_type.as_str() == events::TIME_CHANGED {
            trace!(event_type = %event.event_type, "Firing event");
        } else {
            debug!(event_type = %event.event_type, origin = ?event.origin, "Firing event");
        }

        let targets = self.take_targets(&event.event_type)?;
        if targets.is_empty() {
            return Ok(());
        }

        let priority = JobPriority::from_event_type(event.event_type.as_str());
        let event = Arc::new(event);

        let mut pending = targets.into_iter();
        while let Some(target) = pending.next() {
            let callback = Arc::clone(&target.callback);
            let job_event = Arc::clone(&event);
            let description = format!("listener for {}", event.event_type);
            if let Err(err) = self
                .pool
                .add_job(priority, Job::new(description, move || callback(&job_event)))
            {
                self.restore_once(std::iter::once(target).chain(pending));
                return Err(err);
            }
        }

        Ok(())
    }

    // Once-registrations leave the table here, while the lock is held.
    fn take_targets(&self, event_type: &EventType) -> Result<Vec<Target>, PoolError> {
        let mut listeners = self.listeners.lock();
        if !self.pool.is_running() {
            return Err(PoolError::NotRunning);
        }
        let mut targets = Vec::new();

        let mut collect = |key: &EventType| {
            if let Some(registrations) = listeners.get_mut(key) {
                registrations.retain(|registration| {
                    targets.push(Target {
                        event_type: key.clone(),
                        id: registration.id,
                        callback: Arc::clone(&registration.callback),
                        once: registration.once,
                    });
                    !registration.once
                });
                if registrations.is_empty() {
                    listeners.remove(key);
                }
            }
        };

        collect(&EventType::match_all());
        if !event_type.is_match_all() {
            collect(event_type);
        }

        Ok(targets)
    }

    /// Put back once-registrations that were taken but never scheduled
    fn restore_once(&self, unscheduled: impl Iterator<Item = Target>) {
        let mut listeners = self.listeners.lock();
        for target in unscheduled.filter(|target| target.once) {
            listeners
                .entry(target.event_type)
                .or_default()
                .push(Registration {
                    id: target.id,
                    callback: target.callback,
                    once: true,
                });
        }
    }

    /// Listener count per event type
    pub fn listeners(&self) -> HashMap<String, usize> {
        self.listeners
            .lock()
            .iter()
            .map(|(event_type, registrations)| (event_type.to_string(), registrations.len()))
            .collect()
    }

    /// Total number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().values().map(Vec::len).sum()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners())
            .finish_non_exhaustive()
    }
}
