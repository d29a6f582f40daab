//! Helpers that narrow bus events down to the changes a caller cares about
//!
//! Each helper registers one bus listener and hands back a [`Tracker`] that
//! detaches it again.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Utc};
use ha_core::{events, EntityId, Event, EventType, State, MATCH_ALL};
use ha_event_bus::{EventBus, ListenerId};

/// A listener registered by one of the tracking helpers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tracker {
    event_type: EventType,
    id: ListenerId,
}

impl Tracker {
    fn new(event_type: impl Into<EventType>, id: ListenerId) -> Self {
        Self {
            event_type: event_type.into(),
            id,
        }
    }

    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Detach the listener; returns whether it was still attached
    pub fn cancel(&self, bus: &EventBus) -> bool {
        bus.remove_listener(&self.event_type, self.id)
    }
}

/// Call `action` for every event of `event_type`
pub fn track_event<F>(bus: &EventBus, event_type: impl Into<EventType>, action: F) -> Tracker
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    let event_type = event_type.into();
    let id = bus.listen(&event_type, action);
    Tracker::new(event_type, id)
}

/// Call `action` when one of `entity_ids` changes from `from` to `to`
///
/// `MATCH_ALL` in `entity_ids` tracks every entity. `None` (or `MATCH_ALL`)
/// for `from`/`to` accepts any state, including a missing one.
pub fn track_state_change<I, S, F>(
    bus: &EventBus,
    entity_ids: I,
    from: Option<&str>,
    to: Option<&str>,
    action: F,
) -> Tracker
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    F: Fn(&EntityId, Option<&State>, Option<&State>) + Send + Sync + 'static,
{
    let entity_ids: HashSet<String> = entity_ids
        .into_iter()
        .map(|id| id.as_ref().to_lowercase())
        .collect();
    let entity_ids = (!entity_ids.contains(MATCH_ALL)).then_some(entity_ids);
    let from = state_pattern(from);
    let to = state_pattern(to);

    let id = bus.listen(events::STATE_CHANGED, move |event| {
        let Some(data) = event.data.as_state_changed() else {
            return;
        };
        if let Some(entity_ids) = &entity_ids {
            if !entity_ids.contains(&data.entity_id.to_string()) {
                return;
            }
        }

        let old_state = data.old_state.as_deref();
        let new_state = data.new_state.as_deref();
        if state_matches(old_state, from.as_deref()) && state_matches(new_state, to.as_deref()) {
            action(&data.entity_id, old_state, new_state);
        }
    });

    Tracker::new(events::STATE_CHANGED, id)
}

fn state_pattern(pattern: Option<&str>) -> Option<String> {
    pattern
        .filter(|pattern| *pattern != MATCH_ALL)
        .map(str::to_string)
}

fn state_matches(state: Option<&State>, pattern: Option<&str>) -> bool {
    match pattern {
        None => true,
        Some(pattern) => state.is_some_and(|state| state.state == pattern),
    }
}

/// Call `action` once, on the first `time_changed` at or after `point`
pub fn track_point_in_utc_time<F>(bus: &Arc<EventBus>, point: DateTime<Utc>, action: F) -> Tracker
where
    F: Fn(DateTime<Utc>) + Send + Sync + 'static,
{
    let fired = Arc::new(AtomicBool::new(false));
    let registered: Arc<OnceLock<ListenerId>> = Arc::new(OnceLock::new());

    let id = {
        let fired = Arc::clone(&fired);
        let registered = Arc::clone(&registered);
        let bus_ref = Arc::downgrade(bus);

        bus.listen(events::TIME_CHANGED, move |event| {
            let Some(time) = event.data.as_time_changed() else {
                return;
            };
            if time.now < point || fired.swap(true, Ordering::SeqCst) {
                return;
            }

            if let (Some(bus), Some(id)) = (bus_ref.upgrade(), registered.get()) {
                bus.remove_listener(events::TIME_CHANGED, *id);
            }
            action(time.now);
        })
    };

    let _ = registered.set(id);
    // fired before the id was known
    if fired.load(Ordering::SeqCst) {
        bus.remove_listener(events::TIME_CHANGED, id);
    }

    Tracker::new(events::TIME_CHANGED, id)
}

/// Matcher for one field of a timestamp
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TimeMatch {
    #[default]
    Any,
    Exact(u32),
    OneOf(Vec<u32>),
}

impl TimeMatch {
    pub fn matches(&self, value: u32) -> bool {
        match self {
            TimeMatch::Any => true,
            TimeMatch::Exact(expected) => *expected == value,
            TimeMatch::OneOf(allowed) => allowed.contains(&value),
        }
    }
}

impl From<u32> for TimeMatch {
    fn from(value: u32) -> Self {
        TimeMatch::Exact(value)
    }
}

impl From<Option<u32>> for TimeMatch {
    fn from(value: Option<u32>) -> Self {
        value.map_or(TimeMatch::Any, TimeMatch::Exact)
    }
}

impl From<Vec<u32>> for TimeMatch {
    fn from(values: Vec<u32>) -> Self {
        TimeMatch::OneOf(values)
    }
}

/// Calendar/clock pattern; unset fields match anything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimePattern {
    pub year: TimeMatch,
    pub month: TimeMatch,
    pub day: TimeMatch,
    pub hour: TimeMatch,
    pub minute: TimeMatch,
    pub second: TimeMatch,
}

impl TimePattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn year(mut self, year: impl Into<TimeMatch>) -> Self {
        self.year = year.into();
        self
    }

    pub fn month(mut self, month: impl Into<TimeMatch>) -> Self {
        self.month = month.into();
        self
    }

    pub fn day(mut self, day: impl Into<TimeMatch>) -> Self {
        self.day = day.into();
        self
    }

    pub fn hour(mut self, hour: impl Into<TimeMatch>) -> Self {
        self.hour = hour.into();
        self
    }

    pub fn minute(mut self, minute: impl Into<TimeMatch>) -> Self {
        self.minute = minute.into();
        self
    }

    pub fn second(mut self, second: impl Into<TimeMatch>) -> Self {
        self.second = second.into();
        self
    }

    pub fn matches<Tz: TimeZone>(&self, time: &DateTime<Tz>) -> bool {
        u32::try_from(time.year()).is_ok_and(|year| self.year.matches(year))
            && self.month.matches(time.month())
            && self.day.matches(time.day())
            && self.hour.matches(time.hour())
            && self.minute.matches(time.minute())
            && self.second.matches(time.second())
    }
}

/// Call `action` on every `time_changed` whose UTC time matches `pattern`
pub fn track_utc_time_change<F>(bus: &EventBus, pattern: TimePattern, action: F) -> Tracker
where
    F: Fn(DateTime<Utc>) + Send + Sync + 'static,
{
    track_time_pattern(bus, pattern, false, action)
}

/// Like [`track_utc_time_change`], matching against local time
pub fn track_time_change<F>(bus: &EventBus, pattern: TimePattern, action: F) -> Tracker
where
    F: Fn(DateTime<Utc>) + Send + Sync + 'static,
{
    track_time_pattern(bus, pattern, true, action)
}

fn track_time_pattern<F>(bus: &EventBus, pattern: TimePattern, local: bool, action: F) -> Tracker
where
    F: Fn(DateTime<Utc>) + Send + Sync + 'static,
{
    let id = bus.listen(events::TIME_CHANGED, move |event| {
        let Some(time) = event.data.as_time_changed() else {
            return;
        };
        let matched = if local {
            pattern.matches(&time.now.with_timezone(&Local))
        } else {
            pattern.matches(&time.now)
        };
        if matched {
            action(time.now);
        }
    });

    Tracker::new(events::TIME_CHANGED, id)
}
