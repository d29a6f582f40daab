//! Trigger types
//!
//! A trigger watches the bus and starts its automation when it matches.
//! Every trigger is one `platform` entry in the automation config.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{NaiveTime, Timelike, Utc};
use ha_core::{events, Event, State};
use ha_hub::track::{
    track_event, track_point_in_utc_time, track_state_change, track_time_change, TimePattern,
    Tracker,
};
use ha_hub::HomeAssistant;
use parking_lot::Mutex;
use serde::Deserialize;
use ha_template::TemplateEngine;
use serde_json::{Map, Value};
use tracing::debug;

use crate::automation::{AutomationError, AutomationResult, Rule};
use crate::condition::{check_template, in_zone, location, numeric_value};

/// Trigger definition
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "platform", rename_all = "snake_case")]
pub enum Trigger {
    /// Fires on an event type, optionally filtered by payload
    Event(EventTrigger),

    /// Fires when an entity's state changes
    State(StateTrigger),

    /// Fires when a numeric value crosses into a range
    NumericState(NumericStateTrigger),

    /// Fires at a local time of day or on a time pattern
    Time(TimeTrigger),

    /// Fires when an entity enters or leaves a zone
    Zone(ZoneTrigger),

    /// Fires when a template starts rendering `true`
    Template(TemplateTrigger),
}

impl Trigger {
    /// Get the trigger platform name
    pub fn platform(&self) -> &'static str {
        match self {
            Trigger::Event(_) => "event",
            Trigger::State(_) => "state",
            Trigger::NumericState(_) => "numeric_state",
            Trigger::Time(_) => "time",
            Trigger::Zone(_) => "zone",
            Trigger::Template(_) => "template",
        }
    }

    /// Reject combinations serde alone cannot catch
    pub fn validate(&self) -> AutomationResult<()> {
        match self {
            Trigger::State(trigger) => {
                if trigger.r#for.is_some() && trigger.target().is_none() {
                    return Err(invalid("state trigger with `for` needs `to`"));
                }
            }
            Trigger::NumericState(trigger) => {
                if trigger.above.is_none() && trigger.below.is_none() {
                    return Err(invalid("numeric_state trigger needs `above` or `below`"));
                }
            }
            Trigger::Event(_) | Trigger::Time(_) | Trigger::Zone(_) | Trigger::Template(_) => {}
        }
        Ok(())
    }

    /// Register the listeners that run `rule` when this trigger matches
    pub(crate) fn attach(&self, hass: &Arc<HomeAssistant>, rule: &Arc<Rule>) -> Tracker {
        let platform = self.platform();
        let bus = hass.bus();

        match self {
            Trigger::Event(trigger) => {
                let trigger = trigger.clone();
                let rule = Arc::clone(rule);
                let event_type = trigger.event_type.clone();
                track_event(bus, event_type, move |event| {
                    if trigger.matches(event) {
                        rule.trigger(platform);
                    }
                })
            }

            Trigger::State(trigger) => {
                let rule = Arc::clone(rule);
                let hub_ref = Arc::downgrade(hass);
                let target = trigger.target().map(str::to_string);
                let hold = trigger.r#for;

                track_state_change(
                    bus,
                    trigger.entity_id.ids(),
                    trigger.from.as_deref(),
                    trigger.target(),
                    move |entity_id, _old, _new| match hold {
                        None => rule.trigger(platform),
                        Some(hold) => hold_then_trigger(
                            &hub_ref,
                            &rule,
                            entity_id.to_string(),
                            target.clone(),
                            hold,
                        ),
                    },
                )
            }

            Trigger::NumericState(trigger) => {
                let trigger = trigger.clone();
                let rule = Arc::clone(rule);
                let entity_ids = trigger.entity_id.ids();

                track_state_change(bus, entity_ids, None, None, move |_, old, new| {
                    if trigger.crossed_into_range(rule.templates(), old, new) {
                        rule.trigger(platform);
                    }
                })
            }

            Trigger::Time(trigger) => {
                let rule = Arc::clone(rule);
                track_time_change(bus, trigger.pattern(), move |_| rule.trigger(platform))
            }

            Trigger::Zone(trigger) => {
                let trigger = trigger.clone();
                let rule = Arc::clone(rule);
                let hub_ref = Arc::downgrade(hass);
                let entity_ids = trigger.entity_id.ids();

                track_state_change(bus, entity_ids, None, None, move |_, old, new| {
                    let Some(hass) = hub_ref.upgrade() else {
                        return;
                    };
                    let zone = hass.states().get(&trigger.zone);
                    if trigger.matches(zone.as_deref(), old, new) {
                        rule.trigger(platform);
                    }
                })
            }

            Trigger::Template(trigger) => {
                let template = trigger.value_template.clone();
                let rule = Arc::clone(rule);
                let already_triggered = Mutex::new(false);

                track_event(bus, events::STATE_CHANGED, move |_| {
                    let matched = check_template(rule.templates(), &template);
                    let mut latched = already_triggered.lock();
                    if !matched {
                        *latched = false;
                    } else if !*latched {
                        *latched = true;
                        drop(latched);
                        rule.trigger(platform);
                    }
                })
            }
        }
    }
}

/// Listeners waiting for a state to be held long enough
struct PendingHold {
    timer: Tracker,
    cancel: Tracker,
}

/// Run `rule` once `entity_id` has kept `target` for `hold`
///
/// Any change to a different state before then drops the wait.
fn hold_then_trigger(
    hub_ref: &Weak<HomeAssistant>,
    rule: &Arc<Rule>,
    entity_id: String,
    target: Option<String>,
    hold: Duration,
) {
    let Some(hass) = hub_ref.upgrade() else {
        return;
    };
    let Ok(hold_for) = chrono::Duration::from_std(hold) else {
        return;
    };
    let bus = hass.bus();
    let pending: Arc<Mutex<Option<PendingHold>>> = Arc::new(Mutex::new(None));

    // held while both listeners register so neither can run before they are stored
    let mut slot = pending.lock();

    let timer = {
        let pending = Arc::clone(&pending);
        let bus_ref = Arc::downgrade(bus);
        let rule = Arc::clone(rule);
        track_point_in_utc_time(bus, Utc::now() + hold_for, move |_| {
            let Some(waiting) = pending.lock().take() else {
                return;
            };
            if let Some(bus) = bus_ref.upgrade() {
                waiting.cancel.cancel(&bus);
            }
            rule.trigger("state");
        })
    };

    let cancel = {
        let pending = Arc::clone(&pending);
        let bus_ref = Arc::downgrade(bus);
        track_state_change(bus, [entity_id.as_str()], None, None, move |entity_id, _, new| {
            if new.map(|state| state.state.as_str()) == target.as_deref() {
                return;
            }
            let Some(waiting) = pending.lock().take() else {
                return;
            };
            debug!(%entity_id, "State left target before hold elapsed");
            if let Some(bus) = bus_ref.upgrade() {
                waiting.timer.cancel(&bus);
                waiting.cancel.cancel(&bus);
            }
        })
    };

    *slot = Some(PendingHold { timer, cancel });
}

/// Event trigger
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventTrigger {
    /// Event type to match
    pub event_type: String,

    /// Key/value pairs the event payload must contain
    #[serde(default)]
    pub event_data: Option<Map<String, Value>>,
}

impl EventTrigger {
    pub fn matches(&self, event: &Event) -> bool {
        match &self.event_data {
            None => true,
            Some(expected) => expected
                .iter()
                .all(|(key, value)| event.data.get(key).as_ref() == Some(value)),
        }
    }
}

/// State change trigger
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StateTrigger {
    /// Entity IDs to monitor (can be single or list)
    pub entity_id: EntityIdSpec,

    /// Previous state to match (optional)
    #[serde(default, with = "option_state_serde")]
    pub from: Option<String>,

    /// New state to match (optional)
    #[serde(default, with = "option_state_serde")]
    pub to: Option<String>,

    /// Same as `to`
    #[serde(default, with = "option_state_serde")]
    pub state: Option<String>,

    /// Duration the new state must be held before triggering
    #[serde(default, with = "option_duration_serde")]
    pub r#for: Option<Duration>,
}

impl StateTrigger {
    /// The state to trigger on, from `to` or its `state` alias
    pub fn target(&self) -> Option<&str> {
        self.to.as_deref().or(self.state.as_deref())
    }
}

/// Numeric state trigger
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NumericStateTrigger {
    /// Entity IDs to monitor
    pub entity_id: EntityIdSpec,

    /// Attribute to read instead of the state value
    #[serde(default)]
    pub attribute: Option<String>,

    /// Template rendered with `state` bound; wins over `attribute`
    #[serde(default)]
    pub value_template: Option<String>,

    /// Value must be strictly above this
    #[serde(default)]
    pub above: Option<f64>,

    /// Value must be strictly below this
    #[serde(default)]
    pub below: Option<f64>,
}

impl NumericStateTrigger {
    pub fn in_range(&self, templates: &TemplateEngine, state: Option<&State>) -> bool {
        let value = state.and_then(|state| {
            numeric_value(
                templates,
                state,
                self.attribute.as_deref(),
                self.value_template.as_deref(),
            )
        });
        in_range(value, self.above, self.below)
    }

    /// Only the move from outside the range to inside it counts
    pub fn crossed_into_range(
        &self,
        templates: &TemplateEngine,
        old: Option<&State>,
        new: Option<&State>,
    ) -> bool {
        new.is_some()
            && self.in_range(templates, new)
            && (old.is_none() || !self.in_range(templates, old))
    }
}

pub(crate) fn in_range(value: Option<f64>, above: Option<f64>, below: Option<f64>) -> bool {
    let Some(value) = value else {
        return false;
    };
    above.map_or(true, |above| value > above) && below.map_or(true, |below| value < below)
}

/// Time trigger
///
/// `after` fires once a day at that local time; otherwise `hours`,
/// `minutes` and `seconds` form a pattern where a missing field matches
/// any value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimeTrigger {
    #[serde(default, with = "option_time_serde")]
    pub after: Option<NaiveTime>,

    #[serde(default)]
    pub hours: Option<u32>,

    #[serde(default)]
    pub minutes: Option<u32>,

    #[serde(default)]
    pub seconds: Option<u32>,
}

impl TimeTrigger {
    pub fn pattern(&self) -> TimePattern {
        match self.after {
            Some(after) => TimePattern::new()
                .hour(after.hour())
                .minute(after.minute())
                .second(after.second()),
            None => TimePattern::new()
                .hour(self.hours)
                .minute(self.minutes)
                .second(self.seconds),
        }
    }
}

/// Zone trigger
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ZoneTrigger {
    /// Tracked entity carrying `latitude`/`longitude`
    pub entity_id: EntityIdSpec,

    /// Zone entity
    pub zone: String,

    /// Event type: enter or leave
    #[serde(default)]
    pub event: ZoneEvent,
}

impl ZoneTrigger {
    pub fn matches(&self, zone: Option<&State>, old: Option<&State>, new: Option<&State>) -> bool {
        let (Some(zone), Some(new)) = (zone, new) else {
            return false;
        };
        if location(new).is_none() || old.is_some_and(|old| location(old).is_none()) {
            return false;
        }

        let was_inside = old.is_some_and(|old| in_zone(zone, old));
        let is_inside = in_zone(zone, new);

        match self.event {
            ZoneEvent::Enter => !was_inside && is_inside,
            ZoneEvent::Leave => was_inside && !is_inside,
        }
    }
}

/// Template trigger
///
/// Fires on the state change that turns the template `true`, then stays
/// quiet until a render comes out false again.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TemplateTrigger {
    pub value_template: String,
}

// --- Supporting types ---

/// Entity ID specification (single or list)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EntityIdSpec {
    Single(String),
    List(Vec<String>),
}

impl EntityIdSpec {
    /// Get all entity IDs; a single string may hold a comma separated list
    pub fn ids(&self) -> Vec<String> {
        match self {
            EntityIdSpec::Single(ids) => ids
                .split(',')
                .map(|id| id.trim().to_lowercase())
                .filter(|id| !id.is_empty())
                .collect(),
            EntityIdSpec::List(ids) => ids.iter().map(|id| id.trim().to_lowercase()).collect(),
        }
    }
}

/// Zone event type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneEvent {
    #[default]
    Enter,
    Leave,
}

fn invalid(reason: &str) -> AutomationError {
    AutomationError::InvalidConfig(reason.to_string())
}

// --- Serde helpers ---

/// A single item or a list of items
pub(crate) mod one_or_many {
    use serde::de::{DeserializeOwned, Error};
    use serde::{Deserialize, Deserializer};
    use serde_yaml::Value;

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Vec::new()),
            Value::Sequence(items) => items
                .into_iter()
                .map(|item| serde_yaml::from_value(item).map_err(D::Error::custom))
                .collect(),
            item => Ok(vec![serde_yaml::from_value(item).map_err(D::Error::custom)?]),
        }
    }
}

/// State values: strings or numbers, never booleans
pub(crate) mod option_state_serde {
    use serde::de::{self, Deserializer, Visitor};
    use std::fmt;

    struct StateVisitor;

    impl<'de> Visitor<'de> for StateVisitor {
        type Value = Option<String>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a state string")
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            d.deserialize_any(StateVisitor)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(StateVisitor)
    }
}

/// Local time of day as `HH:MM` or `HH:MM:SS`
pub(crate) mod option_time_serde {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        match opt {
            None => Ok(None),
            Some(s) => parse_time(&s).map(Some).map_err(serde::de::Error::custom),
        }
    }

    pub(crate) fn parse_time(s: &str) -> Result<NaiveTime, String> {
        NaiveTime::parse_from_str(s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
            .map_err(|_| format!("invalid time of day: {s}"))
    }
}

/// Durations as `{hours, minutes, seconds}`, `HH:MM:SS` or whole seconds
pub(crate) mod option_duration_serde {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Parts {
        #[serde(default)]
        days: Option<u64>,
        #[serde(default)]
        hours: Option<u64>,
        #[serde(default)]
        minutes: Option<u64>,
        #[serde(default)]
        seconds: Option<u64>,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
        Parts(Parts),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<Raw> = Option::deserialize(deserializer)
            .map_err(|_| serde::de::Error::custom("invalid duration"))?;
        match raw {
            None => Ok(None),
            Some(Raw::Seconds(secs)) => Ok(Some(Duration::from_secs(secs))),
            Some(Raw::Text(s)) => parse_duration(&s)
                .map(Some)
                .map_err(serde::de::Error::custom),
            Some(Raw::Parts(parts)) => from_parts(&parts)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }

    fn from_parts(parts: &Parts) -> Result<Duration, &'static str> {
        if parts.days.is_none()
            && parts.hours.is_none()
            && parts.minutes.is_none()
            && parts.seconds.is_none()
        {
            return Err("duration needs days, hours, minutes or seconds");
        }
        let secs = parts.days.unwrap_or(0) * 86_400
            + parts.hours.unwrap_or(0) * 3600
            + parts.minutes.unwrap_or(0) * 60
            + parts.seconds.unwrap_or(0);
        Ok(Duration::from_secs(secs))
    }

    fn parse_duration(s: &str) -> Result<Duration, String> {
        // Parse HH:MM:SS or MM:SS or SS format
        let parts: Vec<&str> = s.split(':').collect();
        let field = |part: &str, name: &str| -> Result<u64, String> {
            part.trim().parse().map_err(|_| format!("invalid {name}"))
        };
        match parts.as_slice() {
            [secs] => Ok(Duration::from_secs(field(secs, "seconds")?)),
            [mins, secs] => Ok(Duration::from_secs(
                field(mins, "minutes")? * 60 + field(secs, "seconds")?,
            )),
            [hours, mins, secs] => Ok(Duration::from_secs(
                field(hours, "hours")? * 3600 + field(mins, "minutes")? * 60 + field(secs, "seconds")?,
            )),
            _ => Err("invalid duration format".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ha_core::{Attributes, EntityId};
    use ha_template::create_test_engine;
    use serde_json::json;

    fn parse(yaml: &str) -> Result<Trigger, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    fn state(value: &str, attributes: Value) -> State {
        let attributes: Attributes = serde_json::from_value(attributes).unwrap();
        State::new(EntityId::normalize("test.entity").unwrap(), value, attributes)
    }

    #[test]
    fn test_state_trigger_deserialize() {
        let trigger = parse("platform: state\nentity_id: light.living_room\nto: 'on'\n").unwrap();
        assert_eq!(trigger.platform(), "state");
        let Trigger::State(state) = trigger else {
            panic!("Expected state trigger");
        };
        assert_eq!(state.target(), Some("on"));
        assert_eq!(state.from, None);
    }

    #[test]
    fn test_state_alias_and_numbers() {
        let Trigger::State(trigger) = parse("platform: state\nentity_id: a.b\nstate: 5\n").unwrap()
        else {
            panic!("Expected state trigger");
        };
        assert_eq!(trigger.target(), Some("5"));
    }

    #[test]
    fn test_boolean_states_rejected() {
        assert!(parse("platform: state\nentity_id: a.b\nto: true\n").is_err());
        assert!(parse("platform: state\nentity_id: a.b\nfrom: true\n").is_err());
    }

    #[test]
    fn test_for_formats() {
        let mapping = parse("platform: state\nentity_id: a.b\nto: x\nfor: {seconds: 5}\n").unwrap();
        let text = parse("platform: state\nentity_id: a.b\nto: x\nfor: '00:01:05'\n").unwrap();
        let number = parse("platform: state\nentity_id: a.b\nto: x\nfor: 7\n").unwrap();

        let hold = |trigger: Trigger| match trigger {
            Trigger::State(state) => state.r#for,
            _ => None,
        };
        assert_eq!(hold(mapping), Some(Duration::from_secs(5)));
        assert_eq!(hold(text), Some(Duration::from_secs(65)));
        assert_eq!(hold(number), Some(Duration::from_secs(7)));

        assert!(parse("platform: state\nentity_id: a.b\nto: x\nfor: {invalid: 5}\n").is_err());
        assert!(parse("platform: state\nentity_id: a.b\nto: x\nfor: {}\n").is_err());
    }

    #[test]
    fn test_for_without_to_invalid() {
        let trigger = parse("platform: state\nentity_id: a.b\nfor: {seconds: 5}\n").unwrap();
        assert!(trigger.validate().is_err());
    }

    #[test]
    fn test_numeric_state_needs_bound() {
        let trigger = parse("platform: numeric_state\nentity_id: a.b\n").unwrap();
        assert!(trigger.validate().is_err());
    }

    #[test]
    fn test_numeric_crossing() {
        let Trigger::NumericState(trigger) =
            parse("platform: numeric_state\nentity_id: test.entity\nbelow: 10\nabove: 5\n").unwrap()
        else {
            panic!("Expected numeric_state trigger");
        };

        let eleven = state("11", json!({}));
        let nine = state("9", json!({}));
        let eight = state("8", json!({}));
        let four = state("4", json!({}));
        let text = state("entity", json!({}));

        let engine = create_test_engine();
        let crossed = |old, new| trigger.crossed_into_range(&engine, old, new);

        assert!(crossed(None, Some(&nine)));
        assert!(crossed(Some(&eleven), Some(&nine)));
        assert!(crossed(Some(&text), Some(&nine)));
        assert!(!crossed(Some(&nine), Some(&eight)));
        assert!(!crossed(Some(&eleven), Some(&four)));
        assert!(!crossed(Some(&nine), None));
    }

    #[test]
    fn test_numeric_attribute() {
        let Trigger::NumericState(trigger) = parse(
            "platform: numeric_state\nentity_id: test.entity\nattribute: test_attribute\nbelow: 10\n",
        )
        .unwrap() else {
            panic!("Expected numeric_state trigger");
        };

        let engine = create_test_engine();
        let in_range = |state: State| trigger.in_range(&engine, Some(&state));

        assert!(in_range(state("entity", json!({"test_attribute": 9}))));
        assert!(in_range(state("entity", json!({"test_attribute": "9.5"}))));
        assert!(!in_range(state("9", json!({"test_attribute": 11}))));
        assert!(!in_range(state("9", json!({}))));
    }

    #[test]
    fn test_template_trigger_deserialize() {
        let trigger =
            parse("platform: template\nvalue_template: \"{{ is_state('a.b', 'on') }}\"\n")
                .unwrap();
        assert_eq!(trigger.platform(), "template");
        assert!(trigger.validate().is_ok());
        assert!(parse("platform: template\n").is_err());

        let Trigger::NumericState(numeric) = parse(
            "platform: numeric_state\nentity_id: a.b\nvalue_template: '{{ state.state }}'\nbelow: 1\n",
        )
        .unwrap() else {
            panic!("Expected numeric_state trigger");
        };
        assert_eq!(numeric.value_template.as_deref(), Some("{{ state.state }}"));
    }

    #[test]
    fn test_event_data_subset() {
        let Trigger::Event(trigger) =
            parse("platform: event\nevent_type: test_event\nevent_data: {some_attr: some_value}\n")
                .unwrap()
        else {
            panic!("Expected event trigger");
        };

        let matching = Event::new("test_event", json!({"some_attr": "some_value", "other": 1}));
        let different = Event::new("test_event", json!({"some_attr": "other_value"}));
        let empty = Event::new("test_event", Value::Null);
        assert!(trigger.matches(&matching));
        assert!(!trigger.matches(&different));
        assert!(!trigger.matches(&empty));
    }

    #[test]
    fn test_time_trigger_pattern() {
        let Trigger::Time(after) = parse("platform: time\nafter: '05:00'\n").unwrap() else {
            panic!("Expected time trigger");
        };
        assert_eq!(after.pattern(), TimePattern::new().hour(5).minute(0).second(0));

        let Trigger::Time(pattern) = parse("platform: time\nminutes: 30\n").unwrap() else {
            panic!("Expected time trigger");
        };
        assert_eq!(pattern.pattern(), TimePattern::new().minute(30));

        assert!(parse("platform: time\nafter: 'noon'\n").is_err());
    }

    #[test]
    fn test_entity_id_spec() {
        let single: EntityIdSpec = serde_yaml::from_str("Light.Test").unwrap();
        assert_eq!(single.ids(), vec!["light.test"]);

        let csv: EntityIdSpec = serde_yaml::from_str("'light.one, light.two'").unwrap();
        assert_eq!(csv.ids(), vec!["light.one", "light.two"]);

        let list: EntityIdSpec = serde_yaml::from_str("[light.one, light.two]").unwrap();
        assert_eq!(list.ids(), vec!["light.one", "light.two"]);
    }

    #[test]
    fn test_unknown_platform() {
        assert!(parse("platform: sun\nevent: sunset\n").is_err());
    }
}
