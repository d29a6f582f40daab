//! Condition types
//!
//! Conditions are state-based tests evaluated when a trigger fires.

use std::time::Duration;

use chrono::{DateTime, Datelike, Local, NaiveTime, Utc, Weekday};
use ha_core::{attrs, State};
use ha_state_store::StateStore;
use ha_template::{TemplateEngine, TemplateError};
use ha_util::location::distance;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::automation::{AutomationError, AutomationResult};
use crate::trigger::in_range;

/// Radius assumed for a zone without a `radius` attribute
pub const DEFAULT_ZONE_RADIUS: f64 = 100.0;

/// Condition definition
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "platform", rename_all = "snake_case")]
pub enum Condition {
    /// Check entity state
    State(StateCondition),

    /// Check numeric value thresholds
    NumericState(NumericStateCondition),

    /// Check current local time and weekday
    Time(TimeCondition),

    /// Check zone membership
    Zone(ZoneCondition),

    /// Check that a template renders `true`
    Template(TemplateCondition),
}

/// How multiple conditions combine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionType {
    #[default]
    And,
    Or,
}

impl Condition {
    pub fn validate(&self) -> AutomationResult<()> {
        match self {
            Condition::State(condition) if condition.state.is_none() => Err(
                AutomationError::InvalidConfig("state condition needs `state`".to_string()),
            ),
            Condition::NumericState(condition)
                if condition.above.is_none() && condition.below.is_none() =>
            {
                Err(AutomationError::InvalidConfig(
                    "numeric_state condition needs `above` or `below`".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Evaluate against the current store contents at local time `now`
    pub fn check(
        &self,
        states: &StateStore,
        templates: &TemplateEngine,
        now: DateTime<Local>,
    ) -> bool {
        match self {
            Condition::State(condition) => condition.check(states, now.with_timezone(&Utc)),
            Condition::NumericState(condition) => condition.check(states, templates),
            Condition::Time(condition) => condition.check(now),
            Condition::Zone(condition) => condition.check(states),
            Condition::Template(condition) => check_template(templates, &condition.value_template),
        }
    }
}

/// State condition - check entity state
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StateCondition {
    pub entity_id: String,

    #[serde(default, with = "crate::trigger::option_state_serde")]
    pub state: Option<String>,

    /// How long the state must have been held
    #[serde(default, with = "crate::trigger::option_duration_serde")]
    pub r#for: Option<Duration>,
}

impl StateCondition {
    fn check(&self, states: &StateStore, now: DateTime<Utc>) -> bool {
        let Some(current) = states.get(&self.entity_id) else {
            return false;
        };
        if Some(current.state.as_str()) != self.state.as_deref() {
            return false;
        }
        match self.r#for {
            None => true,
            Some(hold) => (now - current.last_changed)
                .to_std()
                .is_ok_and(|held| held >= hold),
        }
    }
}

/// Numeric state condition - check numeric thresholds
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NumericStateCondition {
    pub entity_id: String,

    /// Attribute to read instead of the state value
    #[serde(default)]
    pub attribute: Option<String>,

    /// Template rendered with `state` bound; wins over `attribute`
    #[serde(default)]
    pub value_template: Option<String>,

    #[serde(default)]
    pub above: Option<f64>,

    #[serde(default)]
    pub below: Option<f64>,
}

impl NumericStateCondition {
    fn check(&self, states: &StateStore, templates: &TemplateEngine) -> bool {
        let value = states.get(&self.entity_id).and_then(|state| {
            numeric_value(
                templates,
                &state,
                self.attribute.as_deref(),
                self.value_template.as_deref(),
            )
        });
        in_range(value, self.above, self.below)
    }
}

/// Template condition - passes when the template renders `true`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TemplateCondition {
    pub value_template: String,
}

/// Time condition - check current local time
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimeCondition {
    /// Must be at or after this time
    #[serde(default, with = "crate::trigger::option_time_serde")]
    pub after: Option<NaiveTime>,

    /// Must be at or before this time
    #[serde(default, with = "crate::trigger::option_time_serde")]
    pub before: Option<NaiveTime>,

    /// Only on these weekdays
    #[serde(default, deserialize_with = "crate::trigger::one_or_many::deserialize")]
    pub weekday: Vec<WeekdaySpec>,
}

impl TimeCondition {
    fn check(&self, now: DateTime<Local>) -> bool {
        let time = now.time();
        if self.before.is_some_and(|before| time > before) {
            return false;
        }
        if self.after.is_some_and(|after| time < after) {
            return false;
        }
        self.weekday.is_empty()
            || self
                .weekday
                .iter()
                .any(|day| Weekday::from(*day) == now.weekday())
    }
}

/// Zone condition - check entity location
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ZoneCondition {
    /// Entity carrying `latitude`/`longitude`
    pub entity_id: String,

    /// Zone entity
    pub zone: String,
}

impl ZoneCondition {
    fn check(&self, states: &StateStore) -> bool {
        match (states.get(&self.zone), states.get(&self.entity_id)) {
            (Some(zone), Some(state)) => in_zone(&zone, &state),
            _ => false,
        }
    }
}

/// Weekday specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekdaySpec {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl From<WeekdaySpec> for Weekday {
    fn from(w: WeekdaySpec) -> Self {
        match w {
            WeekdaySpec::Mon => Weekday::Mon,
            WeekdaySpec::Tue => Weekday::Tue,
            WeekdaySpec::Wed => Weekday::Wed,
            WeekdaySpec::Thu => Weekday::Thu,
            WeekdaySpec::Fri => Weekday::Fri,
            WeekdaySpec::Sat => Weekday::Sat,
            WeekdaySpec::Sun => Weekday::Sun,
        }
    }
}

// --- Shared with triggers ---

/// The number a state represents
///
/// A `value_template` rendered against the state comes first, then a named
/// attribute, then the state value itself.
pub(crate) fn numeric_value(
    templates: &TemplateEngine,
    state: &State,
    attribute: Option<&str>,
    value_template: Option<&str>,
) -> Option<f64> {
    if let Some(template) = value_template {
        return match templates.render_with_state(template, state) {
            Ok(rendered) => rendered.trim().parse().ok(),
            Err(err) => {
                warn!(entity_id = %state.entity_id, %err, "Failed to render value_template");
                None
            }
        };
    }
    match attribute {
        Some(name) => match state.attributes.get(name)? {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        },
        None => state.state.trim().parse().ok(),
    }
}

/// Whether `template` renders to `true`, ignoring case
///
/// Render failures count as false. An undefined lookup is common while
/// entities are still appearing, so it only warns.
pub(crate) fn check_template(templates: &TemplateEngine, template: &str) -> bool {
    match templates.render(template) {
        Ok(rendered) => rendered.trim().eq_ignore_ascii_case("true"),
        Err(err @ TemplateError::UndefinedVariable { .. }) => {
            warn!(%err, "Template condition failed");
            false
        }
        Err(err) => {
            error!(%err, "Template condition failed");
            false
        }
    }
}

pub(crate) fn location(state: &State) -> Option<(f64, f64)> {
    Some((
        state.attribute::<f64>(attrs::LATITUDE)?,
        state.attribute::<f64>(attrs::LONGITUDE)?,
    ))
}

/// Whether `state`'s location, widened by its GPS accuracy, reaches into `zone`
pub(crate) fn in_zone(zone: &State, state: &State) -> bool {
    let (Some((lat, lon)), Some((zone_lat, zone_lon))) = (location(state), location(zone)) else {
        return false;
    };
    let radius = zone
        .attribute::<f64>(attrs::RADIUS)
        .unwrap_or(DEFAULT_ZONE_RADIUS);
    let accuracy = state.attribute::<f64>(attrs::GPS_ACCURACY).unwrap_or(0.0);

    distance(lat, lon, zone_lat, zone_lon) - accuracy < radius
}
