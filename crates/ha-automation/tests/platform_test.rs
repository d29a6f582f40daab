//! Trigger and condition platforms running against a real hub
//!
//! Each test registers a `test.automation` service that records its calls,
//! sets up automations from YAML and drives them through the state store and
//! bus.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{Datelike, Local, TimeZone, Utc};
use ha_automation::{setup, Automation};
use ha_config::CoreConfig;
use ha_core::{events, Attributes, ServiceCall, TimeChangedData};
use ha_hub::HomeAssistant;
use parking_lot::Mutex;
use serde_json::{json, Value};

struct Fixture {
    hass: Arc<HomeAssistant>,
    calls: Arc<Mutex<Vec<ServiceCall>>>,
}

impl Fixture {
    fn new() -> Self {
        let hass = HomeAssistant::new(CoreConfig::default()).unwrap();
        let calls = Arc::new(Mutex::new(Vec::new()));
        {
            let calls = Arc::clone(&calls);
            hass.services()
                .register(
                    "test",
                    "automation",
                    move |call| {
                        calls.lock().push(call.clone());
                        Ok(())
                    },
                    None,
                )
                .unwrap();
        }
        hass.states().set("test.entity", "hello", None).unwrap();
        hass.block_till_done();
        Self { hass, calls }
    }

    fn setup(&self, yaml: &str) -> Vec<Automation> {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        let configs = match value {
            serde_yaml::Value::Sequence(items) => items,
            single => vec![single],
        };
        let automations = setup(&self.hass, &configs);
        assert_eq!(automations.len(), configs.len(), "every rule should load");
        automations
    }

    fn set(&self, entity_id: &str, state: &str) {
        self.hass.states().set(entity_id, state, None).unwrap();
        self.hass.block_till_done();
    }

    fn set_with(&self, entity_id: &str, state: &str, attributes: Value) {
        let attributes: Attributes = serde_json::from_value(attributes).unwrap();
        self.hass
            .states()
            .set(entity_id, state, Some(attributes))
            .unwrap();
        self.hass.block_till_done();
    }

    fn fire(&self, event_type: &str, data: Value) {
        self.hass.bus().fire(event_type, data).unwrap();
        self.hass.block_till_done();
    }

    fn fire_time(&self, now: chrono::DateTime<Utc>) {
        self.hass
            .bus()
            .fire(events::TIME_CHANGED, TimeChangedData { now })
            .unwrap();
        self.hass.block_till_done();
    }

    fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        self.hass.stop();
    }
}

const STATE_ACTION: &str = "action:\n  service: test.automation\n";

fn state_rule(trigger: &str) -> String {
    format!("trigger:\n  platform: state\n  entity_id: test.entity\n{trigger}{STATE_ACTION}")
}

fn numeric_rule(bounds: &str) -> String {
    format!("trigger:\n  platform: numeric_state\n  entity_id: test.entity\n{bounds}{STATE_ACTION}")
}

// ==================== Event platform ====================

#[test]
fn test_event_fires() {
    let f = Fixture::new();
    f.setup("trigger:\n  platform: event\n  event_type: test_event\naction:\n  service: test.automation\n");

    f.fire("test_event", Value::Null);
    assert_eq!(f.call_count(), 1);
}

#[test]
fn test_event_data_filter() {
    let f = Fixture::new();
    f.setup(
        r#"
trigger:
  platform: event
  event_type: test_event
  event_data:
    some_attr: some_value
action:
  service: test.automation
"#,
    );

    f.fire("test_event", json!({"some_attr": "some_value", "another": "value"}));
    assert_eq!(f.call_count(), 1);

    f.fire("test_event", json!({"some_attr": "some_other_value"}));
    assert_eq!(f.call_count(), 1);
}

#[test]
fn test_action_data_and_entity_id() {
    let f = Fixture::new();
    f.setup(
        r#"
trigger:
  platform: event
  event_type: test_event
action:
  service: test.automation
  entity_id: hello.world
  data:
    some: data
"#,
    );

    f.fire("test_event", Value::Null);
    let calls = f.calls.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].data, json!({"some": "data", "entity_id": ["hello.world"]}));
    assert_eq!(calls[0].entity_ids(), vec!["hello.world".to_string()]);
}

#[test]
fn test_multiple_actions() {
    let f = Fixture::new();
    f.setup(
        r#"
trigger:
  platform: event
  event_type: test_event
action:
  - service: test.automation
  - service: test.automation
    data: {second: true}
"#,
    );

    f.fire("test_event", Value::Null);
    assert_eq!(f.call_count(), 2);
}

// ==================== State platform ====================

#[test]
fn test_state_fires_on_entity_change() {
    let f = Fixture::new();
    f.setup(&state_rule(""));

    f.set("test.entity", "world");
    assert_eq!(f.call_count(), 1);
}

#[test]
fn test_state_from_filter() {
    let f = Fixture::new();
    f.setup(&state_rule("  from: hello\n"));

    f.set("test.entity", "world");
    assert_eq!(f.call_count(), 1);
}

#[test]
fn test_state_to_filter() {
    let f = Fixture::new();
    f.setup(&state_rule("  to: world\n"));

    f.set("test.entity", "world");
    assert_eq!(f.call_count(), 1);
}

#[test]
fn test_state_alias_filter() {
    let f = Fixture::new();
    f.setup(&state_rule("  state: world\n"));

    f.set("test.entity", "world");
    assert_eq!(f.call_count(), 1);
}

#[test]
fn test_state_both_filters() {
    let f = Fixture::new();
    f.setup(&state_rule("  from: hello\n  to: world\n"));

    f.set("test.entity", "world");
    assert_eq!(f.call_count(), 1);
}

#[test]
fn test_state_not_fires_if_to_filter_not_match() {
    let f = Fixture::new();
    f.setup(&state_rule("  from: hello\n  to: world\n"));

    f.set("test.entity", "moon");
    assert_eq!(f.call_count(), 0);
}

#[test]
fn test_state_not_fires_if_from_filter_not_match() {
    let f = Fixture::new();
    f.set("test.entity", "bye");
    f.setup(&state_rule("  from: hello\n  to: world\n"));

    f.set("test.entity", "world");
    assert_eq!(f.call_count(), 0);
}

#[test]
fn test_state_not_fires_if_entity_not_match() {
    let f = Fixture::new();
    f.setup("trigger:\n  platform: state\n  entity_id: test.another_entity\naction:\n  service: test.automation\n");

    f.set("test.entity", "world");
    assert_eq!(f.call_count(), 0);
}

#[test]
fn test_state_for_cancelled_by_change() {
    let f = Fixture::new();
    f.setup(&state_rule("  to: world\n  for:\n    seconds: 5\n"));

    f.set("test.entity", "world");
    f.set("test.entity", "not_world");
    f.fire_time(Utc::now() + chrono::Duration::seconds(10));
    assert_eq!(f.call_count(), 0);
}

#[test]
fn test_state_for_fires_after_hold() {
    let f = Fixture::new();
    f.setup(&state_rule("  to: world\n  for:\n    seconds: 5\n"));

    f.set("test.entity", "world");
    f.fire_time(Utc::now() + chrono::Duration::seconds(1));
    assert_eq!(f.call_count(), 0);

    f.fire_time(Utc::now() + chrono::Duration::seconds(10));
    assert_eq!(f.call_count(), 1);

    // fires once per hold
    f.fire_time(Utc::now() + chrono::Duration::seconds(20));
    assert_eq!(f.call_count(), 1);
}

#[test]
fn test_state_condition() {
    let f = Fixture::new();
    f.set("test.entity", "world");
    f.setup(
        r#"
trigger:
  platform: event
  event_type: test_event
condition:
  - platform: state
    entity_id: test.entity
    state: world
action:
  service: test.automation
"#,
    );

    f.fire("test_event", Value::Null);
    assert_eq!(f.call_count(), 1);

    f.set("test.entity", "moon");
    f.fire("test_event", Value::Null);
    assert_eq!(f.call_count(), 1);
}

#[test]
fn test_state_condition_with_for() {
    let f = Fixture::new();
    f.set("test.entity", "on");
    f.setup(
        r#"
trigger:
  platform: event
  event_type: test_event
condition:
  platform: state
  entity_id: test.entity
  state: 'on'
  for:
    seconds: 1
action:
  service: test.automation
"#,
    );

    f.fire("test_event", Value::Null);
    assert_eq!(f.call_count(), 0);

    thread::sleep(Duration::from_millis(1100));
    f.fire("test_event", Value::Null);
    assert_eq!(f.call_count(), 1);
}

#[test]
fn test_state_setup_errors_skip_rule() {
    let f = Fixture::new();
    let configs: Vec<serde_yaml::Value> = [
        "trigger: {platform: state, entity_id: test.entity, to: true}\naction: {service: test.automation}\n",
        "trigger: {platform: state, entity_id: test.entity, for: {seconds: 5}}\naction: {service: test.automation}\n",
        "trigger: {platform: state, entity_id: test.entity, to: world, for: {invalid: 5}}\naction: {service: test.automation}\n",
        "trigger: {platform: state, entity_id: test.entity}\naction: {service: test.automation}\n",
    ]
    .iter()
    .map(|yaml| serde_yaml::from_str(yaml).unwrap())
    .collect();

    let automations = setup(&f.hass, &configs);
    assert_eq!(automations.len(), 1);

    f.set("test.entity", "world");
    assert_eq!(f.call_count(), 1);
}

// ==================== Numeric state platform ====================

#[test]
fn test_numeric_fires_below() {
    let f = Fixture::new();
    f.setup(&numeric_rule("  below: 10\n"));

    // 9 is below 10
    f.set("test.entity", "9");
    assert_eq!(f.call_count(), 1);
}

#[test]
fn test_numeric_fires_over_to_below() {
    let f = Fixture::new();
    f.set("test.entity", "11");
    f.setup(&numeric_rule("  below: 10\n"));

    f.set("test.entity", "9");
    assert_eq!(f.call_count(), 1);
}

#[test]
fn test_numeric_not_fires_below_to_below() {
    let f = Fixture::new();
    f.set("test.entity", "9");
    f.setup(&numeric_rule("  below: 10\n"));

    // already below, staying below
    f.set("test.entity", "8");
    assert_eq!(f.call_count(), 0);
}

#[test]
fn test_numeric_fires_above() {
    let f = Fixture::new();
    f.setup(&numeric_rule("  above: 10\n"));

    f.set("test.entity", "11");
    assert_eq!(f.call_count(), 1);
}

#[test]
fn test_numeric_fires_below_to_above() {
    let f = Fixture::new();
    f.set("test.entity", "9");
    f.setup(&numeric_rule("  above: 10\n"));

    f.set("test.entity", "11");
    assert_eq!(f.call_count(), 1);
}

#[test]
fn test_numeric_not_fires_above_to_above() {
    let f = Fixture::new();
    f.set("test.entity", "11");
    f.setup(&numeric_rule("  above: 10\n"));

    f.set("test.entity", "12");
    assert_eq!(f.call_count(), 0);
}

#[test]
fn test_numeric_range() {
    let f = Fixture::new();
    f.setup(&numeric_rule("  below: 10\n  above: 5\n"));

    f.set("test.entity", "9");
    assert_eq!(f.call_count(), 1);
}

#[test]
fn test_numeric_not_fires_outside_range() {
    let f = Fixture::new();
    f.set("test.entity", "11");
    f.setup(&numeric_rule("  below: 10\n  above: 5\n"));

    // 4 is below 10 but not above 5
    f.set("test.entity", "4");
    assert_eq!(f.call_count(), 0);
}

#[test]
fn test_numeric_not_fires_if_entity_not_match() {
    let f = Fixture::new();
    f.setup(
        "trigger:\n  platform: numeric_state\n  entity_id: test.another_entity\n  below: 100\naction:\n  service: test.automation\n",
    );

    f.set("test.entity", "11");
    assert_eq!(f.call_count(), 0);
}

#[test]
fn test_numeric_state_ignores_unrelated_attribute() {
    let f = Fixture::new();
    f.setup(&numeric_rule("  below: 10\n"));

    f.set_with("test.entity", "11", json!({"test_attribute": 9}));
    assert_eq!(f.call_count(), 0);

    f.set_with("test.entity", "9", json!({"test_attribute": 11}));
    assert_eq!(f.call_count(), 1);
}

#[test]
fn test_numeric_attribute() {
    let f = Fixture::new();
    f.setup(&numeric_rule("  attribute: test_attribute\n  below: 10\n"));

    f.set_with("test.entity", "entity", json!({"test_attribute": 11, "not_test_attribute": 9}));
    assert_eq!(f.call_count(), 0);

    f.set_with("test.entity", "entity", json!({"test_attribute": 9, "not_test_attribute": 11}));
    assert_eq!(f.call_count(), 1);

    // attribute gone: out of range, no call
    f.set("test.entity", "9");
    assert_eq!(f.call_count(), 1);
}

#[test]
fn test_numeric_condition() {
    let f = Fixture::new();
    f.setup(
        r#"
trigger:
  platform: event
  event_type: test_event
condition:
  platform: numeric_state
  entity_id: test.entity
  above: 8
  below: 12
action:
  service: test.automation
"#,
    );

    f.set("test.entity", "10");
    f.fire("test_event", Value::Null);
    assert_eq!(f.call_count(), 1);

    f.set("test.entity", "8");
    f.fire("test_event", Value::Null);
    assert_eq!(f.call_count(), 1);

    f.set("test.entity", "9");
    f.fire("test_event", Value::Null);
    assert_eq!(f.call_count(), 2);
}

fn value_template_rule(template: &str) -> String {
    numeric_rule(&format!("  value_template: '{template}'\n  below: 10\n"))
}

#[test]
fn test_numeric_value_template_attribute_below() {
    let f = Fixture::new();
    f.setup(&value_template_rule("{{ state.attributes.test_attribute }}"));

    f.set_with("test.entity", "entity", json!({"test_attribute": 9}));
    assert_eq!(f.call_count(), 1);
}

#[test]
fn test_numeric_value_template_ignores_state_value() {
    let f = Fixture::new();
    f.setup(&value_template_rule("{{ state.attributes.test_attribute }}"));

    f.set_with("test.entity", "entity", json!({"test_attribute": 11}));
    assert_eq!(f.call_count(), 0);

    // the state value is below but the template reads the attribute
    f.set_with("test.entity", "9", json!({"test_attribute": 11}));
    assert_eq!(f.call_count(), 0);

    // attribute missing: renders empty, not a number
    f.set("test.entity", "entity");
    assert_eq!(f.call_count(), 0);

    f.set_with("test.entity", "entity", json!({"test_attribute": 9, "not_test_attribute": 11}));
    assert_eq!(f.call_count(), 1);
}

#[test]
fn test_numeric_template_list() {
    let f = Fixture::new();
    f.setup(&value_template_rule("{{ state.attributes.test_attribute[2] }}"));

    f.set_with("test.entity", "entity", json!({"test_attribute": [11, 15, 3]}));
    assert_eq!(f.call_count(), 1);
}

#[test]
fn test_numeric_template_string() {
    let f = Fixture::new();
    f.setup(&value_template_rule("{{ state.attributes.test_attribute | multiply(10) }}"));

    f.set_with("test.entity", "entity", json!({"test_attribute": "0.9"}));
    assert_eq!(f.call_count(), 1);
}

#[test]
fn test_numeric_condition_value_template() {
    let f = Fixture::new();
    f.setup(
        r#"
trigger:
  platform: event
  event_type: test_event
condition:
  platform: numeric_state
  entity_id: test.entity
  value_template: '{{ state.attributes.level | multiply(2) }}'
  below: 10
action:
  service: test.automation
"#,
    );

    f.set_with("test.entity", "entity", json!({"level": 6}));
    f.fire("test_event", Value::Null);
    assert_eq!(f.call_count(), 0);

    f.set_with("test.entity", "entity", json!({"level": "4"}));
    f.fire("test_event", Value::Null);
    assert_eq!(f.call_count(), 1);
}

// ==================== Template platform ====================

#[test]
fn test_template_fires_once_while_true() {
    let f = Fixture::new();
    f.setup(
        r#"
trigger:
  platform: template
  value_template: "{{ is_state('test.entity', 'world') }}"
action:
  service: test.automation
"#,
    );

    f.set("test.entity", "world");
    assert_eq!(f.call_count(), 1);

    // still true on an unrelated change: latched
    f.set("test.other", "anything");
    assert_eq!(f.call_count(), 1);

    f.set("test.entity", "hello");
    assert_eq!(f.call_count(), 1);

    f.set("test.entity", "world");
    assert_eq!(f.call_count(), 2);
}

#[test]
fn test_template_broken_never_fires() {
    let f = Fixture::new();
    f.setup(
        r#"
trigger:
  platform: template
  value_template: "{{ states.test.missing.state == 'on' }}"
action:
  service: test.automation
"#,
    );

    f.set("test.entity", "world");
    assert_eq!(f.call_count(), 0);
}

#[test]
fn test_template_condition() {
    let f = Fixture::new();
    f.setup(
        r#"
trigger:
  platform: event
  event_type: test_event
condition:
  platform: template
  value_template: "{{ states('test.entity') | float > 5 }}"
action:
  service: test.automation
"#,
    );

    f.fire("test_event", Value::Null);
    assert_eq!(f.call_count(), 0);

    f.set("test.entity", "7.5");
    f.fire("test_event", Value::Null);
    assert_eq!(f.call_count(), 1);
}

// ==================== Zone platform ====================

const INSIDE: (f64, f64) = (32.880586, -117.237564);
const OUTSIDE: (f64, f64) = (32.881011, -117.234758);

fn zone_fixture() -> Fixture {
    let f = Fixture::new();
    f.set_with(
        "zone.test",
        "zoning",
        json!({"latitude": 32.880837, "longitude": -117.237561, "radius": 250}),
    );
    f
}

fn move_to(f: &Fixture, (latitude, longitude): (f64, f64)) {
    f.set_with(
        "test.entity",
        "hello",
        json!({"latitude": latitude, "longitude": longitude}),
    );
}

fn zone_rule(event: &str) -> String {
    format!(
        "trigger:\n  platform: zone\n  entity_id: test.entity\n  zone: zone.test\n  event: {event}\n{STATE_ACTION}"
    )
}

#[test]
fn test_zone_enter() {
    let f = zone_fixture();
    move_to(&f, OUTSIDE);
    f.setup(&zone_rule("enter"));

    move_to(&f, INSIDE);
    assert_eq!(f.call_count(), 1);
}

#[test]
fn test_zone_enter_not_fired_on_leave() {
    let f = zone_fixture();
    move_to(&f, INSIDE);
    f.setup(&zone_rule("enter"));

    move_to(&f, OUTSIDE);
    assert_eq!(f.call_count(), 0);
}

#[test]
fn test_zone_leave() {
    let f = zone_fixture();
    move_to(&f, INSIDE);
    f.setup(&zone_rule("leave"));

    move_to(&f, OUTSIDE);
    assert_eq!(f.call_count(), 1);
}

#[test]
fn test_zone_leave_not_fired_on_enter() {
    let f = zone_fixture();
    move_to(&f, OUTSIDE);
    f.setup(&zone_rule("leave"));

    move_to(&f, INSIDE);
    assert_eq!(f.call_count(), 0);
}

#[test]
fn test_zone_without_location_ignored() {
    let f = zone_fixture();
    move_to(&f, OUTSIDE);
    f.setup(&zone_rule("enter"));

    f.set("test.entity", "somewhere");
    assert_eq!(f.call_count(), 0);
}

#[test]
fn test_zone_condition() {
    let f = zone_fixture();
    move_to(&f, INSIDE);
    f.setup(
        r#"
trigger:
  platform: event
  event_type: test_event
condition:
  platform: zone
  entity_id: test.entity
  zone: zone.test
action:
  service: test.automation
"#,
    );

    f.fire("test_event", Value::Null);
    assert_eq!(f.call_count(), 1);

    move_to(&f, OUTSIDE);
    f.fire("test_event", Value::Null);
    assert_eq!(f.call_count(), 1);
}

// ==================== Time platform ====================

fn local(hour: u32, minute: u32, second: u32) -> chrono::DateTime<Utc> {
    Local
        .with_ymd_and_hms(2024, 6, 3, hour, minute, second)
        .unwrap()
        .with_timezone(&Utc)
}

#[test]
fn test_time_after() {
    let f = Fixture::new();
    f.setup("trigger:\n  platform: time\n  after: '05:00:00'\naction:\n  service: test.automation\n");

    f.fire_time(local(4, 59, 59));
    assert_eq!(f.call_count(), 0);

    f.fire_time(local(5, 0, 0));
    assert_eq!(f.call_count(), 1);
}

#[test]
fn test_time_pattern() {
    let f = Fixture::new();
    f.setup("trigger:\n  platform: time\n  minutes: 30\n  seconds: 0\naction:\n  service: test.automation\n");

    f.fire_time(local(1, 30, 0));
    f.fire_time(local(2, 30, 0));
    f.fire_time(local(2, 30, 1));
    f.fire_time(local(2, 31, 0));
    assert_eq!(f.call_count(), 2);
}

#[test]
fn test_time_condition_weekday() {
    let today = Local::now().weekday().to_string().to_lowercase();
    let tomorrow = Local::now().weekday().succ().to_string().to_lowercase();

    let f = Fixture::new();
    f.setup(&format!(
        "trigger:\n  platform: event\n  event_type: today\ncondition:\n  platform: time\n  weekday: {today}\n{STATE_ACTION}"
    ));
    f.setup(&format!(
        "trigger:\n  platform: event\n  event_type: tomorrow\ncondition:\n  platform: time\n  weekday: [{tomorrow}]\n{STATE_ACTION}"
    ));

    f.fire("today", Value::Null);
    f.fire("tomorrow", Value::Null);
    assert_eq!(f.call_count(), 1);
}

// ==================== Rule handling ====================

#[test]
fn test_condition_type_or() {
    let f = Fixture::new();
    let rule = |condition_type: &str, event_type: &str| {
        format!(
            r#"
trigger:
  platform: event
  event_type: {event_type}
condition_type: {condition_type}
condition:
  - platform: state
    entity_id: test.entity
    state: hello
  - platform: state
    entity_id: test.entity
    state: world
action:
  service: test.automation
"#
        )
    };
    f.setup(&rule("and", "test_and"));
    f.setup(&rule("or", "test_or"));

    f.fire("test_and", Value::Null);
    assert_eq!(f.call_count(), 0);

    f.fire("test_or", Value::Null);
    assert_eq!(f.call_count(), 1);
}

#[test]
fn test_disable_and_remove() {
    let f = Fixture::new();
    let automations = f.setup(
        "alias: Toggle me\ntrigger:\n  platform: event\n  event_type: test_event\naction:\n  service: test.automation\n",
    );
    let automation = &automations[0];
    assert_eq!(automation.id(), "toggle_me");
    assert_eq!(automation.name(), "Toggle me");

    automation.disable();
    f.fire("test_event", Value::Null);
    assert_eq!(f.call_count(), 0);

    automation.enable();
    f.fire("test_event", Value::Null);
    assert_eq!(f.call_count(), 1);

    automation.remove();
    assert_eq!(automation.trigger_count(), 0);
    assert!(!automation.is_enabled());
    f.fire("test_event", Value::Null);
    assert_eq!(f.call_count(), 1);
    assert_eq!(f.hass.bus().listeners().get("test_event"), None);
}

#[test]
fn test_ids_unique() {
    let f = Fixture::new();
    let automations = f.setup(
        r#"
- alias: Same
  trigger: {platform: event, event_type: a}
  action: {service: test.automation}
- alias: Same
  trigger: {platform: event, event_type: b}
  action: {service: test.automation}
- trigger: {platform: event, event_type: c}
  action: {service: test.automation}
"#,
    );

    let ids: Vec<&str> = automations.iter().map(Automation::id).collect();
    assert_eq!(ids, vec!["same", "same_2", "automation_3"]);
}
