//! Automation management
//!
//! An automation ties together triggers, conditions, and actions. Setting
//! one up attaches its triggers to the hub's bus; removing it detaches them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use chrono::Local;
use ha_hub::{HomeAssistant, Tracker};
use ha_template::TemplateEngine;
use ha_util::{ensure_unique_string, slugify};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_yaml::Value;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

use crate::action::ServiceAction;
use crate::condition::{Condition, ConditionType};
use crate::trigger::Trigger;

/// Automation errors
#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("Invalid automation configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid automation {name}: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Automation {0} has no triggers")]
    NoTriggers(String),

    #[error("Action error: {0}")]
    Action(String),
}

/// Result type for automation operations
pub type AutomationResult<T> = Result<T, AutomationError>;

/// Automation configuration from YAML
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AutomationConfig {
    /// Human-readable name
    #[serde(default)]
    pub alias: Option<String>,

    /// Triggers that start the automation
    #[serde(
        default,
        alias = "triggers",
        deserialize_with = "crate::trigger::one_or_many::deserialize"
    )]
    pub trigger: Vec<Trigger>,

    /// Conditions that must be met
    #[serde(
        default,
        alias = "conditions",
        deserialize_with = "crate::trigger::one_or_many::deserialize"
    )]
    pub condition: Vec<Condition>,

    #[serde(default)]
    pub condition_type: ConditionType,

    /// Service calls to make
    #[serde(
        default,
        alias = "actions",
        deserialize_with = "crate::trigger::one_or_many::deserialize"
    )]
    pub action: Vec<ServiceAction>,
}

impl AutomationConfig {
    /// Parse one rule; `fallback_name` names it in errors when it has no alias
    pub fn from_yaml(value: &Value, fallback_name: &str) -> AutomationResult<Self> {
        let name = value
            .get("alias")
            .and_then(Value::as_str)
            .unwrap_or(fallback_name)
            .to_string();
        serde_yaml::from_value(value.clone()).map_err(|source| AutomationError::Parse { name, source })
    }

    pub fn validate(&self) -> AutomationResult<()> {
        if self.trigger.is_empty() {
            return Err(AutomationError::NoTriggers(
                self.alias.clone().unwrap_or_default(),
            ));
        }
        for trigger in &self.trigger {
            trigger.validate()?;
        }
        for condition in &self.condition {
            condition.validate()?;
        }
        for action in &self.action {
            action.validate()?;
        }
        Ok(())
    }
}

/// What a trigger runs: the conditions and actions of one automation
pub(crate) struct Rule {
    name: String,
    conditions: Vec<Condition>,
    condition_type: ConditionType,
    actions: Vec<ServiceAction>,
    enabled: AtomicBool,
    templates: TemplateEngine,
    hass: Weak<HomeAssistant>,
}

impl Rule {
    /// Check the conditions and run the actions
    ///
    /// Called from trigger listeners on a pool worker.
    pub(crate) fn trigger(&self, platform: &str) {
        if !self.enabled.load(Ordering::SeqCst) {
            trace!(automation = %self.name, "Disabled, ignoring trigger");
            return;
        }
        let Some(hass) = self.hass.upgrade() else {
            return;
        };

        if !self.conditions_pass(&hass) {
            debug!(automation = %self.name, trigger = platform, "Conditions not met");
            return;
        }

        info!(automation = %self.name, trigger = platform, "Running automation");
        for action in &self.actions {
            if let Err(err) = action.run(hass.services()) {
                error!(automation = %self.name, service = %action.service, %err, "Action failed");
            }
        }
    }

    /// Renders value templates against the hub's states
    pub(crate) fn templates(&self) -> &TemplateEngine {
        &self.templates
    }

    fn conditions_pass(&self, hass: &HomeAssistant) -> bool {
        if self.conditions.is_empty() {
            return true;
        }
        let now = Local::now();
        let states = hass.states();
        match self.condition_type {
            ConditionType::And => self
                .conditions
                .iter()
                .all(|c| c.check(states, &self.templates, now)),
            ConditionType::Or => self
                .conditions
                .iter()
                .any(|c| c.check(states, &self.templates, now)),
        }
    }
}

/// A configured automation attached to a hub
pub struct Automation {
    id: String,
    rule: Arc<Rule>,
    trackers: Mutex<Vec<Tracker>>,
}

impl Automation {
    /// Validate `config` and attach its triggers
    pub fn attach(
        hass: &Arc<HomeAssistant>,
        id: impl Into<String>,
        config: AutomationConfig,
    ) -> AutomationResult<Self> {
        config.validate()?;

        let id = id.into();
        let rule = Arc::new(Rule {
            name: config.alias.clone().unwrap_or_else(|| id.clone()),
            conditions: config.condition,
            condition_type: config.condition_type,
            actions: config.action,
            enabled: AtomicBool::new(true),
            templates: TemplateEngine::new(hass.states()),
            hass: Arc::downgrade(hass),
        });

        let trackers = config
            .trigger
            .iter()
            .map(|trigger| trigger.attach(hass, &rule))
            .collect();

        debug!(automation = %rule.name, triggers = config.trigger.len(), "Automation attached");
        Ok(Self {
            id,
            rule,
            trackers: Mutex::new(trackers),
        })
    }

    /// Slug identifying this automation
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.rule.name
    }

    pub fn is_enabled(&self) -> bool {
        self.rule.enabled.load(Ordering::SeqCst)
    }

    /// Let triggers run the actions again
    pub fn enable(&self) {
        self.rule.enabled.store(true, Ordering::SeqCst);
    }

    /// Keep the triggers attached but ignore them
    pub fn disable(&self) {
        self.rule.enabled.store(false, Ordering::SeqCst);
    }

    /// Number of trigger listeners still attached
    pub fn trigger_count(&self) -> usize {
        self.trackers.lock().len()
    }

    /// Detach every trigger; the automation never runs again
    pub fn remove(&self) {
        self.disable();
        let trackers = std::mem::take(&mut *self.trackers.lock());
        let Some(hass) = self.rule.hass.upgrade() else {
            return;
        };
        for tracker in &trackers {
            tracker.cancel(hass.bus());
        }
        info!(automation = %self.rule.name, "Automation removed");
    }
}

impl std::fmt::Debug for Automation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Automation")
            .field("id", &self.id)
            .field("name", &self.rule.name)
            .field("enabled", &self.is_enabled())
            .field("triggers", &self.trigger_count())
            .finish()
    }
}

/// Set up every rule in `configs`
///
/// A rule that fails to parse or validate is logged and skipped; the rest
/// still load.
pub fn setup(hass: &Arc<HomeAssistant>, configs: &[Value]) -> Vec<Automation> {
    let mut automations: Vec<Automation> = Vec::with_capacity(configs.len());

    for (index, value) in configs.iter().enumerate() {
        let fallback = format!("automation {}", index + 1);

        let loaded = AutomationConfig::from_yaml(value, &fallback).and_then(|config| {
            let preferred = slugify(config.alias.as_deref().unwrap_or(&fallback));
            let id = ensure_unique_string(&preferred, automations.iter().map(Automation::id));
            Automation::attach(hass, id, config)
        });

        match loaded {
            Ok(automation) => automations.push(automation),
            Err(err) => error!(automation = %fallback, %err, "Invalid automation, skipping"),
        }
    }

    if automations.len() < configs.len() {
        warn!(
            loaded = automations.len(),
            configured = configs.len(),
            "Some automations failed to load"
        );
    }
    info!(count = automations.len(), "Automations set up");
    automations
}
