//! Rules that inspect entities and report flags, and the registry that
//! builds the enabled set from configuration.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use log::{debug, error};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::Entity;
use crate::flag::{Flag, UniqueFlagContainer};

/// Errors raised by rules and the registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleError {
    /// A rule could not evaluate an entity.
    #[error("rule {rule} failed: {message}")]
    Failed {
        /// Rule name.
        rule: String,
        /// Failure description.
        message: String,
    },
    /// A name was registered twice.
    #[error("rule {0} is already registered")]
    Duplicate(String),
}

/// A data-quality check.
pub trait Rule {
    /// Stable rule name, used as the flag category.
    fn name(&self) -> &str;

    /// Inspect one entity.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] when the entity cannot be evaluated.
    fn flag(&self, entity: &dyn Entity) -> Result<Option<Flag>, RuleError>;
}

/// Which rules run.
///
/// # Examples
///
/// ```
/// use geoflag_core::rule::RuleConfig;
///
/// let config: RuleConfig =
///     serde_json::from_str(r#"{"default_enabled": false, "rules": {"SinkIsland": true}}"#)
///         .expect("valid config");
/// assert!(config.is_enabled("SinkIsland"));
/// assert!(!config.is_enabled("Other"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Used for rules the map does not name.
    pub default_enabled: bool,
    /// Per-rule switches.
    pub rules: BTreeMap<String, bool>,
}

impl RuleConfig {
    /// Set the switch used for unnamed rules.
    #[must_use]
    pub const fn with_default(mut self, enabled: bool) -> Self {
        self.default_enabled = enabled;
        self
    }

    /// Switch one rule.
    #[must_use]
    pub fn with_rule(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.rules.insert(name.into(), enabled);
        self
    }

    /// Whether `name` should run.
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.rules
            .get(name)
            .copied()
            .unwrap_or(self.default_enabled)
    }
}

/// Builds a rule instance.
pub type RuleConstructor = fn(&RuleConfig) -> Box<dyn Rule>;

/// Explicit name to constructor table.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    constructors: BTreeMap<String, RuleConstructor>,
}

impl RuleRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::Duplicate`] when `name` is taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        constructor: RuleConstructor,
    ) -> Result<(), RuleError> {
        let key = name.into();
        if self.constructors.contains_key(&key) {
            return Err(RuleError::Duplicate(key));
        }
        self.constructors.insert(key, constructor);
        Ok(())
    }

    /// Registered names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Instantiate every rule `config` enables, in name order.
    #[must_use]
    pub fn build_enabled(&self, config: &RuleConfig) -> Vec<Box<dyn Rule>> {
        self.constructors
            .iter()
            .filter(|(name, _)| config.is_enabled(name))
            .map(|(name, constructor)| {
                debug!("enabling rule {name}");
                constructor(config)
            })
            .collect()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Run `rule` against `entity`, isolating failures.
///
/// Errors and panics are logged with the rule name and entity identifier and
/// yield `None`. Flags without a challenge take the rule name.
#[must_use]
pub fn evaluate(rule: &dyn Rule, entity: &dyn Entity) -> Option<Flag> {
    match catch_unwind(AssertUnwindSafe(|| rule.flag(entity))) {
        Ok(Ok(Some(mut flag))) => {
            if flag.challenge().is_none() {
                flag.set_challenge(rule.name());
            }
            Some(flag)
        }
        Ok(Ok(None)) => None,
        Ok(Err(err)) => {
            error!(
                "rule {} failed on {}: {err}",
                rule.name(),
                entity.unique_identifier()
            );
            None
        }
        Err(payload) => {
            error!(
                "rule {} panicked on {}: {}",
                rule.name(),
                entity.unique_identifier(),
                panic_message(payload.as_ref())
            );
            None
        }
    }
}

/// Run every rule over every entity, keeping one flag per rule and member set.
#[must_use]
pub fn evaluate_all<'a>(
    rules: &[Box<dyn Rule>],
    entities: impl IntoIterator<Item = &'a dyn Entity>,
) -> UniqueFlagContainer {
    let mut container = UniqueFlagContainer::new();
    for entity in entities {
        for rule in rules {
            if let Some(flag) = evaluate(rule.as_ref(), entity) {
                container.add(rule.name(), flag);
            }
        }
    }
    container
}
