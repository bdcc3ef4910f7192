//! Dynamic tag rule data model.
//!
//! A dynamic tag rule pairs a condition over resource attributes with a
//! target tag. It is consulted before the scheduler scans host candidates,
//! dynamically adding the tag to candidates whose attributes satisfy the
//! condition, e.g. `host.sys_load > 1.5 || host.mem_used_percent > 0.7`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A three-valued flag. Only `True` counts as set.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TriState {
    #[default]
    True,
    False,
    None,
}

impl TriState {
    pub fn is_true(self) -> bool {
        self == TriState::True
    }

    pub fn is_false(self) -> bool {
        self == TriState::False
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        if value {
            TriState::True
        } else {
            TriState::False
        }
    }
}

impl From<Option<bool>> for TriState {
    fn from(value: Option<bool>) -> Self {
        value.map(TriState::from).unwrap_or(TriState::None)
    }
}

/// A stored condition + target tag pairing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DynamicTagRule {
    /// Unique identifier for this rule.
    pub id: Uuid,
    /// Human-readable, unique name.
    pub name: String,
    /// Optional description of what the rule detects.
    pub description: Option<String>,
    /// The tag attached when the condition holds.
    pub tag_id: Uuid,
    /// Condition expression, e.g. `host.sys_load > 1.5`.
    pub condition: String,
    /// Whether the rule takes part in scheduling.
    #[serde(default)]
    pub enabled: TriState,
    /// Timestamp when the rule was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last update.
    pub updated_at: DateTime<Utc>,
}

impl DynamicTagRule {
    /// Creates a new enabled rule.
    pub fn new(name: impl Into<String>, tag_id: Uuid, condition: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            tag_id,
            condition: condition.into(),
            enabled: TriState::True,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the description for the rule.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets whether the rule is enabled.
    pub fn with_enabled(mut self, enabled: impl Into<TriState>) -> Self {
        self.enabled = enabled.into();
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.is_true()
    }

    /// Returns true if `id_or_name` is this rule's id or its name.
    pub fn matches_id_or_name(&self, id_or_name: &str) -> bool {
        self.name == id_or_name || self.id.to_string() == id_or_name
    }
}
