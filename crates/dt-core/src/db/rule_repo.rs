//! Dynamic tag rule repository contract.

use super::DbError;
use crate::rule::{DynamicTagRule, TriState};
use async_trait::async_trait;
use uuid::Uuid;

/// Partial update for a dynamic tag rule.
#[derive(Debug, Clone, Default)]
pub struct RuleUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub tag_id: Option<Uuid>,
    pub condition: Option<String>,
    pub enabled: Option<TriState>,
}

/// Filter criteria for listing rules.
#[derive(Debug, Clone, Default)]
pub struct RuleFilter {
    /// `Some(true)` keeps only enabled rules, `Some(false)` only rules
    /// explicitly disabled.
    pub enabled: Option<bool>,
    /// Keep only rules targeting this tag.
    pub tag_id: Option<Uuid>,
}

impl RuleFilter {
    /// Returns true if the rule passes this filter.
    pub fn matches(&self, rule: &DynamicTagRule) -> bool {
        if let Some(enabled) = self.enabled {
            let passes = if enabled {
                rule.enabled.is_true()
            } else {
                rule.enabled.is_false()
            };
            if !passes {
                return false;
            }
        }
        if let Some(tag_id) = self.tag_id {
            if rule.tag_id != tag_id {
                return false;
            }
        }
        true
    }
}

/// Repository trait for dynamic tag rule persistence.
#[async_trait]
pub trait DynamicTagRuleRepository: Send + Sync {
    /// Creates a new rule.
    async fn create(&self, rule: &DynamicTagRule) -> Result<DynamicTagRule, DbError>;

    /// Gets a rule by ID.
    async fn get(&self, id: Uuid) -> Result<Option<DynamicTagRule>, DbError>;

    /// Gets a rule by ID or by name.
    async fn get_by_id_or_name(&self, id_or_name: &str)
        -> Result<Option<DynamicTagRule>, DbError>;

    /// Lists rules matching the filter, ordered by name.
    async fn list(&self, filter: &RuleFilter) -> Result<Vec<DynamicTagRule>, DbError>;

    /// Updates a rule.
    async fn update(&self, id: Uuid, update: &RuleUpdate) -> Result<DynamicTagRule, DbError>;

    /// Deletes a rule.
    async fn delete(&self, id: Uuid) -> Result<bool, DbError>;

    /// Lists enabled rules whose tag applies to `resource_type`.
    ///
    /// Applicability is derived by joining each rule with its tag at query
    /// time. A store failure is an error, never an empty list.
    async fn list_enabled_by_resource_type(
        &self,
        resource_type: &str,
    ) -> Result<Vec<DynamicTagRule>, DbError>;
}
