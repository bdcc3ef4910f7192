//! Write-time validation for dynamic tag rules.
//!
//! Every rule reaching the store has a condition that parses and a tag
//! whose resource type is registered as standalone. Evaluation relies on
//! these checks and does not repeat them.

use crate::condition::{Condition, ParseError, DEFAULT_MAX_DEPTH};
use crate::config::{EngineConfig, DEFAULT_MAX_CONDITION_LENGTH};
use crate::registry::ResourceRegistry;
use dt_core::db::{DbError, DynamicTagRuleRepository, RuleFilter, RuleUpdate, TagRepository};
use dt_core::{DynamicTagRule, Tag, TriState};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument};

/// Errors rejecting a rule write.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleValidationError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid condition: {0}")]
    InvalidCondition(#[from] ParseError),

    #[error("Condition is {length} characters long, the limit is {max}")]
    ConditionTooLong { length: usize, max: usize },

    #[error("Condition must contain only ASCII characters")]
    ConditionNotAscii,

    #[error("Tag '{0}' not found")]
    TagNotFound(String),

    #[error("Resource type '{requested}' does not match tag resource type '{tag}'")]
    ResourceTypeMismatch { requested: String, tag: String },

    #[error("Resource type '{0}' is not supported for dynamic tags")]
    ResourceTypeNotSupported(String),

    #[error("Dynamic tag rule '{0}' not found")]
    RuleNotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] DbError),
}

/// Input for creating a rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateRuleInput {
    pub name: String,
    pub description: Option<String>,
    /// Id or name of the target tag.
    pub tag: Option<String>,
    pub condition: Option<String>,
    /// When set, must equal the tag's resource type.
    pub resource_type: Option<String>,
    /// Defaults to enabled.
    pub enabled: Option<bool>,
}

/// Partial update of a rule. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRuleInput {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub tag: Option<String>,
    pub condition: Option<String>,
    pub resource_type: Option<String>,
    pub enabled: Option<bool>,
}

/// Validates and persists dynamic tag rules.
pub struct RuleService {
    registry: Arc<ResourceRegistry>,
    rules: Arc<dyn DynamicTagRuleRepository>,
    tags: Arc<dyn TagRepository>,
    max_condition_length: usize,
    max_depth: usize,
}

impl RuleService {
    pub fn new(
        registry: Arc<ResourceRegistry>,
        rules: Arc<dyn DynamicTagRuleRepository>,
        tags: Arc<dyn TagRepository>,
    ) -> Self {
        Self {
            registry,
            rules,
            tags,
            max_condition_length: DEFAULT_MAX_CONDITION_LENGTH,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Applies limits from the engine configuration.
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.max_condition_length = config.max_condition_length;
        self.max_depth = config.max_depth;
        self
    }

    /// Checks a condition the way a rule write does.
    pub fn validate_condition(&self, condition: &str) -> Result<(), RuleValidationError> {
        if condition.trim().is_empty() {
            return Err(RuleValidationError::MissingParameter("condition"));
        }
        if !condition.is_ascii() {
            return Err(RuleValidationError::ConditionNotAscii);
        }
        if condition.len() > self.max_condition_length {
            return Err(RuleValidationError::ConditionTooLong {
                length: condition.len(),
                max: self.max_condition_length,
            });
        }
        Condition::parse_with_max_depth(condition, self.max_depth)?;
        Ok(())
    }

    /// Resolves the tag and checks that rules may target it.
    async fn resolve_tag(
        &self,
        tag: &str,
        resource_type: Option<&str>,
    ) -> Result<Tag, RuleValidationError> {
        let tag = self
            .tags
            .get_by_id_or_name(tag)
            .await?
            .ok_or_else(|| RuleValidationError::TagNotFound(tag.to_string()))?;

        if let Some(requested) = resource_type {
            if requested != tag.resource_type {
                return Err(RuleValidationError::ResourceTypeMismatch {
                    requested: requested.to_string(),
                    tag: tag.resource_type.clone(),
                });
            }
        }
        if self.registry.resolve_standalone(&tag.resource_type).is_none() {
            return Err(RuleValidationError::ResourceTypeNotSupported(
                tag.resource_type.clone(),
            ));
        }
        Ok(tag)
    }

    async fn find(&self, id_or_name: &str) -> Result<DynamicTagRule, RuleValidationError> {
        self.rules
            .get_by_id_or_name(id_or_name)
            .await?
            .ok_or_else(|| RuleValidationError::RuleNotFound(id_or_name.to_string()))
    }

    /// Validates and stores a new rule.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: CreateRuleInput) -> Result<DynamicTagRule, RuleValidationError> {
        if input.name.trim().is_empty() {
            return Err(RuleValidationError::MissingParameter("name"));
        }
        let condition = input
            .condition
            .as_deref()
            .ok_or(RuleValidationError::MissingParameter("condition"))?;
        self.validate_condition(condition)?;

        let tag_ref = input
            .tag
            .as_deref()
            .ok_or(RuleValidationError::MissingParameter("tag"))?;
        let tag = self
            .resolve_tag(tag_ref, input.resource_type.as_deref())
            .await?;

        let mut rule = DynamicTagRule::new(input.name.clone(), tag.id, condition)
            .with_enabled(input.enabled.map(TriState::from).unwrap_or(TriState::True));
        rule.description = input.description;

        let created = self.rules.create(&rule).await?;
        info!(rule_id = %created.id, tag = %tag.name, "Created dynamic tag rule");
        Ok(created)
    }

    /// Validates and applies a partial update.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id_or_name: &str,
        input: UpdateRuleInput,
    ) -> Result<DynamicTagRule, RuleValidationError> {
        let existing = self.find(id_or_name).await?;

        if let Some(name) = &input.name {
            if name.trim().is_empty() {
                return Err(RuleValidationError::MissingParameter("name"));
            }
        }
        if let Some(condition) = &input.condition {
            self.validate_condition(condition)?;
        }

        let tag_id = match (&input.tag, &input.resource_type) {
            (Some(tag), requested) => Some(self.resolve_tag(tag, requested.as_deref()).await?.id),
            (None, Some(requested)) => {
                let current = self.tags.get(existing.tag_id).await?.ok_or_else(|| {
                    RuleValidationError::TagNotFound(existing.tag_id.to_string())
                })?;
                self.resolve_tag(&current.id.to_string(), Some(requested.as_str()))
                    .await?;
                None
            }
            (None, None) => None,
        };

        let update = RuleUpdate {
            name: input.name,
            description: input.description,
            tag_id,
            condition: input.condition,
            enabled: input.enabled.map(TriState::from),
        };
        let updated = self.rules.update(existing.id, &update).await?;
        info!(rule_id = %updated.id, "Updated dynamic tag rule");
        Ok(updated)
    }

    /// Enables or disables a rule.
    pub async fn set_enabled(
        &self,
        id_or_name: &str,
        enabled: bool,
    ) -> Result<DynamicTagRule, RuleValidationError> {
        let existing = self.find(id_or_name).await?;
        let update = RuleUpdate {
            enabled: Some(TriState::from(enabled)),
            ..Default::default()
        };
        let updated = self.rules.update(existing.id, &update).await?;
        info!(rule_id = %updated.id, enabled, "Changed dynamic tag rule state");
        Ok(updated)
    }

    /// Deletes a rule.
    pub async fn delete(&self, id_or_name: &str) -> Result<(), RuleValidationError> {
        let existing = self.find(id_or_name).await?;
        self.rules.delete(existing.id).await?;
        info!(rule_id = %existing.id, "Deleted dynamic tag rule");
        Ok(())
    }

    pub async fn list(&self, filter: &RuleFilter) -> Result<Vec<DynamicTagRule>, RuleValidationError> {
        Ok(self.rules.list(filter).await?)
    }
}
