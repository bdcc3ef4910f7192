//! Mock implementation of DynamicTagRuleRepository for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::MockTagRepository;
use crate::db::{DbError, DynamicTagRuleRepository, RuleFilter, RuleUpdate};
use crate::rule::DynamicTagRule;

/// Mock implementation of DynamicTagRuleRepository using in-memory storage.
///
/// Rules reference tags held by a [`MockTagRepository`]; resource type
/// queries join against that repository's live contents.
pub struct MockDynamicTagRuleRepository {
    rules: Arc<RwLock<HashMap<Uuid, DynamicTagRule>>>,
    tags: Arc<MockTagRepository>,
    unavailable: AtomicBool,
}

impl MockDynamicTagRuleRepository {
    /// Creates a new mock repository joined against `tags`.
    pub fn new(tags: Arc<MockTagRepository>) -> Self {
        Self {
            rules: Arc::new(RwLock::new(HashMap::new())),
            tags,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Creates a mock repository pre-populated with rules.
    pub fn with_rules(tags: Arc<MockTagRepository>, rules: Vec<DynamicTagRule>) -> Self {
        let map: HashMap<Uuid, DynamicTagRule> = rules.into_iter().map(|r| (r.id, r)).collect();
        Self {
            rules: Arc::new(RwLock::new(map)),
            tags,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent call fail with a connection error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Gets a snapshot of all rules in the mock.
    pub async fn snapshot(&self) -> Vec<DynamicTagRule> {
        self.rules.read().await.values().cloned().collect()
    }

    fn check_available(&self) -> Result<(), DbError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DbError::Connection("rule store unavailable".to_string()));
        }
        Ok(())
    }

    async fn ensure_tag_exists(&self, tag_id: Uuid) -> Result<(), DbError> {
        self.tags.check_available()?;
        let tags = self.tags.tags();
        if !tags.read().await.contains_key(&tag_id) {
            return Err(DbError::Constraint(format!(
                "Tag '{}' referenced by rule does not exist",
                tag_id
            )));
        }
        Ok(())
    }
}

fn sorted_by_name(mut rules: Vec<DynamicTagRule>) -> Vec<DynamicTagRule> {
    rules.sort_by(|a, b| a.name.cmp(&b.name));
    rules
}

#[async_trait]
impl DynamicTagRuleRepository for MockDynamicTagRuleRepository {
    async fn create(&self, rule: &DynamicTagRule) -> Result<DynamicTagRule, DbError> {
        self.check_available()?;
        self.ensure_tag_exists(rule.tag_id).await?;
        let mut rules = self.rules.write().await;

        if rules.contains_key(&rule.id) {
            return Err(DbError::Constraint(format!(
                "Rule with id '{}' already exists",
                rule.id
            )));
        }

        if rules.values().any(|existing| existing.name == rule.name) {
            return Err(DbError::Constraint(format!(
                "Rule with name '{}' already exists",
                rule.name
            )));
        }

        rules.insert(rule.id, rule.clone());
        Ok(rule.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<DynamicTagRule>, DbError> {
        self.check_available()?;
        let rules = self.rules.read().await;
        Ok(rules.get(&id).cloned())
    }

    async fn get_by_id_or_name(
        &self,
        id_or_name: &str,
    ) -> Result<Option<DynamicTagRule>, DbError> {
        self.check_available()?;
        let rules = self.rules.read().await;
        Ok(rules
            .values()
            .find(|r| r.matches_id_or_name(id_or_name))
            .cloned())
    }

    async fn list(&self, filter: &RuleFilter) -> Result<Vec<DynamicTagRule>, DbError> {
        self.check_available()?;
        let rules = self.rules.read().await;
        Ok(sorted_by_name(
            rules.values().filter(|r| filter.matches(r)).cloned().collect(),
        ))
    }

    async fn update(&self, id: Uuid, update: &RuleUpdate) -> Result<DynamicTagRule, DbError> {
        self.check_available()?;
        if let Some(tag_id) = update.tag_id {
            self.ensure_tag_exists(tag_id).await?;
        }
        let mut rules = self.rules.write().await;

        if let Some(name) = &update.name {
            if rules
                .iter()
                .any(|(other_id, other)| *other_id != id && other.name == *name)
            {
                return Err(DbError::Constraint(format!(
                    "Rule with name '{}' already exists",
                    name
                )));
            }
        }

        let rule = rules
            .get_mut(&id)
            .ok_or_else(|| DbError::not_found("DynamicTagRule", id))?;

        if let Some(name) = &update.name {
            rule.name = name.clone();
        }
        if let Some(description) = &update.description {
            rule.description = description.clone();
        }
        if let Some(tag_id) = update.tag_id {
            rule.tag_id = tag_id;
        }
        if let Some(condition) = &update.condition {
            rule.condition = condition.clone();
        }
        if let Some(enabled) = update.enabled {
            rule.enabled = enabled;
        }
        rule.updated_at = Utc::now();

        Ok(rule.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        self.check_available()?;
        let mut rules = self.rules.write().await;
        Ok(rules.remove(&id).is_some())
    }

    async fn list_enabled_by_resource_type(
        &self,
        resource_type: &str,
    ) -> Result<Vec<DynamicTagRule>, DbError> {
        self.check_available()?;
        self.tags.check_available()?;

        let rules = self.rules.read().await;
        let tags = self.tags.tags();
        let tags = tags.read().await;

        let matched: Vec<DynamicTagRule> = rules
            .values()
            .filter(|rule| rule.enabled.is_true())
            .filter(|rule| {
                tags.get(&rule.tag_id)
                    .is_some_and(|tag| tag.resource_type == resource_type)
            })
            .cloned()
            .collect();

        debug!(
            resource_type,
            count = matched.len(),
            "Listed enabled dynamic tag rules"
        );
        Ok(matched)
    }
}
