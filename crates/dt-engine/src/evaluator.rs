//! Dynamic tag evaluation protocol.
//!
//! Given a standalone resource (e.g. a host) and a virtual resource (e.g. a
//! guest being placed on it), the evaluator resolves both through the
//! [`ResourceRegistry`], snapshots their attributes into an
//! [`EvaluationEnvironment`] and evaluates rule conditions against it.
//!
//! Two entry points exist: single-condition evaluation for testing and
//! debugging a rule, and bulk matching of every enabled rule for a resource
//! type during the scheduler's candidate filtering pass.

use crate::condition::{BinaryOp, Condition, ConditionError, ParseError, DEFAULT_MAX_DEPTH};
use crate::config::{EngineConfig, DEFAULT_MAX_CONDITION_LENGTH};
use crate::environment::EvaluationEnvironment;
use crate::registry::{ResourceRegistry, ResourceRole};
use dt_core::db::{DbError, DynamicTagRuleRepository, TagRepository};
use dt_core::{DynamicResource, DynamicTagRule, ResourceRef, ScalarKind, Tag};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Errors that can occur while evaluating dynamic tag rules.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Invalid condition: {0}")]
    Parse(#[from] ParseError),

    #[error("{role} resource type '{keyword}' is not supported")]
    ResourceTypeNotSupported { role: ResourceRole, keyword: String },

    #[error("{resource_type} '{id_or_name}' not found")]
    ResourceNotFound {
        resource_type: String,
        id_or_name: String,
    },

    #[error("Undefined reference '{reference}': {detail}")]
    UndefinedReference { reference: String, detail: String },

    #[error("Type mismatch: cannot apply '{op}' to {left} and {right}")]
    TypeMismatch {
        op: BinaryOp,
        left: ScalarKind,
        right: ScalarKind,
    },

    #[error("Dynamic tag rule '{0}' not found")]
    RuleNotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] DbError),
}

impl From<ConditionError> for EvaluationError {
    fn from(err: ConditionError) -> Self {
        match err {
            ConditionError::Parse(e) => EvaluationError::Parse(e),
            ConditionError::UndefinedReference { reference, detail } => {
                EvaluationError::UndefinedReference { reference, detail }
            }
            ConditionError::TypeMismatch { op, left, right } => {
                EvaluationError::TypeMismatch { op, left, right }
            }
        }
    }
}

/// Result of evaluating one condition for a resource pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    /// Whether the condition held.
    pub matched: bool,
    /// The exact attribute values the condition was evaluated against.
    pub environment: EvaluationEnvironment,
}

/// A rule whose condition held, with its resolved tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMatch {
    pub rule: DynamicTagRule,
    pub tag: Tag,
}

/// A rule left out of a bulk evaluation and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRule {
    pub rule_id: Uuid,
    pub rule_name: String,
    pub reason: String,
}

/// Outcome of evaluating every enabled rule for a resource type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleMatchReport {
    /// Rules whose condition held.
    pub matched: Vec<RuleMatch>,
    /// Rules whose condition evaluated to false.
    pub unmatched: Vec<Uuid>,
    /// Rules that could not be evaluated.
    pub skipped: Vec<SkippedRule>,
}

impl RuleMatchReport {
    /// Tags of the matching rules, de-duplicated, in match order.
    pub fn tags(&self) -> Vec<Tag> {
        let mut tags: Vec<Tag> = Vec::new();
        for m in &self.matched {
            if !tags.iter().any(|t| t.id == m.tag.id) {
                tags.push(m.tag.clone());
            }
        }
        tags
    }
}

/// Evaluates dynamic tag rules against live resource attributes.
pub struct DynamicTagEvaluator {
    registry: Arc<ResourceRegistry>,
    rules: Arc<dyn DynamicTagRuleRepository>,
    tags: Arc<dyn TagRepository>,
    max_condition_length: usize,
    max_depth: usize,
}

impl DynamicTagEvaluator {
    /// Creates a new evaluator.
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

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Parses `condition`, reporting the first syntax error.
    ///
    /// Conditions longer than the configured maximum are rejected before
    /// parsing.
    pub fn validate(&self, condition: &str) -> Result<(), ParseError> {
        self.parse(condition).map(|_| ())
    }

    fn parse(&self, condition: &str) -> Result<Condition, ParseError> {
        if condition.len() > self.max_condition_length {
            return Err(ParseError::new(
                format!(
                    "condition is {} bytes long, the limit is {}",
                    condition.len(),
                    self.max_condition_length
                ),
                self.max_condition_length,
            ));
        }
        Condition::parse_with_max_depth(condition, self.max_depth)
    }

    /// Resolves both resources and builds the namespaced environment.
    ///
    /// Both resource type keywords are checked against the registry before
    /// any lookup is attempted.
    #[instrument(skip(self))]
    pub async fn build_environment(
        &self,
        standalone_type: &str,
        standalone_ref: &str,
        virtual_type: &str,
        virtual_ref: &str,
    ) -> Result<EvaluationEnvironment, EvaluationError> {
        let standalone = self.resolve_type(ResourceRole::Standalone, standalone_type)?;
        let virtual_handle = self.resolve_type(ResourceRole::Virtual, virtual_type)?;

        let standalone_obj = fetch_resource(standalone.as_ref(), standalone_ref).await?;
        let virtual_obj = fetch_resource(virtual_handle.as_ref(), virtual_ref).await?;

        let standalone_desc = standalone.attribute_snapshot(&standalone_obj).await?;
        let virtual_desc = virtual_handle.attribute_snapshot(&virtual_obj).await?;

        let mut env = EvaluationEnvironment::new();
        env.insert(standalone.keyword(), standalone_desc);
        env.insert(virtual_handle.keyword(), virtual_desc);
        Ok(env)
    }

    fn resolve_type(
        &self,
        role: ResourceRole,
        keyword: &str,
    ) -> Result<Arc<dyn DynamicResource>, EvaluationError> {
        self.registry
            .resolve(role, keyword)
            .ok_or_else(|| EvaluationError::ResourceTypeNotSupported {
                role,
                keyword: keyword.to_string(),
            })
    }

    /// Evaluates `condition` for a standalone/virtual resource pair.
    ///
    /// Returns the boolean result together with the environment it was
    /// computed from.
    #[instrument(skip(self, condition))]
    pub async fn evaluate(
        &self,
        standalone_type: &str,
        standalone_ref: &str,
        virtual_type: &str,
        virtual_ref: &str,
        condition: &str,
    ) -> Result<EvaluationOutcome, EvaluationError> {
        let parsed = self.parse(condition)?;
        let environment = self
            .build_environment(standalone_type, standalone_ref, virtual_type, virtual_ref)
            .await?;

        debug!(
            condition,
            environment = %environment.to_json(),
            "Dynamic tag evaluate input"
        );

        let matched = parsed.evaluate(&environment)?;
        Ok(EvaluationOutcome {
            matched,
            environment,
        })
    }

    /// Evaluates a stored rule, looked up by id or name, for a resource pair.
    #[instrument(skip(self))]
    pub async fn evaluate_rule(
        &self,
        rule_id_or_name: &str,
        standalone_type: &str,
        standalone_ref: &str,
        virtual_type: &str,
        virtual_ref: &str,
    ) -> Result<EvaluationOutcome, EvaluationError> {
        let rule = self
            .rules
            .get_by_id_or_name(rule_id_or_name)
            .await?
            .ok_or_else(|| EvaluationError::RuleNotFound(rule_id_or_name.to_string()))?;

        self.evaluate(
            standalone_type,
            standalone_ref,
            virtual_type,
            virtual_ref,
            &rule.condition,
        )
        .await
    }

    /// Evaluates every enabled rule applicable to `standalone_type`.
    ///
    /// A rule that fails to evaluate, or whose tag cannot be resolved, is
    /// reported in [`RuleMatchReport::skipped`] and does not stop the
    /// remaining rules. Failing to query the rule store is an error.
    #[instrument(skip(self, environment))]
    pub async fn match_rules(
        &self,
        standalone_type: &str,
        environment: &EvaluationEnvironment,
    ) -> Result<RuleMatchReport, EvaluationError> {
        let rules = self
            .rules
            .list_enabled_by_resource_type(standalone_type)
            .await?;

        let mut report = RuleMatchReport::default();
        for rule in rules {
            let result = self
                .parse(&rule.condition)
                .map_err(ConditionError::from)
                .and_then(|condition| condition.evaluate(environment));

            match result {
                Ok(true) => match self.tags.get(rule.tag_id).await {
                    Ok(Some(tag)) => {
                        debug!(rule = %rule.name, tag = %tag.name, "Dynamic tag rule matched");
                        report.matched.push(RuleMatch { rule, tag });
                    }
                    Ok(None) => {
                        warn!(rule = %rule.name, tag_id = %rule.tag_id, "Rule skipped, tag no longer exists");
                        report.skipped.push(SkippedRule {
                            rule_id: rule.id,
                            rule_name: rule.name,
                            reason: format!("tag {} not found", rule.tag_id),
                        });
                    }
                    Err(err) => {
                        warn!(rule = %rule.name, tag_id = %rule.tag_id, reason = %err, "Rule skipped, tag lookup failed");
                        report.skipped.push(SkippedRule {
                            rule_id: rule.id,
                            rule_name: rule.name,
                            reason: format!("tag {} lookup failed: {}", rule.tag_id, err),
                        });
                    }
                },
                Ok(false) => report.unmatched.push(rule.id),
                Err(err) => {
                    warn!(rule = %rule.name, reason = %err, "Rule skipped");
                    report.skipped.push(SkippedRule {
                        rule_id: rule.id,
                        rule_name: rule.name,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            resource_type = standalone_type,
            matched = report.matched.len(),
            unmatched = report.unmatched.len(),
            skipped = report.skipped.len(),
            "Evaluated dynamic tag rules"
        );
        Ok(report)
    }

    /// Tags of every enabled rule for `standalone_type` whose condition holds.
    pub async fn list_applicable_tags(
        &self,
        standalone_type: &str,
        environment: &EvaluationEnvironment,
    ) -> Result<Vec<Tag>, EvaluationError> {
        Ok(self.match_rules(standalone_type, environment).await?.tags())
    }
}

async fn fetch_resource(
    handle: &dyn DynamicResource,
    id_or_name: &str,
) -> Result<ResourceRef, EvaluationError> {
    handle
        .find_by_id_or_name(id_or_name)
        .await?
        .ok_or_else(|| EvaluationError::ResourceNotFound {
            resource_type: handle.keyword().to_string(),
            id_or_name: id_or_name.to_string(),
        })
}
