//! Dynamic tag evaluation engine.
//!
//! This crate decides which dynamic scheduling tags apply to a resource at
//! candidate selection time:
//!
//! - [`condition`]: the condition language (lexer, parser, evaluator)
//! - [`ResourceRegistry`]: resource type keywords bound to attribute providers
//! - [`DynamicTagEvaluator`]: single-condition and bulk rule evaluation
//! - [`RuleService`]: write-time validation of rules
//! - [`config`]: YAML configuration

pub mod condition;
pub mod config;
pub mod environment;
pub mod evaluator;
pub mod registry;
pub mod rules;

pub use condition::{Condition, ConditionError, ParseError};
pub use config::{load_config, parse_config, ConfigError, EngineConfig, RegistryConfig};
pub use environment::EvaluationEnvironment;
pub use evaluator::{
    DynamicTagEvaluator, EvaluationError, EvaluationOutcome, RuleMatch, RuleMatchReport,
    SkippedRule,
};
pub use registry::{ResourceRegistry, ResourceRole};
pub use rules::{CreateRuleInput, RuleService, RuleValidationError, UpdateRuleInput};
