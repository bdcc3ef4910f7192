//! Persistence layer for tags and dynamic tag rules.
//!
//! Only the repository contracts and in-memory implementations live here;
//! durable backends implement the same traits outside this crate.

mod error;
pub mod mocks;

pub mod rule_repo;
pub mod tag_repo;

pub use error::DbError;

// Re-export repository traits and types
pub use rule_repo::{DynamicTagRuleRepository, RuleFilter, RuleUpdate};
pub use tag_repo::TagRepository;
