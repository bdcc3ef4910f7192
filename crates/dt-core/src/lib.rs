//! # dt-core
//!
//! Data model and persistence contracts for dynamic scheduling tags.
//!
//! This crate defines the scalar attribute model shared by every resource
//! type, the tag and dynamic tag rule entities, the provider trait that
//! resource types implement to take part in rule evaluation, and the
//! repository traits (with in-memory implementations) for rules and tags.

pub mod attributes;
pub mod db;
pub mod resource;
pub mod rule;
pub mod tag;

pub use attributes::{AttributeSnapshot, Scalar, ScalarKind};
pub use resource::{DynamicResource, ResourceRef};
pub use rule::{DynamicTagRule, TriState};
pub use tag::Tag;
