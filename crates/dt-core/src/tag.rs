//! Scheduling tag data model.
//!
//! A tag is a named scheduling hint bound to one standalone resource type
//! (for example `host` or `storage`). Dynamic tag rules point at a tag and
//! derive their applicability from the tag's resource type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A scheduling tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    /// Unique identifier for this tag.
    pub id: Uuid,
    /// Human-readable, unique name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Keyword of the resource type this tag applies to.
    pub resource_type: String,
    /// Scheduling strategy hint carried for the scheduler (not interpreted here).
    pub default_strategy: Option<String>,
    /// Timestamp when the tag was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last update.
    pub updated_at: DateTime<Utc>,
}

impl Tag {
    /// Creates a new tag for the given resource type.
    pub fn new(name: impl Into<String>, resource_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            resource_type: resource_type.into(),
            default_strategy: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the description for the tag.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the default scheduling strategy.
    pub fn with_default_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.default_strategy = Some(strategy.into());
        self
    }

    /// Returns true if `id_or_name` is this tag's id or its name.
    pub fn matches_id_or_name(&self, id_or_name: &str) -> bool {
        self.name == id_or_name || self.id.to_string() == id_or_name
    }
}
