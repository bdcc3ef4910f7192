//! Tag repository contract.

use super::DbError;
use crate::tag::Tag;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository trait for tag persistence.
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Creates a new tag.
    async fn create(&self, tag: &Tag) -> Result<Tag, DbError>;

    /// Gets a tag by ID.
    async fn get(&self, id: Uuid) -> Result<Option<Tag>, DbError>;

    /// Gets a tag by ID or by name.
    async fn get_by_id_or_name(&self, id_or_name: &str) -> Result<Option<Tag>, DbError>;

    /// Lists all tags ordered by name.
    async fn list(&self) -> Result<Vec<Tag>, DbError>;

    /// Deletes a tag.
    async fn delete(&self, id: Uuid) -> Result<bool, DbError>;
}
