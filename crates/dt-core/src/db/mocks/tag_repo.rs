//! Mock implementation of TagRepository for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::{DbError, TagRepository};
use crate::tag::Tag;

/// Mock implementation of TagRepository using in-memory storage.
pub struct MockTagRepository {
    tags: Arc<RwLock<HashMap<Uuid, Tag>>>,
    unavailable: AtomicBool,
}

impl Default for MockTagRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTagRepository {
    /// Creates a new mock repository.
    pub fn new() -> Self {
        Self {
            tags: Arc::new(RwLock::new(HashMap::new())),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Creates a mock repository pre-populated with tags.
    pub fn with_tags(tags: Vec<Tag>) -> Self {
        let map: HashMap<Uuid, Tag> = tags.into_iter().map(|t| (t.id, t)).collect();
        Self {
            tags: Arc::new(RwLock::new(map)),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent call fail with a connection error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub(crate) fn check_available(&self) -> Result<(), DbError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DbError::Connection("tag store unavailable".to_string()));
        }
        Ok(())
    }

    /// Shared handle to the tag map, used to join rules against tags.
    pub(crate) fn tags(&self) -> Arc<RwLock<HashMap<Uuid, Tag>>> {
        Arc::clone(&self.tags)
    }
}

#[async_trait]
impl TagRepository for MockTagRepository {
    async fn create(&self, tag: &Tag) -> Result<Tag, DbError> {
        self.check_available()?;
        let mut tags = self.tags.write().await;

        if tags.contains_key(&tag.id) {
            return Err(DbError::Constraint(format!(
                "Tag with id '{}' already exists",
                tag.id
            )));
        }

        if tags.values().any(|existing| existing.name == tag.name) {
            return Err(DbError::Constraint(format!(
                "Tag with name '{}' already exists",
                tag.name
            )));
        }

        tags.insert(tag.id, tag.clone());
        Ok(tag.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Tag>, DbError> {
        self.check_available()?;
        let tags = self.tags.read().await;
        Ok(tags.get(&id).cloned())
    }

    async fn get_by_id_or_name(&self, id_or_name: &str) -> Result<Option<Tag>, DbError> {
        self.check_available()?;
        let tags = self.tags.read().await;
        Ok(tags
            .values()
            .find(|t| t.matches_id_or_name(id_or_name))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Tag>, DbError> {
        self.check_available()?;
        let tags = self.tags.read().await;
        let mut result: Vec<Tag> = tags.values().cloned().collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        self.check_available()?;
        let mut tags = self.tags.write().await;
        Ok(tags.remove(&id).is_some())
    }
}
