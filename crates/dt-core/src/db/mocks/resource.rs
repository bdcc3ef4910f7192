//! Mock implementation of DynamicResource for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::attributes::{AttributeSnapshot, Scalar};
use crate::db::DbError;
use crate::resource::{DynamicResource, ResourceRef};

/// In-memory resource type holding fixed instances and their attributes.
pub struct MockResourceProvider {
    keyword: String,
    instances: RwLock<HashMap<String, (ResourceRef, AttributeSnapshot)>>,
    lookups: AtomicUsize,
    unavailable: AtomicBool,
}

impl MockResourceProvider {
    /// Creates an empty provider for `keyword`.
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            instances: RwLock::new(HashMap::new()),
            lookups: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Adds an instance with the given attributes (builder style).
    pub fn with_instance<K, V>(
        mut self,
        id: &str,
        name: &str,
        attributes: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<Scalar>,
    {
        let snapshot: AttributeSnapshot = attributes
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let resource = ResourceRef::new(self.keyword.clone(), id, name);
        self.instances
            .get_mut()
            .insert(id.to_string(), (resource, snapshot));
        self
    }

    /// Replaces the attributes of an existing instance.
    pub async fn set_attributes(&self, id: &str, snapshot: AttributeSnapshot) -> bool {
        let mut instances = self.instances.write().await;
        match instances.get_mut(id) {
            Some(entry) => {
                entry.1 = snapshot;
                true
            }
            None => false,
        }
    }

    /// Number of `find_by_id_or_name` calls served so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Makes every subsequent call fail with a connection error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), DbError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DbError::Connection(format!(
                "{} store unavailable",
                self.keyword
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DynamicResource for MockResourceProvider {
    fn keyword(&self) -> &str {
        &self.keyword
    }

    async fn find_by_id_or_name(&self, id_or_name: &str) -> Result<Option<ResourceRef>, DbError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let instances = self.instances.read().await;
        if let Some((resource, _)) = instances.get(id_or_name) {
            return Ok(Some(resource.clone()));
        }
        Ok(instances
            .values()
            .find(|(resource, _)| resource.name == id_or_name)
            .map(|(resource, _)| resource.clone()))
    }

    async fn attribute_snapshot(
        &self,
        resource: &ResourceRef,
    ) -> Result<AttributeSnapshot, DbError> {
        self.check_available()?;
        let instances = self.instances.read().await;
        instances
            .get(&resource.id)
            .map(|(_, snapshot)| snapshot.clone())
            .ok_or_else(|| DbError::not_found(&self.keyword, &resource.id))
    }
}
