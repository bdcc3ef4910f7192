//! Resource types that take part in dynamic tag evaluation.

use crate::attributes::AttributeSnapshot;
use crate::db::DbError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A concrete resource instance resolved by a [`DynamicResource`] provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Keyword of the resource type that resolved this instance.
    pub resource_type: String,
    /// Stable identifier of the instance.
    pub id: String,
    /// Human-readable name of the instance.
    pub name: String,
}

impl ResourceRef {
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Provider of live attributes for one resource type.
///
/// Implementations wrap whatever store owns the resource (a database table,
/// an inventory service) and expose the flat attribute snapshot the
/// condition language evaluates against.
#[async_trait]
pub trait DynamicResource: Send + Sync {
    /// Keyword identifying the resource type, e.g. `host` or `guest`.
    ///
    /// The keyword doubles as the namespace under which the snapshot is
    /// exposed to conditions.
    fn keyword(&self) -> &str;

    /// Looks up an instance by id or name.
    ///
    /// Returns `Ok(None)` when no such instance exists.
    async fn find_by_id_or_name(&self, id_or_name: &str) -> Result<Option<ResourceRef>, DbError>;

    /// Produces the current attribute snapshot of an instance.
    async fn attribute_snapshot(&self, resource: &ResourceRef)
        -> Result<AttributeSnapshot, DbError>;
}
