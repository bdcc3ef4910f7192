//! Namespaced attribute environment that conditions evaluate against.

use dt_core::{AttributeSnapshot, Scalar};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping from namespace keyword (e.g. `host`) to that resource's snapshot.
///
/// Built fresh for each evaluation and never shared between calls.
/// Serializes as `{ "host": { "sys_load": 1.2 }, "guest": { ... } }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluationEnvironment {
    namespaces: BTreeMap<String, AttributeSnapshot>,
}

impl EvaluationEnvironment {
    /// Creates an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a namespace (builder style). An existing namespace is replaced.
    pub fn with_namespace(mut self, namespace: impl Into<String>, snapshot: AttributeSnapshot) -> Self {
        self.insert(namespace, snapshot);
        self
    }

    /// Inserts a namespace, returning the snapshot it replaced.
    pub fn insert(
        &mut self,
        namespace: impl Into<String>,
        snapshot: AttributeSnapshot,
    ) -> Option<AttributeSnapshot> {
        self.namespaces.insert(namespace.into(), snapshot)
    }

    pub fn namespace(&self, namespace: &str) -> Option<&AttributeSnapshot> {
        self.namespaces.get(namespace)
    }

    /// Looks up a single attribute.
    pub fn get(&self, namespace: &str, field: &str) -> Option<&Scalar> {
        self.namespaces.get(namespace)?.get(field)
    }

    /// Namespace keywords in sorted order.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    /// Renders the environment as JSON for logs and evaluation reports.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
