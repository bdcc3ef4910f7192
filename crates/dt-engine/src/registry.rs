//! Resource type registry.
//!
//! Maps resource type keywords to the providers that look up instances and
//! produce their attribute snapshots. Standalone types (the resources being
//! scheduled onto, e.g. hosts) and virtual types (the resources being placed,
//! e.g. guests) are registered and resolved independently.
//!
//! The registry is populated once during bring-up through `&mut self`
//! methods and then shared read-only behind an `Arc`.

use crate::config::{ConfigError, RegistryConfig};
use dt_core::DynamicResource;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Which side of a rule a resource type is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceRole {
    Standalone,
    Virtual,
}

impl ResourceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceRole::Standalone => "standalone",
            ResourceRole::Virtual => "virtual",
        }
    }
}

impl fmt::Display for ResourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry of resource types taking part in dynamic tag evaluation.
#[derive(Default)]
pub struct ResourceRegistry {
    standalone: HashMap<String, Arc<dyn DynamicResource>>,
    virtual_types: HashMap<String, Arc<dyn DynamicResource>>,
}

impl ResourceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry binding the keywords listed in `config`, taking
    /// providers from `catalog`.
    ///
    /// A keyword in the configuration with no provider in the catalog is an
    /// error; catalog entries the configuration does not mention are ignored.
    pub fn from_config(
        config: &RegistryConfig,
        catalog: &[Arc<dyn DynamicResource>],
    ) -> Result<Self, ConfigError> {
        let find = |keyword: &str| {
            catalog
                .iter()
                .find(|p| p.keyword() == keyword)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownResourceType(keyword.to_string()))
        };

        let mut registry = Self::new();
        for keyword in &config.standalone {
            registry.bind_standalone([find(keyword)?]);
        }
        for keyword in &config.virtual_types {
            registry.bind_virtual([find(keyword)?]);
        }
        Ok(registry)
    }

    /// Registers standalone resource types. The last registration for a
    /// keyword wins.
    pub fn bind_standalone(&mut self, handles: impl IntoIterator<Item = Arc<dyn DynamicResource>>) {
        Self::bind(&mut self.standalone, ResourceRole::Standalone, handles);
    }

    /// Registers virtual resource types. The last registration for a keyword
    /// wins.
    pub fn bind_virtual(&mut self, handles: impl IntoIterator<Item = Arc<dyn DynamicResource>>) {
        Self::bind(&mut self.virtual_types, ResourceRole::Virtual, handles);
    }

    fn bind(
        store: &mut HashMap<String, Arc<dyn DynamicResource>>,
        role: ResourceRole,
        handles: impl IntoIterator<Item = Arc<dyn DynamicResource>>,
    ) {
        for handle in handles {
            let keyword = handle.keyword().to_string();
            info!(%role, keyword = %keyword, "Registering resource type");
            store.insert(keyword, handle);
        }
    }

    /// Resolves a keyword among standalone resource types.
    pub fn resolve_standalone(&self, keyword: &str) -> Option<Arc<dyn DynamicResource>> {
        self.standalone.get(keyword).cloned()
    }

    /// Resolves a keyword among virtual resource types.
    pub fn resolve_virtual(&self, keyword: &str) -> Option<Arc<dyn DynamicResource>> {
        self.virtual_types.get(keyword).cloned()
    }

    /// Resolves a keyword for the given role.
    pub fn resolve(&self, role: ResourceRole, keyword: &str) -> Option<Arc<dyn DynamicResource>> {
        match role {
            ResourceRole::Standalone => self.resolve_standalone(keyword),
            ResourceRole::Virtual => self.resolve_virtual(keyword),
        }
    }

    /// Registered standalone keywords, sorted.
    pub fn standalone_keywords(&self) -> Vec<&str> {
        sorted_keys(&self.standalone)
    }

    /// Registered virtual keywords, sorted.
    pub fn virtual_keywords(&self) -> Vec<&str> {
        sorted_keys(&self.virtual_types)
    }
}

fn sorted_keys(map: &HashMap<String, Arc<dyn DynamicResource>>) -> Vec<&str> {
    let mut keys: Vec<&str> = map.keys().map(|k| k.as_str()).collect();
    keys.sort_unstable();
    keys
}

impl fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("standalone", &self.standalone_keywords())
            .field("virtual", &self.virtual_keywords())
            .finish()
    }
}
