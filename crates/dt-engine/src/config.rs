//! YAML configuration loader for the dynamic tag engine.
//!
//! ```yaml
//! max_condition_length: 1024
//! max_depth: 64
//! registry:
//!   standalone: [host, storage]
//!   virtual: [guest, disk]
//! ```
//!
//! `${VAR}` placeholders are replaced from the environment before parsing.

use crate::condition::DEFAULT_MAX_DEPTH;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use thiserror::Error;

/// Longest condition accepted at rule write time.
pub const DEFAULT_MAX_CONDITION_LENGTH: usize = 1024;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML configuration: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("No provider available for resource type '{0}'")]
    UnknownResourceType(String),
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum length, in bytes, of a rule condition.
    #[serde(default = "default_max_condition_length")]
    pub max_condition_length: usize,
    /// Maximum parenthesis nesting in a condition.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Resource types bound at bring-up.
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Resource type keywords to bind for each role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub standalone: Vec<String>,
    #[serde(default, rename = "virtual")]
    pub virtual_types: Vec<String>,
}

fn default_max_condition_length() -> usize {
    DEFAULT_MAX_CONDITION_LENGTH
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_condition_length: DEFAULT_MAX_CONDITION_LENGTH,
            max_depth: DEFAULT_MAX_DEPTH,
            registry: RegistryConfig::default(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            standalone: vec!["host".to_string(), "storage".to_string()],
            virtual_types: vec!["guest".to_string(), "disk".to_string()],
        }
    }
}

/// Substitutes environment variables in a string.
///
/// Replaces patterns like `${VAR_NAME}` with the corresponding environment variable value.
fn substitute_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
    let mut missing = Vec::new();

    let result = re.replace_all(input, |caps: &regex::Captures<'_>| {
        let var_name = &caps[1];
        match env::var(var_name) {
            Ok(value) => value,
            Err(_) => {
                missing.push(var_name.to_string());
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        return Err(ConfigError::EnvVarNotFound(missing.join(", ")));
    }

    Ok(result.into_owned())
}

/// Loads and validates the engine configuration from a YAML file.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates the engine configuration from YAML text.
pub fn parse_config(content: &str) -> Result<EngineConfig, ConfigError> {
    let content = substitute_env_vars(content)?;
    let config: EngineConfig = serde_yaml::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Keywords double as condition namespaces, so they must lex as identifiers.
fn is_identifier(keyword: &str) -> bool {
    let mut chars = keyword.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && keyword != "true" && keyword != "false"
}

fn validate_config(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.max_condition_length == 0 {
        return Err(ConfigError::InvalidValue(
            "max_condition_length must be greater than 0".to_string(),
        ));
    }
    if config.max_depth == 0 {
        return Err(ConfigError::InvalidValue(
            "max_depth must be greater than 0".to_string(),
        ));
    }

    for keyword in config
        .registry
        .standalone
        .iter()
        .chain(config.registry.virtual_types.iter())
    {
        if !is_identifier(keyword) {
            return Err(ConfigError::InvalidValue(format!(
                "resource type '{}' is not a valid identifier",
                keyword
            )));
        }
    }

    Ok(())
}
