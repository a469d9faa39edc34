//! Injection configuration handed to the injection service.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Describes which runtime module to inject and how to configure it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct InjectionConfiguration {
    /// Path of the runtime module to load into the target.
    pub module_path: PathBuf,
    /// Properties forwarded to the module once loaded.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl InjectionConfiguration {
    /// Configuration for `module_path` with no properties.
    #[must_use]
    pub fn new(module_path: impl Into<PathBuf>) -> Self {
        Self {
            module_path: module_path.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Add a property, replacing any previous value for `key`.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}
