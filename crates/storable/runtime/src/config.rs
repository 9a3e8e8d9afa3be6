//! Layer configuration

use crate::errors::{StorableError, StorableResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables shared by a root layer and every layer forked from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorableConfig {
    /// Run component validators before every save
    pub validate_on_save: bool,

    /// Limit applied to `find` when the caller gives none
    pub default_find_limit: Option<usize>,

    /// Upper bound for any `find` limit
    pub max_find_limit: Option<usize>,

    /// Drop per-identity locks once no task holds or awaits them
    pub release_idle_locks: bool,
}

impl Default for StorableConfig {
    fn default() -> Self {
        Self {
            validate_on_save: true,
            default_find_limit: None,
            max_find_limit: None,
            release_idle_locks: true,
        }
    }
}

impl StorableConfig {
    pub fn from_toml_str(contents: &str) -> StorableResult<Self> {
        toml::from_str(contents).map_err(|e| StorableError::Config(e.to_string()))
    }

    /// Load configuration from file, falling back to defaults when it does
    /// not exist
    pub fn load(path: impl AsRef<Path>) -> StorableResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            let contents =
                std::fs::read_to_string(path).map_err(|e| StorableError::Config(e.to_string()))?;
            Self::from_toml_str(&contents)
        } else {
            Ok(Self::default())
        }
    }

    /// Limit for a find request once defaults and the cap are applied
    pub fn effective_limit(&self, requested: Option<usize>) -> Option<usize> {
        let limit = requested.or(self.default_find_limit);
        match (limit, self.max_find_limit) {
            (Some(limit), Some(max)) => Some(limit.min(max)),
            (None, Some(max)) => Some(max),
            (limit, None) => limit,
        }
    }
}
