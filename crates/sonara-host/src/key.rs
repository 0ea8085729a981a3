//! Stable plugin addressing
//!
//! A [`PluginKey`] names a plugin as `library:identifier`, independent of
//! where the library lives on disk or in which order libraries were loaded.

use crate::error::LoadError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PluginKey {
    library: String,
    identifier: String,
}

impl PluginKey {
    pub fn new(library: &str, identifier: &str) -> Self {
        Self {
            library: library.to_lowercase(),
            identifier: identifier.to_string(),
        }
    }

    /// Key for `identifier` inside the library at `path`
    pub fn compose(path: &Path, identifier: &str) -> Self {
        Self::new(&library_basename(path), identifier)
    }

    pub fn library(&self) -> &str {
        &self.library
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// File stem without any `lib` prefix, lowercased
pub fn library_basename(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = stem.strip_prefix("lib").filter(|s| !s.is_empty()).unwrap_or(&stem);
    stem.to_lowercase()
}

impl fmt::Display for PluginKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.library, self.identifier)
    }
}

impl FromStr for PluginKey {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((library, identifier))
                if !library.is_empty() && !identifier.is_empty() && !identifier.contains(':') =>
            {
                Ok(Self::new(library, identifier))
            }
            _ => Err(LoadError::InvalidPluginKey(s.to_string())),
        }
    }
}

impl TryFrom<String> for PluginKey {
    type Error = LoadError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PluginKey> for String {
    fn from(key: PluginKey) -> Self {
        key.to_string()
    }
}
