//! Partition classes and generation-scoped partition naming.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

/// Kind of content a partition holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionClass {
    /// App shell pages and icons precached on install.
    Shell,
    /// Content-hashed build assets.
    Static,
    /// Image optimization responses.
    Image,
    /// Runtime assets and navigation copies.
    Dynamic,
}

impl PartitionClass {
    pub const ALL: [PartitionClass; 4] =
        [PartitionClass::Shell, PartitionClass::Static, PartitionClass::Image, PartitionClass::Dynamic];

    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionClass::Shell => "shell",
            PartitionClass::Static => "static",
            PartitionClass::Image => "image",
            PartitionClass::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for PartitionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partition names for one build generation.
///
/// Names have the form `{prefix}-{class}-{generation}`, so every class has
/// exactly one current partition per generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
    prefix: String,
    generation: String,
}

impl CacheNames {
    pub fn new(prefix: impl Into<String>, generation: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), generation: generation.into() }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.cache_prefix.clone(), config.generation.clone())
    }

    pub fn generation(&self) -> &str {
        &self.generation
    }

    pub fn name(&self, class: PartitionClass) -> String {
        format!("{}-{}-{}", self.prefix, class, self.generation)
    }

    /// Names of every current partition.
    pub fn all(&self) -> Vec<String> {
        PartitionClass::ALL.iter().map(|class| self.name(*class)).collect()
    }
}

/// Handle to an opened partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePartition {
    pub name: String,
    pub class: PartitionClass,
}
