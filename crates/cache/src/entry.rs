use crate::key::CacheKey;
use core_types::GenerationResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A stored generation result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Write time, milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub document: String,
    #[serde(default)]
    pub auxiliary_files: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub usage: u64,
}

impl CacheEntry {
    pub fn new(timestamp: u64, result: &GenerationResult) -> Self {
        Self {
            timestamp,
            document: result.document.clone(),
            auxiliary_files: result.files.clone(),
            usage: result.usage,
        }
    }

    pub fn into_result(self) -> GenerationResult {
        GenerationResult {
            document: self.document,
            files: self.auxiliary_files,
            usage: self.usage,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub key: CacheKey,
    pub timestamp: u64,
}
