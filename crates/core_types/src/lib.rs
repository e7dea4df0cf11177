use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type RequestId = u64;

/// Whether a request produces a fresh document or refines an existing one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    #[default]
    Generate,
    Refine,
}

/// A structured choice made alongside the free-text prompt.
///
/// `Absent` round-trips as JSON `null`; it exists so callers can forward
/// form state verbatim without filtering unset fields first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectionValue {
    Absent,
    Flag(bool),
    Text(String),
    List(Vec<String>),
}

impl SelectionValue {
    /// Unset, blank, or an empty list.
    pub fn is_empty(&self) -> bool {
        match self {
            SelectionValue::Absent => true,
            SelectionValue::Flag(_) => false,
            SelectionValue::Text(s) => s.trim().is_empty(),
            SelectionValue::List(items) => items.iter().all(|s| s.trim().is_empty()),
        }
    }
}

pub type Selections = BTreeMap<String, SelectionValue>;

/// Options that persist across requests in a project.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistentOptions {
    pub brand_name: Option<String>,
    pub business_description: Option<String>,
    pub language: Option<String>,
    pub include_images: bool,
    pub extra: BTreeMap<String, String>,
}

/// Payload handed to the generator transport.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationRequest {
    pub kind: RequestKind,
    pub prompt: String,
    pub selections: Selections,
    pub options: PersistentOptions,
    /// Document being refined; only meaningful for `RequestKind::Refine`.
    pub base_document: Option<String>,
}

impl GenerationRequest {
    pub fn generate(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn refine(prompt: impl Into<String>, base_document: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::Refine,
            prompt: prompt.into(),
            base_document: Some(base_document.into()),
            ..Self::default()
        }
    }

    pub fn with_selection(mut self, name: impl Into<String>, value: SelectionValue) -> Self {
        self.selections.insert(name.into(), value);
        self
    }

    pub fn with_options(mut self, options: PersistentOptions) -> Self {
        self.options = options;
        self
    }
}

/// What a finished generation produced.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub document: String,
    /// Named documents when the response was split with file markers.
    pub files: Option<BTreeMap<String, String>>,
    /// Generator-reported usage (tokens or credits), zero when unknown.
    pub usage: u64,
}
