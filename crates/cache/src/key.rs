use core_types::{GenerationRequest, PersistentOptions, SelectionValue, Selections};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

const KEY_PREFIX: &str = "gen_";
const DIGEST_BYTES: usize = 16;

/// Identity of a generation request: `gen_` plus 32 lowercase hex digits.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CacheKey(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed cache key {0:?}")]
pub struct InvalidKey(pub String);

impl CacheKey {
    pub fn parse(raw: &str) -> Result<Self, InvalidKey> {
        let digits = raw
            .strip_prefix(KEY_PREFIX)
            .ok_or_else(|| InvalidKey(raw.to_string()))?;
        let well_formed = digits.len() == DIGEST_BYTES * 2
            && digits.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if well_formed {
            Ok(Self(raw.to_string()))
        } else {
            Err(InvalidKey(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CacheKey {
    type Error = InvalidKey;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize)]
struct KeyMaterial<'a> {
    prompt: String,
    selections: BTreeMap<&'a str, &'a SelectionValue>,
    options: BTreeMap<&'static str, String>,
}

/// Derive the cache key for a prompt plus the choices that shape its output.
///
/// Insensitive to prompt case and surrounding whitespace, to selection order,
/// to empty selections and to persistent options other than the brand name
/// and business description.
pub fn derive_key(prompt: &str, selections: &Selections, options: &PersistentOptions) -> CacheKey {
    let selections = selections
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| (name.as_str(), value))
        .collect();

    let mut kept = BTreeMap::new();
    for (field, value) in [
        ("brand_name", &options.brand_name),
        ("business_description", &options.business_description),
    ] {
        if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            kept.insert(field, value.to_string());
        }
    }

    let material = KeyMaterial {
        prompt: prompt.trim().to_lowercase(),
        selections,
        options: kept,
    };
    // Maps of strings and selection values always serialize.
    let bytes = serde_json::to_vec(&material).unwrap_or_default();

    let digest = Sha256::digest(&bytes);
    CacheKey(format!("{KEY_PREFIX}{}", hex::encode(&digest[..DIGEST_BYTES])))
}

pub fn derive_key_for(request: &GenerationRequest) -> CacheKey {
    derive_key(&request.prompt, &request.selections, &request.options)
}
