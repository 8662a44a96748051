use crate::error::{Result, ValidationError};
use loadcheck_core::ResponseId;
use std::collections::HashMap;
use std::path::Path;

/// In-memory copy of a dictionary index file.
///
/// Keys are held unescaped, i.e. as the original message payload text.
#[derive(Debug, Clone, Default)]
pub struct DictionaryIndex {
    entries: HashMap<String, ResponseId>,
}

impl DictionaryIndex {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            ValidationError::IndexUnreadable {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Ok(Self::parse(&text))
    }

    pub fn parse(text: &str) -> Self {
        let entries = loadcheck_properties::parse(text)
            .entries
            .into_iter()
            .map(|entry| (entry.key, ResponseId::from_raw(entry.value)))
            .collect();
        Self { entries }
    }

    /// The recorded response for an original message payload.
    pub fn lookup(&self, payload: &str) -> Option<&ResponseId> {
        self.entries.get(payload)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResponseId)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}
