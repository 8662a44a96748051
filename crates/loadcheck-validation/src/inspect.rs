use crate::dictionary::DictionaryConfig;
use crate::error::{Result, ValidationError};
use crate::fs::TMP_MARKER;
use loadcheck_core::{excerpt, ResponseId};
use serde::Serialize;
use std::collections::BTreeSet;

/// Consistency summary of a dictionary directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryReport {
    pub entries: usize,
    pub response_files: usize,
    /// Index entries whose response file is absent (or not a safe file name).
    pub missing_responses: Vec<IndexEntryRef>,
    /// Entries overridden by a later line for the same message.
    pub shadowed: Vec<IndexEntryRef>,
    /// Files in the directory that no index entry points to.
    pub unreferenced_files: Vec<String>,
}

impl DictionaryReport {
    pub fn is_consistent(&self) -> bool {
        self.missing_responses.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntryRef {
    pub line: usize,
    pub message: String,
    pub response_id: String,
}

/// Cross-check an index file against the response files next to it.
pub fn inspect_dictionary(config: &DictionaryConfig) -> Result<DictionaryReport> {
    let index_path = config.index_path();
    let text =
        std::fs::read_to_string(&index_path).map_err(|source| ValidationError::IndexUnreadable {
            path: index_path.clone(),
            source,
        })?;
    let parsed = loadcheck_properties::parse(&text);

    let to_ref = |entry: &loadcheck_properties::PropertyEntry| IndexEntryRef {
        line: entry.line,
        message: excerpt(&entry.key, 64),
        response_id: entry.value.clone(),
    };

    let mut referenced = BTreeSet::new();
    let mut missing_responses = Vec::new();
    for entry in &parsed.entries {
        let id = ResponseId::from_raw(entry.value.as_str());
        if id.is_safe_file_name() && config.response_path(&id).is_file() {
            referenced.insert(entry.value.clone());
        } else {
            missing_responses.push(to_ref(entry));
        }
    }

    let mut response_files = 0usize;
    let mut unreferenced_files = Vec::new();
    let unreadable = |source| ValidationError::DirectoryUnreadable {
        path: config.directory.clone(),
        source,
    };
    for entry in std::fs::read_dir(&config.directory).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        if !entry.file_type().is_ok_and(|ty| ty.is_file()) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == config.index || name.contains(TMP_MARKER) {
            continue;
        }
        if referenced.contains(&name) {
            response_files += 1;
        } else {
            unreferenced_files.push(name);
        }
    }
    unreferenced_files.sort();

    Ok(DictionaryReport {
        entries: parsed.len(),
        response_files,
        missing_responses,
        shadowed: parsed.shadowed().into_iter().map(to_ref).collect(),
        unreferenced_files,
    })
}
