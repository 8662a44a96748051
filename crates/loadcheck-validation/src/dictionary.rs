use crate::error::{Result, ValidationError};
use crate::fs::{append_line, atomic_write};
use crate::index::DictionaryIndex;
use crate::{MessageValidator, Validation};
use loadcheck_core::{excerpt, Message, ResponseId};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Default index file name inside the dictionary directory.
pub const DEFAULT_INDEX_NAME: &str = "index";

const PAYLOAD_EXCERPT_CHARS: usize = 64;

/// Where a dictionary lives and which mode the validator runs in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DictionaryConfig {
    /// Writable directory holding the index and the response files.
    pub directory: PathBuf,

    /// Index file name inside `directory`.
    #[serde(default = "DictionaryConfig::default_index")]
    pub index: String,

    /// `true` records responses as correct, `false` validates against recorded ones.
    #[serde(default)]
    pub record: bool,
}

impl DictionaryConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            index: Self::default_index(),
            record: false,
        }
    }

    fn default_index() -> String {
        DEFAULT_INDEX_NAME.to_owned()
    }

    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = index.into();
        self
    }

    pub fn recording(mut self, record: bool) -> Self {
        self.record = record;
        self
    }

    pub fn index_path(&self) -> PathBuf {
        self.directory.join(&self.index)
    }

    pub fn response_path(&self, id: &ResponseId) -> PathBuf {
        self.directory.join(id.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexGuard {
    Open,
    /// Record mode found an existing index on the first call.
    Blocked,
}

/// Record/replay validator backed by a dictionary directory.
///
/// In record mode every response is stored as the correct answer for its original message.
/// In validate mode responses are compared with the recorded ones.
///
/// An existing index file is never overwritten: when recording starts against one, the
/// validator refuses every call for the rest of its lifetime. Remove the index manually to
/// record afresh.
///
/// The index is read from disk once and cached. Entries recorded afterwards through another
/// instance are not picked up unless [`DictionaryValidator::reload_index`] is called.
#[derive(Debug)]
pub struct DictionaryValidator {
    config: DictionaryConfig,
    guard: OnceLock<IndexGuard>,
    index: RwLock<Option<Arc<DictionaryIndex>>>,
    // Serialises the response write + index append pair between threads.
    write_lock: Mutex<()>,
}

impl DictionaryValidator {
    pub fn new(config: DictionaryConfig) -> Self {
        Self {
            config,
            guard: OnceLock::new(),
            index: RwLock::new(None),
            write_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &DictionaryConfig {
        &self.config
    }

    pub fn is_recording(&self) -> bool {
        self.config.record
    }

    /// Record or validate one response, reporting exactly what happened.
    pub fn check(&self, original: &Message, response: &Message) -> Result<Validation> {
        if *self.guard.get_or_init(|| self.evaluate_guard()) == IndexGuard::Blocked {
            return Err(ValidationError::IndexExists {
                path: self.config.index_path(),
            });
        }

        if self.config.record {
            self.record(original, response)
        } else {
            self.validate(original, response)
        }
    }

    fn evaluate_guard(&self) -> IndexGuard {
        let index_path = self.config.index_path();
        if self.config.record && index_path.exists() {
            tracing::error!(
                target = "loadcheck.validation",
                path = %index_path.display(),
                "error while trying to record responses - index file already exists, overwrite not permitted"
            );
            IndexGuard::Blocked
        } else {
            IndexGuard::Open
        }
    }

    /// Store `response` as the correct answer for `original`.
    ///
    /// The response file is written first and the index line appended second. There is no
    /// rollback: a failed append leaves an unreferenced response file behind.
    pub(crate) fn record(&self, original: &Message, response: &Message) -> Result<Validation> {
        let directory = &self.config.directory;
        if !directory.is_dir() {
            return Err(ValidationError::MissingDirectory {
                path: directory.clone(),
            });
        }

        let payload = response.payload_text();
        let id = ResponseId::for_payload(payload);
        let response_path = self.config.response_path(&id);
        let index_path = self.config.index_path();
        let line = loadcheck_properties::format_entry(original.payload_text(), id.as_str());

        let _write = self.write_lock.lock();
        atomic_write(&response_path, payload.as_bytes())
            .map_err(|source| record_failed(payload, &response_path, source))?;
        append_line(&index_path, &line)
            .map_err(|source| record_failed(payload, &index_path, source))?;

        tracing::debug!(
            target = "loadcheck.validation",
            id = %id,
            path = %response_path.display(),
            "recorded response"
        );
        Ok(Validation::Recorded)
    }

    pub(crate) fn validate(&self, original: &Message, response: &Message) -> Result<Validation> {
        let index = self.index()?;
        let original_payload = original.payload_text();
        let id = index
            .lookup(original_payload)
            .ok_or_else(|| ValidationError::UnknownMessage {
                payload: excerpt(original_payload, PAYLOAD_EXCERPT_CHARS),
            })?;
        if !id.is_safe_file_name() {
            return Err(ValidationError::InvalidResponseId {
                payload: excerpt(original_payload, PAYLOAD_EXCERPT_CHARS),
                id: id.to_string(),
            });
        }

        let path = self.config.response_path(id);
        let expected = std::fs::read_to_string(&path)
            .map_err(|source| ValidationError::ResponseUnreadable { path, source })?;

        if expected == response.payload_text() {
            Ok(Validation::Valid)
        } else {
            Ok(Validation::Mismatch)
        }
    }

    /// The cached index, loading it on first use. A failed load is not cached.
    fn index(&self) -> Result<Arc<DictionaryIndex>> {
        if let Some(index) = self.index.read().as_ref() {
            return Ok(Arc::clone(index));
        }

        let mut slot = self.index.write();
        if let Some(index) = slot.as_ref() {
            return Ok(Arc::clone(index));
        }
        let index = Arc::new(self.load_index()?);
        *slot = Some(Arc::clone(&index));
        Ok(index)
    }

    fn load_index(&self) -> Result<DictionaryIndex> {
        let path = self.config.index_path();
        let index = DictionaryIndex::load(&path)?;
        tracing::debug!(
            target = "loadcheck.validation",
            path = %path.display(),
            entries = index.len(),
            "loaded dictionary index"
        );
        Ok(index)
    }

    /// Re-read the index from disk, replacing the cached copy. Returns the entry count.
    pub fn reload_index(&self) -> Result<usize> {
        let index = self.load_index()?;
        let len = index.len();
        *self.index.write() = Some(Arc::new(index));
        Ok(len)
    }

    /// Number of cached index entries, if the index has been loaded.
    pub fn cached_index_len(&self) -> Option<usize> {
        self.index.read().as_ref().map(|index| index.len())
    }
}

impl MessageValidator for DictionaryValidator {
    fn is_valid(&self, original: &Message, response: &Message) -> bool {
        match self.check(original, response) {
            Ok(outcome) => outcome.is_valid(),
            // Already reported once when the guard tripped.
            Err(ValidationError::IndexExists { .. }) => {
                tracing::debug!(
                    target = "loadcheck.validation",
                    "skipping response, dictionary index already exists"
                );
                false
            }
            Err(err) if self.config.record => {
                tracing::error!(
                    target = "loadcheck.validation",
                    error = %err,
                    "error recording correct response"
                );
                false
            }
            Err(err) => {
                tracing::error!(
                    target = "loadcheck.validation",
                    error = %err,
                    "error validating response"
                );
                false
            }
        }
    }
}

fn record_failed(payload: &str, path: &Path, source: std::io::Error) -> ValidationError {
    ValidationError::RecordFailed {
        payload: excerpt(payload, PAYLOAD_EXCERPT_CHARS),
        path: path.to_path_buf(),
        source,
    }
}

/// The index key written for an original payload: the payload with `=`, `:` and the other
/// characters reserved by the index format escaped.
pub fn fingerprint(payload: &str) -> String {
    loadcheck_properties::escape_key(payload)
}
