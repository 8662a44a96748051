//! Response validation for load-test runs.
//!
//! The [`DictionaryValidator`] records known-correct responses into a dictionary directory and
//! later checks observed responses against them.
//!
//! ## On-disk layout
//!
//! `<directory>/`:
//! - `index` (name configurable): one `<fingerprint>=<response id>` line per recorded message,
//!   where the fingerprint is the original payload with `=`, `:` and other reserved characters
//!   escaped (see [`fingerprint`])
//! - `<response id>`: the raw response payload, one file per distinct response

mod dictionary;
mod error;
mod fs;
mod index;
mod inspect;

pub use dictionary::{fingerprint, DictionaryConfig, DictionaryValidator, DEFAULT_INDEX_NAME};
pub use error::{Result, ValidationError};
pub use index::DictionaryIndex;
pub use inspect::{inspect_dictionary, DictionaryReport, IndexEntryRef};
pub use loadcheck_core::{Message, ResponseId};

/// Successful outcome of [`DictionaryValidator::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// Record mode stored the response as correct.
    Recorded,
    /// The response matches the recorded one.
    Valid,
    /// The response differs from the recorded one.
    Mismatch,
}

impl Validation {
    pub fn is_valid(self) -> bool {
        !matches!(self, Validation::Mismatch)
    }
}

/// Decides whether a response to an original message is acceptable.
///
/// Implementations never fail: internal errors are logged and reported as `false`.
pub trait MessageValidator: Send + Sync {
    fn is_valid(&self, original: &Message, response: &Message) -> bool;
}
