use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, ValidationError>;

/// Failures while recording or validating a response.
///
/// A response that simply differs from the recorded one is not an error; see
/// [`crate::Validation::Mismatch`].
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("index file {path} already exists, overwrite not permitted")]
    IndexExists { path: PathBuf },

    #[error("dictionary directory {path} does not exist")]
    MissingDirectory { path: PathBuf },

    #[error("unable to load index file {path}: {source}")]
    IndexUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to list dictionary directory {path}: {source}")]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no recorded response for message '{payload}'")]
    UnknownMessage { payload: String },

    #[error("index entry for message '{payload}' names an invalid response file {id:?}")]
    InvalidResponseId { payload: String, id: String },

    #[error("cannot read correct response from file {path}: {source}")]
    ResponseUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot record correct response '{payload}' to {path}: {source}")]
    RecordFailed {
        payload: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ValidationError {
    /// Whether the failure came from the filesystem rather than from dictionary content.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Self::IndexUnreadable { .. }
                | Self::DirectoryUnreadable { .. }
                | Self::ResponseUnreadable { .. }
                | Self::RecordFailed { .. }
        )
    }
}
