use std::io;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Anything coming back from the object store, its credentials or its
    /// HTTP dispatcher.
    #[error("{context}: {source}")]
    Store { context: String, source: BoxError },
    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("invalid selection: {0}")]
    InvalidSelection(String),
    #[error("object key {0:?} does not end in a file name")]
    InvalidKey(String),
    #[error("object s3://{bucket}/{key} does not exist")]
    ObjectNotFound { bucket: String, key: String },
    #[error("s3://{bucket}/{key} ended after {received} of {expected} bytes")]
    IncompleteBody {
        bucket: String,
        key: String,
        expected: u64,
        received: u64,
    },
    #[error("unknown region {0:?}")]
    InvalidRegion(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    pub(crate) fn store(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Store {
            context: context.into(),
            source: source.into(),
        }
    }

    /// True for failures reported by the object store itself (network,
    /// auth, service side), as opposed to local validation or I/O.
    pub fn is_store(&self) -> bool {
        matches!(
            self,
            Self::Store { .. } | Self::ObjectNotFound { .. } | Self::IncompleteBody { .. }
        )
    }
}
