use thiserror::Error;

/// Errors surfaced by the persistence layer and the operations built on it.
///
/// Absence is never an error here: a missing document is `Ok(None)` at the
/// repository level. These variants represent real failures that must reach
/// the caller, since swallowing them would mean silent data loss.
#[derive(Debug, Error)]
pub enum Error {
    /// The backing store refused the write (quota or capacity exceeded).
    #[error("store capacity exceeded: {needed} bytes needed, {available} available")]
    CapacityExceeded { needed: usize, available: usize },

    /// I/O failure talking to the backing store.
    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be serialized for storage.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A store or listener lock was poisoned.
    #[error("lock poisoned")]
    Lock,

    /// A document that a tree operation requires could not be read, either
    /// before the operation or during verify-after-write.
    #[error("document {id} missing from store")]
    MissingDocument { id: String },
}

pub type Result<T> = std::result::Result<T, Error>;
