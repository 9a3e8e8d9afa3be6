use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Store-layer errors. The storable layer propagates these unchanged.
///
/// A missing document is not an error at this boundary: `get` returns
/// `Ok(None)` and `remove` returns `Ok(false)`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The request itself is malformed (empty id, document without `id`)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A stored document could not be encoded or decoded by the driver
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The underlying database or service failed
    #[error("backend error: {0}")]
    Backend(String),
}
