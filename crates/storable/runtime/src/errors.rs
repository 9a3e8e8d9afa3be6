//! Error types for the storable layer

use component_runtime::ComponentError;
use storable_store::StoreError;

/// Errors that can occur in storable operations
#[derive(Debug, thiserror::Error)]
pub enum StorableError {
    #[error("cannot find a `{component}` with id `{id}`")]
    NotFound { component: String, id: String },

    #[error("component `{0}` has no identifier")]
    MissingIdentifier(String),

    #[error("component `{0}` is not storable (it is embedded or has no `id` attribute)")]
    NotStorable(String),

    /// A different instance for the same identity is already loaded
    #[error("another `{component}` instance with id `{id}` is already loaded in this layer")]
    IdentityConflict { component: String, id: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("hook failed: {0}")]
    Hook(String),

    #[error(transparent)]
    Component(#[from] ComponentError),

    /// Store-boundary errors, propagated unchanged
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type alias for storable operations
pub type StorableResult<T> = Result<T, StorableError>;
