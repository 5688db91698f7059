use thiserror::Error;

/// Errors produced inside the relay's connection handlers.
///
/// Store failures never cross a connection boundary: the router converts
/// them into a generic failure reply (or a silent drop) at dispatch time.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("store error: {0}")]
    Store(#[from] banter_store::StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RelayError>;
