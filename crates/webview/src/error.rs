use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to load webview library: {0}")]
    LibraryLoad(String),

    #[error("Failed to create web view")]
    CreationFailed,

    #[error("Web view has been destroyed")]
    Destroyed,

    #[error("String contains an interior NUL byte at offset {0}")]
    InteriorNul(usize),

    #[error("Invalid size hint: {0}")]
    InvalidSizeHint(String),

    #[error("Malformed binding request: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Failed to encode binding result: {0}")]
    Encode(String),

    #[error("No async runtime available for async binding")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, Error>;
