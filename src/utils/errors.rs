use thiserror::Error;

/// Unified error type for the node
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias
pub type Result<T> = std::result::Result<T, NodeError>;
