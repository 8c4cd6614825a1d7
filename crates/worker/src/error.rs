//! Errors of the stdio host.

/// Errors raised while serving the line protocol.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// A line was not a valid command.
    #[error("INVALID_COMMAND: {0}")]
    InvalidCommand(#[from] serde_json::Error),

    /// A command referenced an unusable URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Reading or writing the transport failed.
    #[error("IO_ERROR: {0}")]
    Io(#[from] std::io::Error),

    /// The engine reported an error.
    #[error(transparent)]
    Engine(#[from] tillcache_core::Error),
}
