use std::time::Duration;

use thiserror::Error;

/// Centralized error type for tagram.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Network interface '{0}' not found on this system")]
    InterfaceNotFound(String),

    #[error("Invalid interface name: {0}")]
    InvalidInterfaceName(String),

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("No valid socket address found for binding")]
    NoAddrAvailable,

    #[error("Host '{0}' could not be resolved")]
    HostNotFound(String),

    #[error("Unable to obtain load average")]
    LoadAverageUnavailable,

    #[error("No reply received within {0:?}")]
    Timeout(Duration),
}

/// Helper alias for `Result<T, tagram::Error>`
pub type Result<T> = std::result::Result<T, Error>;
