//! Error types for the sdc client
//!
//! Four families of failure exist: transport (I/O on the reusable
//! connection), signing, protocol status (non-2xx responses mapped to a
//! specific condition), and response decoding. All of them surface to the
//! immediate caller; nothing is swallowed or retried here.

use http::StatusCode;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sdc operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure: dial, read or write on the underlying connection.
    /// The reusable connection discards its socket when this is raised.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Request signing failed; no request was sent
    #[error("Request signing failed: {0}")]
    Sign(String),

    /// Response body could not be decoded
    #[error("Malformed response: {0}")]
    Decode(String),

    /// Authentication or authorization failure (401/403)
    #[error("Access denied: {0}")]
    Auth(String),

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflicting state on the server (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Service temporarily unavailable (503)
    #[error("Service unavailable")]
    Unavailable,

    /// Any other non-success response status
    #[error("Service returned status {status}")]
    Api { status: u16 },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The consumer side of a delivery channel was dropped mid-stream
    #[error("Delivery channel closed: {0}")]
    Delivery(String),
}

impl Error {
    /// True for errors that invalidate the current connection
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Io(_))
    }
}

/// Map a response status to a success or a specific error condition.
///
/// 2xx is success; everything else maps to the closest error family.
pub fn check_status(status: StatusCode) -> Result<()> {
    match status.as_u16() {
        200..=299 => Ok(()),
        401 | 403 => Err(Error::Auth(format!("status {}", status.as_u16()))),
        404 => Err(Error::NotFound(format!("status {}", status.as_u16()))),
        409 => Err(Error::Conflict(format!("status {}", status.as_u16()))),
        503 => Err(Error::Unavailable),
        s => Err(Error::Api { status: s }),
    }
}
