//! Layered error types.
//!
//! - [`Error`] - Top-level error type for all client operations
//! - [`ConfigError`] - Declaration and dispatch-time programming errors
//! - [`HttpError`] - Uniform wrapper around backend transport failures and
//!   unhandled error statuses
//! - [`TransportError`] - The original backend error, preserved for
//!   inspection

mod config_error;
mod http_error;

pub use config_error::ConfigError;
pub use http_error::{HttpError, TransportError};

/// Top-level error for declarative client operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A programming mistake in declarations or call arguments. Never
    /// retried or recovered; fails immediately and loudly.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A transport failure or an error status with no registered handler.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// A response body could not be decoded as JSON.
    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}
