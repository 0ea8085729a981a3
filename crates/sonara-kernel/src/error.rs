//! Crate-level error types for `sonara-kernel`.
//!
//! Nothing in this module crosses a dynamic-library boundary. The wire
//! contract reports failure through sentinel values only; these types are
//! for host and plugin code above it.

use thiserror::Error;

/// Crate-level error type for `sonara-kernel`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KernelError {
    /// A configuration-related error (requires the `config` feature).
    #[cfg(feature = "config")]
    #[error("Config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// A low-level I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias using [`error_stack::Report`].
pub type KernelResult<T> = Result<T, error_stack::Report<KernelError>>;
