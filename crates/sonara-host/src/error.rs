//! Host-side error types
//!
//! Loader operations return [`LoadResult`], an `error_stack` report whose
//! context is a [`LoadError`]; library paths and plugin keys are attached
//! to the report as printable context. Summary reductions use the plain
//! [`SummaryError`].

use error_stack::Report;

/// Why a library or plugin could not be loaded
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error("ABI version mismatch: expected {expected}, plugin declares {found}")]
    AbiVersionMismatch { expected: u32, found: u32 },

    #[error("Failed to load library: {0}")]
    LibraryLoad(String),

    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Descriptor is missing operation table entries")]
    IncompleteDescriptor,

    #[error("Unknown plugin: {0}")]
    UnknownPlugin(String),

    #[error("Invalid plugin key: {0}")]
    InvalidPluginKey(String),

    #[error("Plugin instantiation failed: {0}")]
    InstantiationFailure(String),

    #[error("Host offers {channels} channels, plugin accepts {min}..={max}")]
    ChannelCountUnsupported { channels: usize, min: usize, max: usize },

    #[error("Plugin rejected block size {block_size} after rounding to a power of two")]
    DomainAdaptationInfeasible { block_size: usize },
}

/// Result type for loader operations
pub type LoadResult<T> = Result<T, Report<LoadError>>;

/// Failure of a statistical reduction
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum SummaryError {
    #[error("{values} values but {durations} durations")]
    LengthMismatch { values: usize, durations: usize },
}
