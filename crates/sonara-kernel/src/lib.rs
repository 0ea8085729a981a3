//! Sonara Kernel
//!
//! The native side of the audio analysis plugin contract: the [`Plugin`]
//! trait that analysis modules implement and hosts drive, the metadata and
//! result types it exchanges, and the timestamp type used throughout.
//!
//! ```text
//! host code ──▶ Box<dyn Plugin> (adapter chain) ──▶ sonara-host wire adapter
//!                                                         │  C ABI
//!                        analysis module ◀── sonara-ffi plugin adapter
//! ```

// plugin module
pub mod plugin;
pub use plugin::*;

// error module
pub mod error;

// logging module
pub mod logging;

// config module
#[cfg(feature = "config")]
pub mod config;
