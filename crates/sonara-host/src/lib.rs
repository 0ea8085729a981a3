//! Sonara Host
//!
//! Everything a host needs to drive plugin libraries built with
//! `sonara-ffi`:
//!
//! - [`PluginLoader`] finds descriptors and instantiates plugins by
//!   [`PluginKey`]
//! - [`host_adapter::PluginHostAdapter`] turns a wire instance back into a
//!   [`sonara_kernel::Plugin`]
//! - [`adapters`] reconcile channel count, input domain and block size
//! - [`summarising::SummarisingAdapter`] reduces a run to per-segment
//!   statistics

#[macro_use]
mod macros;

pub mod adapters;
pub mod config;
pub mod error;
pub mod host_adapter;
pub mod key;
pub mod loader;
pub mod static_data;
pub mod summarising;

pub use adapters::AdapterFlags;
pub use config::HostConfig;
pub use error::{LoadError, LoadResult, SummaryError};
pub use key::PluginKey;
pub use loader::{LoadRequest, LoadResponse, PluginLoader};
pub use static_data::{ConfigurationRequest, ConfigurationResponse, PluginConfiguration, PluginStaticData};
pub use summarising::{AveragingMethod, SummarisingAdapter, SummaryType};

#[cfg(test)]
mod test_support;
