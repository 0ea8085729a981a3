//! Sonara FFI
//!
//! The plugin side of the C ABI. A library of analysis plugins implements
//! [`sonara_kernel::Plugin`] for each type and calls [`export_plugins!`];
//! this crate turns each type into a stable [`abi::WirePluginDescriptor`]
//! whose operation table forwards to the native code.
//!
//! - [`abi`]: the `#[repr(C)]` records and function-pointer types
//! - [`adapter`]: one [`PluginAdapter`] per plugin type
//! - [`registry`]: descriptor and handle lookup shared by all adapters
//! - [`buffers`]: reusable per-instance storage for returned feature sets

pub mod abi;
pub mod adapter;
pub mod buffers;
pub mod export;
pub mod ownership;
pub mod registry;

pub use adapter::{PluginAdapter, PluginFactory};
pub use registry::AdapterRegistry;
