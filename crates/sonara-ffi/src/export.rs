//! Entry-point generation for plugin libraries
//!
//! A plugin library lists its plugin types once:
//!
//! ```ignore
//! sonara_ffi::export_plugins!(PeakTracker, Loudness);
//! ```
//!
//! which emits the `sonara_get_plugin_descriptor` symbol hosts look for.
//! Each type must provide `fn new(input_sample_rate: f32) -> Self`.
//! Index order follows the list; one adapter per type is created on first
//! use and lives for the rest of the process.
//!
//! [`plugin_entry_point!`] produces the same function under any name
//! without exporting a symbol, which lets a host register statically linked
//! plugins.

use crate::PluginAdapter;
use crate::abi::WirePluginDescriptor;
use crate::adapter::guarded;
use std::ffi::c_uint;
use std::ptr;

/// Descriptor for `index` within an exported list, NULL past the end
pub fn descriptor_at(adapters: &[PluginAdapter], index: c_uint) -> *const WirePluginDescriptor {
    guarded("get_plugin_descriptor", ptr::null(), || {
        adapters
            .get(index as usize)
            .map_or(ptr::null(), PluginAdapter::descriptor_ptr)
    })
}

#[macro_export]
macro_rules! plugin_entry_point {
    (@body $index:ident; $($plugin:ty),+) => {{
        static ADAPTERS: ::std::sync::OnceLock<::std::vec::Vec<$crate::PluginAdapter>> =
            ::std::sync::OnceLock::new();
        let adapters = ADAPTERS.get_or_init(|| {
            ::std::vec![$(
                $crate::PluginAdapter::new(|rate| ::std::option::Option::Some(<$plugin>::new(rate)))
            ),+]
        });
        $crate::export::descriptor_at(adapters, $index)
    }};
    ($vis:vis fn $name:ident = $($plugin:ty),+ $(,)?) => {
        $vis extern "C" fn $name(index: ::std::ffi::c_uint) -> *const $crate::abi::WirePluginDescriptor {
            $crate::plugin_entry_point!(@body index; $($plugin),+)
        }
    };
}

#[macro_export]
macro_rules! export_plugins {
    ($($plugin:ty),+ $(,)?) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn sonara_get_plugin_descriptor(
            index: ::std::ffi::c_uint,
        ) -> *const $crate::abi::WirePluginDescriptor {
            $crate::plugin_entry_point!(@body index; $($plugin),+)
        }
    };
}
