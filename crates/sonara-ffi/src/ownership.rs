//! Allocation and release of the strings and arrays handed across the wire
//!
//! Two lifetimes exist. Strings reachable from a [`WirePluginDescriptor`]
//! live in a [`DescriptorArena`] owned by the adapter and are never freed
//! while the descriptor is reachable. Output descriptors are allocated per
//! request by [`alloc_output_descriptor`] and freed only by
//! [`release_output_descriptor`].
//!
//! [`WirePluginDescriptor`]: crate::abi::WirePluginDescriptor

use crate::abi::{
    SAMPLE_TYPE_FIXED_RATE, SAMPLE_TYPE_ONE_PER_STEP, SAMPLE_TYPE_VARIABLE_RATE, WireOutputDescriptor,
    WireParameterDescriptor,
};
use sonara_kernel::{OutputDescriptor, ParameterDescriptor, SampleType};
use std::ffi::{CString, c_char, c_int, c_uint};
use std::ptr;

/// Convert to a C string, dropping any interior NUL bytes
pub fn to_c_string(value: &str) -> CString {
    match CString::new(value) {
        Ok(s) => s,
        Err(_) => {
            let cleaned: Vec<u8> = value.bytes().filter(|b| *b != 0).collect();
            CString::new(cleaned).unwrap_or_default()
        }
    }
}

/// Heap-allocate a C string; free it with [`release_c_string`]
pub fn alloc_c_string(value: &str) -> *mut c_char {
    to_c_string(value).into_raw()
}

/// # Safety
///
/// `ptr` must be NULL or come from [`alloc_c_string`] and not have been
/// released already.
pub unsafe fn release_c_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(unsafe { CString::from_raw(ptr) });
    }
}

fn flag(value: bool) -> c_int {
    value as c_int
}

/// Storage for everything a plugin descriptor points at
///
/// Pointers handed out stay valid until the arena is dropped: `CString`
/// and boxed slice contents do not move when their owners do.
#[derive(Default)]
pub struct DescriptorArena {
    strings: Vec<CString>,
    string_tables: Vec<Box<[*const c_char]>>,
    parameters: Vec<Box<WireParameterDescriptor>>,
    parameter_table: Option<Box<[*const WireParameterDescriptor]>>,
}

// Immutable after construction; only read through shared pointers.
unsafe impl Send for DescriptorArena {}
unsafe impl Sync for DescriptorArena {}

impl DescriptorArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn string(&mut self, value: &str) -> *const c_char {
        let s = to_c_string(value);
        let ptr = s.as_ptr();
        self.strings.push(s);
        ptr
    }

    /// NULL-terminated table of strings
    pub fn string_table(&mut self, values: &[String]) -> *const *const c_char {
        let mut table: Vec<*const c_char> = values.iter().map(|v| self.string(v)).collect();
        table.push(ptr::null());
        let table = table.into_boxed_slice();
        let ptr = table.as_ptr();
        self.string_tables.push(table);
        ptr
    }

    pub fn parameter(&mut self, desc: &ParameterDescriptor) -> *const WireParameterDescriptor {
        let value_names = if desc.value_names.is_empty() {
            ptr::null()
        } else {
            self.string_table(&desc.value_names)
        };

        let wire = Box::new(WireParameterDescriptor {
            identifier: self.string(&desc.identifier),
            name: self.string(&desc.name),
            description: self.string(&desc.description),
            unit: self.string(&desc.unit),
            min_value: desc.min_value,
            max_value: desc.max_value,
            default_value: desc.default_value,
            is_quantized: flag(desc.quantize_step.is_some()),
            quantize_step: desc.quantize_step.unwrap_or(0.0),
            value_names,
        });
        let ptr: *const WireParameterDescriptor = &*wire;
        self.parameters.push(wire);
        ptr
    }

    /// Table of parameter descriptors, NULL when there are none
    pub fn parameter_table(&mut self, descs: &[ParameterDescriptor]) -> *const *const WireParameterDescriptor {
        if descs.is_empty() {
            return ptr::null();
        }
        let table: Box<[_]> = descs.iter().map(|d| self.parameter(d)).collect();
        let ptr = table.as_ptr();
        self.parameter_table = Some(table);
        ptr
    }
}

fn sample_type_code(sample_type: SampleType) -> c_uint {
    match sample_type {
        SampleType::OneSamplePerStep => SAMPLE_TYPE_ONE_PER_STEP,
        SampleType::FixedSampleRate => SAMPLE_TYPE_FIXED_RATE,
        SampleType::VariableSampleRate => SAMPLE_TYPE_VARIABLE_RATE,
    }
}

/// Heap-allocate the wire form of an output descriptor
pub fn alloc_output_descriptor(desc: &OutputDescriptor) -> *mut WireOutputDescriptor {
    let bin_count = desc.bin_count.unwrap_or(0);

    // bin names are sent only for a fixed bin count, and then exactly
    // bin_count of them, missing names as NULL
    let bin_names = if desc.bin_count.is_some() && !desc.bin_names.is_empty() && bin_count > 0 {
        let table: Box<[*const c_char]> = (0..bin_count)
            .map(|i| match desc.bin_names.get(i) {
                Some(name) if !name.is_empty() => alloc_c_string(name) as *const c_char,
                _ => ptr::null(),
            })
            .collect();
        Box::into_raw(table).cast::<*const c_char>() as *const *const c_char
    } else {
        ptr::null()
    };

    let wire = WireOutputDescriptor {
        identifier: alloc_c_string(&desc.identifier),
        name: alloc_c_string(&desc.name),
        description: alloc_c_string(&desc.description),
        unit: alloc_c_string(&desc.unit),
        has_fixed_bin_count: flag(desc.bin_count.is_some()),
        bin_count: bin_count as c_uint,
        bin_names,
        has_known_extents: flag(desc.extents.is_some()),
        min_value: desc.extents.map_or(0.0, |e| e.min),
        max_value: desc.extents.map_or(0.0, |e| e.max),
        is_quantized: flag(desc.quantize_step.is_some()),
        quantize_step: desc.quantize_step.unwrap_or(0.0),
        sample_type: sample_type_code(desc.sample_type),
        sample_rate: desc.sample_rate,
        has_duration: flag(desc.has_duration),
    };
    Box::into_raw(Box::new(wire))
}

/// # Safety
///
/// `desc` must be NULL or come from [`alloc_output_descriptor`] and not
/// have been released already.
pub unsafe fn release_output_descriptor(desc: *mut WireOutputDescriptor) {
    if desc.is_null() {
        return;
    }
    let wire = unsafe { Box::from_raw(desc) };
    unsafe {
        release_c_string(wire.identifier as *mut c_char);
        release_c_string(wire.name as *mut c_char);
        release_c_string(wire.description as *mut c_char);
        release_c_string(wire.unit as *mut c_char);
    }

    if !wire.bin_names.is_null() {
        let len = wire.bin_count as usize;
        let slice = ptr::slice_from_raw_parts_mut(wire.bin_names as *mut *const c_char, len);
        let table = unsafe { Box::from_raw(slice) };
        for name in table.iter() {
            unsafe { release_c_string(*name as *mut c_char) };
        }
    }
}
