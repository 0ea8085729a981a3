//! Descriptor and handle lookup through the process-wide registry

use sonara_ffi::{AdapterRegistry, PluginAdapter};
use sonara_testing::{Constant, FutureVersion, fixture_plugins, future_plugins};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

#[test]
fn handle_resolves_to_the_adapter_that_made_its_descriptor() {
    let registry = AdapterRegistry::global();
    let descriptor = fixture_plugins(1);
    assert!(!descriptor.is_null());
    let owner = registry.adapter_for_descriptor(descriptor).expect("descriptor is registered");

    unsafe {
        let ops = (*descriptor).operations().unwrap();
        let handle = (ops.instantiate)(descriptor, 44100.0);
        assert!(!handle.is_null());

        let resolved = registry.adapter_for_instance(handle).expect("handle is registered");
        assert!(Arc::ptr_eq(&resolved, &owner));

        (ops.cleanup)(handle);
        assert!(registry.adapter_for_instance(handle).is_none());

        // a second cleanup of the same handle is a logged no-op
        (ops.cleanup)(handle);
    }
}

#[test]
fn handles_are_never_reused() {
    let descriptor = fixture_plugins(1);
    unsafe {
        let ops = (*descriptor).operations().unwrap();
        let first = (ops.instantiate)(descriptor, 44100.0);
        (ops.cleanup)(first);
        let second = (ops.instantiate)(descriptor, 44100.0);
        assert_ne!(first, second);
        (ops.cleanup)(second);
    }
}

#[test]
fn version_mismatch_registers_nothing() {
    assert!(future_plugins(0).is_null());

    let adapter = PluginAdapter::new(|rate| Some(FutureVersion::new(rate)));
    assert!(adapter.descriptor().is_none());
    assert!(adapter.descriptor_ptr().is_null());
    assert!(!adapter.is_registered());
    assert!(!AdapterRegistry::global().is_adapter_registered(adapter.core()));
}

#[test]
fn dropping_an_adapter_unregisters_its_descriptor() {
    let adapter = PluginAdapter::new(|rate| Some(Constant::new(rate)));
    let descriptor = adapter.descriptor_ptr();
    assert!(!descriptor.is_null());
    assert!(adapter.is_registered());

    let core = adapter.core().clone();
    drop(adapter);
    assert!(!AdapterRegistry::global().is_adapter_registered(&core));
}

#[test]
fn instances_are_independent() {
    let descriptor = fixture_plugins(1);
    unsafe {
        let ops = (*descriptor).operations().unwrap();
        let a = (ops.instantiate)(descriptor, 44100.0);
        let b = (ops.instantiate)(descriptor, 44100.0);

        // parameter 0 is "value"
        (ops.set_parameter)(a, 0, 3.0);
        assert_eq!((ops.get_parameter)(a, 0), 3.0);
        assert_eq!((ops.get_parameter)(b, 0), 1.0);

        (ops.cleanup)(a);
        assert_eq!((ops.get_parameter)(b, 0), 1.0);
        (ops.cleanup)(b);
    }
}

#[test]
fn concurrent_instances_do_not_interfere() {
    const THREADS: usize = 8;
    const CYCLES: usize = 200;

    let adapter = PluginAdapter::new(|rate| Some(Constant::new(rate)));
    let descriptor = adapter.descriptor().expect("constant exports a descriptor");
    let ops = descriptor.operations().unwrap();

    let handles: Vec<usize> = thread::scope(|scope| {
        let workers: Vec<_> = (0..THREADS)
            .map(|t| {
                scope.spawn(move || {
                    let value = t as f32;
                    let block = [0.0f32; 512];
                    let mut seen = Vec::with_capacity(CYCLES);
                    for _ in 0..CYCLES {
                        unsafe {
                            let handle = (ops.instantiate)(descriptor, 44100.0);
                            assert!(!handle.is_null());
                            assert_eq!((ops.initialise)(handle, 1, 512, 512), 1);
                            (ops.set_parameter)(handle, 0, value);

                            let channels = [block.as_ptr()];
                            let set = (ops.process)(handle, channels.as_ptr(), 0, 0);
                            assert!(!set.is_null());
                            let list = &*(*set).lists;
                            assert_eq!(list.feature_count, 1);
                            // another thread's parameter never leaks into this instance
                            assert_eq!(*(*list.features).values, value);
                            (ops.release_feature_set)(set);

                            (ops.cleanup)(handle);
                            seen.push(handle.addr());
                        }
                    }
                    seen
                })
            })
            .collect();
        workers.into_iter().flat_map(|w| w.join().unwrap()).collect()
    });

    assert_eq!(handles.len(), THREADS * CYCLES);
    let distinct: HashSet<usize> = handles.iter().copied().collect();
    assert_eq!(distinct.len(), handles.len());
    assert_eq!(adapter.core().live_instances(), 0);
    assert!(
        handles
            .iter()
            .all(|&h| AdapterRegistry::global().instance(std::ptr::without_provenance_mut(h)).is_none())
    );
}
