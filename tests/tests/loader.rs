//! Loading fixture plugins by key and adapting them to the host

use sonara_host::{
    AdapterFlags, ConfigurationRequest, HostConfig, LoadError, LoadRequest, PluginConfiguration, PluginKey, PluginLoader,
    static_data::configure_plugin,
};
use sonara_kernel::{InputDomain, Plugin, RealTime};
use sonara_testing::{
    FIXTURE_LIBRARY, Picky, configured_fixture_loader, fixture_key, fixture_loader, fixture_plugins, sonara_get_plugin_descriptor,
};

#[test]
fn lists_every_valid_fixture() {
    let loader = fixture_loader();
    let identifiers: Vec<String> = loader
        .list_plugins()
        .iter()
        .map(|key| key.identifier().to_string())
        .collect();
    // sorted by key; the version-mismatched fixture never appears
    assert_eq!(identifiers, vec!["constant", "picky", "sine-tracker", "sparse", "switch"]);
    assert!(loader.list_plugins().iter().all(|k| k.library() == FIXTURE_LIBRARY));
}

#[test]
fn registering_twice_keeps_one_entry_per_key() {
    let loader = fixture_loader();
    let keys = unsafe { loader.register_entry_point(FIXTURE_LIBRARY, fixture_plugins) };
    assert_eq!(keys.len(), 4);
    assert_eq!(loader.list_plugins().len(), 5);
}

#[test]
fn exported_symbol_lists_its_plugins() {
    let loader = PluginLoader::new();
    let keys = unsafe { loader.register_entry_point("exported", sonara_get_plugin_descriptor) };
    let identifiers: Vec<&str> = keys.iter().map(PluginKey::identifier).collect();
    assert_eq!(identifiers, vec!["sine-tracker", "constant"]);
    assert!(loader.load_plugin(LoadRequest::new(PluginKey::new("exported", "constant"), 44100.0)).is_ok());
}

#[test]
fn static_data_describes_the_plugin() {
    let loader = fixture_loader();
    let data = loader.static_data(&fixture_key("sine-tracker")).unwrap();
    assert_eq!(data.basic.name, "Sine Tracker");
    assert_eq!(data.maker, "Sonara Fixtures");
    assert_eq!(data.plugin_version, 2);
    assert_eq!(data.input_domain, InputDomain::FrequencyDomain);
    let outputs: Vec<&str> = data.basic_output_info.iter().map(|o| o.identifier.as_str()).collect();
    assert_eq!(outputs, vec!["peak-bin", "frequency"]);
}

#[test]
fn unknown_key_fails() {
    let loader = fixture_loader();
    let err = loader
        .load_plugin(LoadRequest::new(PluginKey::new(FIXTURE_LIBRARY, "missing"), 44100.0))
        .map(|_| ())
        .unwrap_err();
    assert_eq!(
        err.current_context(),
        &LoadError::UnknownPlugin(format!("{FIXTURE_LIBRARY}:missing"))
    );
}

#[test]
fn failed_construction_is_reported() {
    let loader = fixture_loader();
    let ok = loader.load_plugin(LoadRequest::new(fixture_key("picky"), 44100.0));
    assert!(ok.is_ok());

    let err = loader
        .load_plugin(LoadRequest::new(fixture_key("picky"), Picky::MAX_RATE * 2.0))
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err.current_context(), LoadError::InstantiationFailure(id) if id == "picky"));
    assert!(format!("{err:?}").contains("picky"));
}

#[test]
fn unreconcilable_channels_fail_the_load() {
    let loader = fixture_loader();
    // sparse accepts one or two channels, so nothing can mix down to it from zero
    let err = loader
        .load_plugin(
            LoadRequest::new(fixture_key("sparse"), 44100.0)
                .with_channels(0)
                .with_adapter_flags(AdapterFlags::ADAPT_ALL_SAFE),
        )
        .map(|_| ())
        .unwrap_err();
    assert_eq!(
        err.current_context(),
        &LoadError::ChannelCountUnsupported {
            channels: 0,
            min: 1,
            max: 2
        }
    );
}

#[test]
fn extra_channels_are_mixed_down() {
    let loader = fixture_loader();
    let response = loader
        .load_plugin(
            LoadRequest::new(fixture_key("constant"), 1000.0)
                .with_channels(4)
                .with_adapter_flags(AdapterFlags::ADAPT_CHANNEL_COUNT),
        )
        .unwrap();
    assert_eq!(response.warnings.len(), 1);

    let mut plugin = response.plugin;
    assert_eq!(plugin.min_channel_count(), 4);
    assert!(plugin.initialise(4, 512, 512));
    let silence = vec![0.0f32; 512];
    let channels: Vec<&[f32]> = (0..4).map(|_| &silence[..]).collect();
    let features = plugin.process(&channels, RealTime::ZERO);
    assert_eq!(features[&0][0].values, vec![1.0]);
}

#[test]
fn configured_flags_apply_when_the_request_sets_none() {
    let config = HostConfig::from_source("adapter_flags = 2\n", sonara_kernel::config::Format::Toml).unwrap();
    let loader = configured_fixture_loader(&config);

    let response = loader
        .load_plugin(LoadRequest::new(fixture_key("constant"), 1000.0).with_channels(4))
        .unwrap();
    assert_eq!(response.warnings.len(), 1);
    assert_eq!(response.plugin.min_channel_count(), 4);

    // an explicit empty set still wins over the configured one
    let response = loader
        .load_plugin(
            LoadRequest::new(fixture_key("constant"), 1000.0)
                .with_channels(4)
                .with_adapter_flags(AdapterFlags::NONE),
        )
        .unwrap();
    assert!(response.warnings.is_empty());
    assert_eq!(response.plugin.min_channel_count(), 1);
}

#[test]
fn default_configuration_applies_cleanly() {
    let loader = fixture_loader();
    let response = loader
        .load_plugin(LoadRequest::new(fixture_key("constant"), 8000.0).with_adapter_flags(AdapterFlags::ADAPT_ALL))
        .unwrap();

    let configuration = response.default_configuration.clone();
    assert_eq!(configuration.block_size, 512);
    assert_eq!(configuration.step_size, 512);
    assert_eq!(configuration.parameter_values.get("value"), Some(&1.0));
    assert_eq!(configuration.current_program, "one");

    let mut plugin = response.plugin;
    let mut configuration = PluginConfiguration {
        current_program: "minus-one".into(),
        ..configuration
    };
    configuration.parameter_values.clear();

    let result = configure_plugin(ConfigurationRequest {
        plugin: plugin.as_mut(),
        configuration,
    });
    assert!(result.is_success());
    assert_eq!(plugin.parameter("value"), -1.0);
    assert_eq!(plugin.current_program(), "minus-one");
}

#[test]
fn missing_library_is_a_load_error() {
    let loader = PluginLoader::new();
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("libnot-a-plugin.so");
    std::fs::write(&path, b"not an object file").unwrap();

    let err = unsafe { loader.load_library(&path) }.unwrap_err();
    assert!(matches!(err.current_context(), LoadError::LibraryLoad(_)));
    assert!(loader.list_plugins().is_empty());
}
