//! Serializable snapshots of a plugin's metadata and configuration

use crate::key::PluginKey;
use serde::{Deserialize, Serialize};
use sonara_kernel::{InputDomain, OutputDescriptor, ParameterDescriptor, Plugin};
use std::collections::BTreeMap;
use tracing::debug;

/// Identifier, name and description of a plugin or output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicInfo {
    pub identifier: String,
    pub name: String,
    pub description: String,
}

/// Everything about a plugin that does not depend on how it is configured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginStaticData {
    pub plugin_key: PluginKey,
    pub basic: BasicInfo,
    pub maker: String,
    pub copyright: String,
    pub plugin_version: i32,
    pub min_channel_count: usize,
    pub max_channel_count: usize,
    pub parameters: Vec<ParameterDescriptor>,
    pub programs: Vec<String>,
    pub input_domain: InputDomain,
    /// Outputs as declared before initialise
    pub basic_output_info: Vec<BasicInfo>,
}

impl PluginStaticData {
    pub fn from_plugin(plugin_key: PluginKey, plugin: &dyn Plugin) -> Self {
        Self {
            plugin_key,
            basic: BasicInfo {
                identifier: plugin.identifier(),
                name: plugin.name(),
                description: plugin.description(),
            },
            maker: plugin.maker(),
            copyright: plugin.copyright(),
            plugin_version: plugin.plugin_version(),
            min_channel_count: plugin.min_channel_count(),
            max_channel_count: plugin.max_channel_count(),
            parameters: plugin.parameter_descriptors(),
            programs: plugin.programs(),
            input_domain: plugin.input_domain(),
            basic_output_info: plugin
                .output_descriptors()
                .into_iter()
                .map(|o| BasicInfo {
                    identifier: o.identifier,
                    name: o.name,
                    description: o.description,
                })
                .collect(),
        }
    }
}

/// Values a host applies before processing
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PluginConfiguration {
    pub channel_count: usize,
    pub step_size: usize,
    pub block_size: usize,
    pub parameter_values: BTreeMap<String, f32>,
    /// Empty when the plugin has no programs
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_program: String,
}

impl PluginConfiguration {
    /// Capture the plugin's current parameter values and program
    pub fn from_plugin(plugin: &dyn Plugin, channel_count: usize, step_size: usize, block_size: usize) -> Self {
        let parameter_values = plugin
            .parameter_descriptors()
            .into_iter()
            .map(|p| {
                let value = plugin.parameter(&p.identifier);
                (p.identifier, value)
            })
            .collect();

        let current_program = if plugin.programs().is_empty() {
            String::new()
        } else {
            plugin.current_program()
        };

        Self {
            channel_count,
            step_size,
            block_size,
            parameter_values,
            current_program,
        }
    }
}

pub struct ConfigurationRequest<'a> {
    pub plugin: &'a mut dyn Plugin,
    pub configuration: PluginConfiguration,
}

/// Whether initialise accepted the configuration, and the outputs as
/// declared afterwards (empty on failure)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfigurationResponse {
    pub success: bool,
    pub outputs: Vec<OutputDescriptor>,
}

impl ConfigurationResponse {
    pub fn is_success(&self) -> bool {
        self.success
    }
}

/// Select the program, apply parameter values, then initialise.
///
/// Parameters are applied after the program so explicit values win over
/// the program's settings.
pub fn configure_plugin(request: ConfigurationRequest<'_>) -> ConfigurationResponse {
    let ConfigurationRequest { plugin, configuration } = request;

    if !configuration.current_program.is_empty() {
        plugin.select_program(&configuration.current_program);
    }
    for (identifier, value) in &configuration.parameter_values {
        plugin.set_parameter(identifier, *value);
    }

    if !plugin.initialise(
        configuration.channel_count,
        configuration.step_size,
        configuration.block_size,
    ) {
        debug!(
            plugin = %plugin.identifier(),
            channels = configuration.channel_count,
            step = configuration.step_size,
            block = configuration.block_size,
            "plugin refused configuration"
        );
        return ConfigurationResponse::default();
    }

    ConfigurationResponse {
        success: true,
        outputs: plugin.output_descriptors(),
    }
}
