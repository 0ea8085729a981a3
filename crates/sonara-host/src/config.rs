//! Host settings loadable from TOML, YAML or JSON

use crate::adapters::{AdapterFlags, BufferDefaults};
use crate::summarising::AveragingMethod;
use error_stack::{Report, ResultExt};
use serde::{Deserialize, Serialize};
use sonara_kernel::config::{self, Format};
use sonara_kernel::error::{KernelError, KernelResult};
use sonara_kernel::logging;
use std::path::Path;

/// Defaults applied by [`crate::PluginLoader`] and the adapters
///
/// ```toml
/// default_block_size = 2048
/// adapter_flags = 7
/// summary_averaging = "continuous-time-average"
/// log_filter = "sonara=debug"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub default_block_size: usize,
    /// 0 lets the buffering adapter pick from the input domain
    pub default_step_size: usize,
    pub adapter_flags: AdapterFlags,
    pub summary_averaging: AveragingMethod,
    pub log_filter: Option<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        let buffers = BufferDefaults::default();
        Self {
            default_block_size: buffers.block_size,
            default_step_size: buffers.step_size,
            adapter_flags: AdapterFlags::ADAPT_ALL_SAFE,
            summary_averaging: AveragingMethod::SampleAverage,
            log_filter: None,
        }
    }
}

impl HostConfig {
    pub fn load(path: impl AsRef<Path>) -> KernelResult<Self> {
        config::load_config_report(path)
    }

    pub fn from_source(content: &str, format: Format) -> KernelResult<Self> {
        config::from_str(content, format)
            .map_err(|e| Report::new(KernelError::from(e)))
            .attach(format!("inline {format:?} host config"))
    }

    /// Install the global log subscriber with `log_filter`.
    ///
    /// Returns false if one was already installed.
    pub fn init_logging(&self) -> bool {
        logging::init_logging(self.log_filter.as_deref())
    }

    pub fn buffer_defaults(&self) -> BufferDefaults {
        BufferDefaults {
            block_size: self.default_block_size,
            step_size: self.default_step_size,
        }
    }
}
