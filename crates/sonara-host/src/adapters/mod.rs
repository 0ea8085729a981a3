//! Capability adapters
//!
//! Each adapter implements [`Plugin`] by wrapping another one and handles a
//! single mismatch between what the host supplies and what the plugin
//! needs. [`build_chain`] stacks them in a fixed order: channel count
//! outermost, then buffering, then domain transform nearest the plugin.

pub mod buffering;
pub mod channel;
pub mod fft;
pub mod input_domain;

pub use buffering::{BufferDefaults, BufferingAdapter};
pub use channel::ChannelAdapter;
pub use input_domain::InputDomainAdapter;

use crate::error::{LoadError, LoadResult};
use error_stack::Report;
use serde::{Deserialize, Serialize};
use sonara_kernel::{InputDomain, Plugin};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use tracing::debug;

/// Which adapters the loader may insert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdapterFlags(u32);

impl AdapterFlags {
    pub const NONE: Self = Self(0);
    pub const ADAPT_INPUT_DOMAIN: Self = Self(0x01);
    pub const ADAPT_CHANNEL_COUNT: Self = Self(0x02);
    pub const ADAPT_BUFFER_SIZE: Self = Self(0x04);
    pub const ADAPT_ALL_SAFE: Self = Self(0x03);
    pub const ADAPT_ALL: Self = Self(0xff);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for AdapterFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for AdapterFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for AdapterFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Self::ADAPT_INPUT_DOMAIN, "input-domain"),
            (Self::ADAPT_CHANNEL_COUNT, "channel-count"),
            (Self::ADAPT_BUFFER_SIZE, "buffer-size"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect();

        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

/// What the host can supply
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostCapabilities {
    pub channels: usize,
    pub domain: InputDomain,
}

/// A plugin wrapped in the adapters a host needs
pub struct AdapterChain {
    pub plugin: Box<dyn Plugin>,
    /// Non-fatal notes about what was adapted
    pub warnings: Vec<String>,
}

/// Wrap `plugin` so a host with `host` capabilities can drive it.
///
/// Fails without constructing anything when the channel counts cannot be
/// reconciled and channel adaptation was requested.
pub fn build_chain(
    plugin: Box<dyn Plugin>,
    flags: AdapterFlags,
    host: HostCapabilities,
    defaults: BufferDefaults,
) -> LoadResult<AdapterChain> {
    let (min, max) = (plugin.min_channel_count(), plugin.max_channel_count());
    let needs_channels = host.channels < min || host.channels > max;
    if needs_channels && flags.contains(AdapterFlags::ADAPT_CHANNEL_COUNT) && !(min == 1 && host.channels > max) {
        return Err(Report::new(LoadError::ChannelCountUnsupported {
            channels: host.channels,
            min,
            max,
        })
        .attach(format!("plugin {}", plugin.identifier())));
    }

    let mut warnings = Vec::new();
    let mut plugin = plugin;

    if flags.contains(AdapterFlags::ADAPT_INPUT_DOMAIN)
        && plugin.input_domain() == InputDomain::FrequencyDomain
        && host.domain == InputDomain::TimeDomain
    {
        let preferred = plugin.preferred_block_size();
        if preferred != 0 && !preferred.is_power_of_two() {
            warnings.push(format!(
                "preferred block size {preferred} is not a power of two; using {}",
                preferred.next_power_of_two()
            ));
        }
        debug!(plugin = %plugin.identifier(), "adding input domain adapter");
        plugin = Box::new(InputDomainAdapter::new(plugin));
    }

    if flags.contains(AdapterFlags::ADAPT_BUFFER_SIZE) {
        debug!(plugin = %plugin.identifier(), "adding buffering adapter");
        plugin = Box::new(BufferingAdapter::new(plugin, defaults));
    }

    if needs_channels && flags.contains(AdapterFlags::ADAPT_CHANNEL_COUNT) {
        debug!(plugin = %plugin.identifier(), channels = host.channels, "adding channel adapter");
        plugin = Box::new(ChannelAdapter::new(plugin, host.channels)?);
        warnings.push(format!("mixing {} host channels down to mono", host.channels));
    }

    Ok(AdapterChain { plugin, warnings })
}
