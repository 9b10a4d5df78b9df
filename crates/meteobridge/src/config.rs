use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::units::{Category, ChannelMap, MeasurementSystem};

/// Bridge configuration, loaded from YAML.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// MeteoBridge connection settings.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Output measurement system: `metric` or `us`.
    #[serde(default)]
    pub units: MeasurementSystem,

    /// Station elevation in meters, for the sea-level pressure fallback.
    #[serde(default)]
    pub elevation_m: f64,

    /// Seconds between poll cycles.
    #[serde(default = "default_long_poll")]
    pub long_poll_secs: u64,

    /// Seconds between short-poll ticks.
    #[serde(default = "default_short_poll")]
    pub short_poll_secs: u64,

    /// Active channels per category. Categories left out use their defaults.
    #[serde(default)]
    pub channels: BTreeMap<Category, Vec<String>>,

    /// Node name used in Zenoh topics.
    #[serde(default = "default_node_name")]
    pub node_name: String,
}

/// Where and how to reach the MeteoBridge.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Host name or IP address. Empty disables polling.
    #[serde(default)]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Bound on connect plus response, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Responses longer than this are truncated.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,

    /// Index of the primary sensor of each kind (`th0`, `wind0`, ...).
    #[serde(default)]
    pub sensor_index: u32,
}

fn default_port() -> u16 {
    5557
}

fn default_timeout() -> u64 {
    10
}

fn default_max_response_bytes() -> usize {
    65536
}

fn default_long_poll() -> u64 {
    60
}

fn default_short_poll() -> u64 {
    10
}

fn default_node_name() -> String {
    "meteobridge".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            timeout_secs: default_timeout(),
            max_response_bytes: default_max_response_bytes(),
            sensor_index: 0,
        }
    }
}

impl DeviceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Both host and port are set.
    pub fn is_configured(&self) -> bool {
        !self.host.trim().is_empty() && self.port != 0
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            units: MeasurementSystem::default(),
            elevation_m: 0.0,
            long_poll_secs: default_long_poll(),
            short_poll_secs: default_short_poll(),
            channels: BTreeMap::new(),
            node_name: default_node_name(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string
    pub fn parse(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Config(format!("Failed to parse: {e}")))
    }

    /// Validate and freeze into the value each poll cycle runs with.
    pub fn poll_config(&self) -> Result<PollConfig> {
        if self.long_poll_secs == 0 || self.short_poll_secs == 0 {
            return Err(Error::Config("poll intervals must be at least 1 second".into()));
        }
        if self.device.timeout_secs == 0 {
            return Err(Error::Config("device.timeout_secs must be at least 1".into()));
        }
        if self.device.max_response_bytes == 0 {
            return Err(Error::Config("device.max_response_bytes must be positive".into()));
        }
        if !self.elevation_m.is_finite() {
            return Err(Error::Config("elevation_m must be a number".into()));
        }

        Ok(PollConfig {
            device: self.device.clone(),
            system: self.units,
            elevation_m: self.elevation_m,
            long_poll: Duration::from_secs(self.long_poll_secs),
            short_poll: Duration::from_secs(self.short_poll_secs),
            channels: self.channels.clone(),
        })
    }
}

/// Immutable configuration handed to the poller. A change produces a new value.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub device: DeviceConfig,
    pub system: MeasurementSystem,
    pub elevation_m: f64,
    long_poll: Duration,
    short_poll: Duration,
    channels: BTreeMap<Category, Vec<String>>,
}

impl PollConfig {
    /// Interval between poll cycles, never zero.
    pub fn long_poll(&self) -> Duration {
        self.long_poll
    }

    /// Interval between short-poll ticks, never zero.
    pub fn short_poll(&self) -> Duration {
        self.short_poll
    }

    /// Channel map for one category: the configured list, or the defaults.
    pub fn channel_map(&self, category: Category) -> ChannelMap {
        match self.channels.get(&category) {
            Some(channels) => ChannelMap::build(category, channels, self.system),
            None => ChannelMap::defaults(category, self.system),
        }
    }

    /// Channel maps of every category, in [`Category::ALL`] order.
    pub fn channel_maps(&self) -> Vec<ChannelMap> {
        Category::ALL.iter().map(|c| self.channel_map(*c)).collect()
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            system: MeasurementSystem::default(),
            elevation_m: 0.0,
            long_poll: Duration::from_secs(default_long_poll()),
            short_poll: Duration::from_secs(default_short_poll()),
            channels: BTreeMap::new(),
        }
    }
}
