use serde::Deserialize;

use crate::models::StatType;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub device: DeviceConfig,
    #[serde(default)]
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Appliance base address, e.g. "https://192.168.1.1".
    pub address: String,
    pub username: String,
    pub password: String,
    /// Accept self-signed certificates (HTTP session and stats socket).
    #[serde(default)]
    pub insecure_skip_verify: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// Stat categories ("system-stats", "interfaces", "export"). Empty subscribes to all.
    #[serde(default)]
    pub stats: Vec<String>,
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,
}

fn default_keepalive_interval_secs() -> u64 {
    5
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            stats: Vec::new(),
            keepalive_interval_secs: default_keepalive_interval_secs(),
        }
    }
}

impl StreamConfig {
    /// Parsed stat categories; only valid after `AppConfig` validation.
    pub fn stat_types(&self) -> anyhow::Result<Vec<StatType>> {
        self.stats
            .iter()
            .map(|s| {
                s.parse::<StatType>()
                    .map_err(|e| anyhow::anyhow!("stream.stats: {}", e))
            })
            .collect()
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        Self::load_from_path(&path)
    }

    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.device.address.is_empty(),
            "device.address must be non-empty"
        );
        anyhow::ensure!(
            self.device.address.starts_with("http://") || self.device.address.starts_with("https://"),
            "device.address must be an http(s) URL, got {}",
            self.device.address
        );
        anyhow::ensure!(
            self.device.timeout_secs > 0,
            "device.timeout_secs must be > 0, got {}",
            self.device.timeout_secs
        );
        anyhow::ensure!(
            self.stream.keepalive_interval_secs > 0,
            "stream.keepalive_interval_secs must be > 0, got {}",
            self.stream.keepalive_interval_secs
        );
        self.stream.stat_types()?;
        Ok(())
    }
}
