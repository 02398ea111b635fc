// System stats: uptime, CPU and memory utilization

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    /// CPU utilization, percent.
    pub cpu: i64,
    pub uptime: Duration,
    /// Memory utilization, percent.
    pub memory: i64,
}

/// Wire shape: every field is a decimal string.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSystemStats {
    #[serde(deserialize_with = "super::null_as_default")]
    cpu: String,
    #[serde(deserialize_with = "super::null_as_default")]
    uptime: String,
    #[serde(deserialize_with = "super::null_as_default")]
    mem: String,
}

impl SystemStats {
    /// Decodes the `system-stats` payload. Missing or non-numeric fields fail the whole record.
    pub fn from_json(b: &[u8]) -> Result<Self> {
        let raw: RawSystemStats = serde_json::from_slice(b)?;

        let cpu = raw.cpu.parse::<i64>()?;
        let uptime = raw.uptime.parse::<u64>()?;
        let memory = raw.mem.parse::<i64>()?;

        Ok(SystemStats {
            cpu,
            uptime: Duration::from_secs(uptime),
            memory,
        })
    }
}
