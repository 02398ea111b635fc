// Stat sum type and category discriminators

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::fmt;
use std::str::FromStr;

use super::{DpiStats, Interfaces, SystemStats};
use crate::error::{Error, Result};

/// Stat category, as named on the wire in subscriptions and stat frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatType {
    /// Deep packet inspection stats.
    #[serde(rename = "export")]
    DpiStats,
    /// Uptime, CPU and memory utilization.
    #[serde(rename = "system-stats")]
    SystemStats,
    /// Network interface state and counters.
    #[serde(rename = "interfaces")]
    Interfaces,
}

impl StatType {
    /// Categories subscribed to when none are requested.
    pub const ALL: [StatType; 3] = [
        StatType::DpiStats,
        StatType::Interfaces,
        StatType::SystemStats,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StatType::DpiStats => "export",
            StatType::SystemStats => "system-stats",
            StatType::Interfaces => "interfaces",
        }
    }
}

impl fmt::Display for StatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "export" => Ok(StatType::DpiStats),
            "system-stats" => Ok(StatType::SystemStats),
            "interfaces" => Ok(StatType::Interfaces),
            other => Err(Error::InvalidStatType(other.to_string())),
        }
    }
}

/// A decoded statistic from the appliance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "stats")]
pub enum Stat {
    #[serde(rename = "system-stats")]
    SystemStats(SystemStats),
    #[serde(rename = "interfaces")]
    Interfaces(Interfaces),
    #[serde(rename = "export")]
    DpiStats(DpiStats),
}

impl Stat {
    pub fn stat_type(&self) -> StatType {
        match self {
            Stat::SystemStats(_) => StatType::SystemStats,
            Stat::Interfaces(_) => StatType::Interfaces,
            Stat::DpiStats(_) => StatType::DpiStats,
        }
    }

    /// Decodes one frame entry with the decoder for `stat_type`.
    pub fn decode(stat_type: StatType, raw: &RawValue) -> Result<Self> {
        let b = raw.get().as_bytes();
        Ok(match stat_type {
            StatType::SystemStats => Stat::SystemStats(SystemStats::from_json(b)?),
            StatType::Interfaces => Stat::Interfaces(Interfaces::from_json(b)?),
            StatType::DpiStats => Stat::DpiStats(DpiStats::from_json(b)?),
        })
    }
}
