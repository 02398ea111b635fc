// Deep packet inspection stats and client address ordering

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::net::IpAddr;
use std::ops::Deref;

use crate::error::{Error, Result};

/// Traffic counters for one client address and one traffic type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DpiStat {
    pub ip: IpAddr,
    #[serde(rename = "type")]
    pub kind: String,
    pub category: String,
    pub receive_bytes: i64,
    pub receive_rate: i64,
    pub transmit_bytes: i64,
    pub transmit_rate: i64,
}

/// One `export` sample, flattened and sorted by (client address, type).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DpiStats(Vec<DpiStat>);

impl Deref for DpiStats {
    type Target = [DpiStat];

    fn deref(&self) -> &[DpiStat] {
        &self.0
    }
}

impl IntoIterator for DpiStats {
    type Item = DpiStat;
    type IntoIter = std::vec::IntoIter<DpiStat>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<Vec<DpiStat>> for DpiStats {
    fn from(mut v: Vec<DpiStat>) -> Self {
        v.sort_by(|a, b| ip_cmp(&a.ip, &b.ip).then_with(|| a.kind.cmp(&b.kind)));
        DpiStats(v)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDpiCounters {
    #[serde(deserialize_with = "super::null_as_default")]
    rx_bytes: String,
    #[serde(deserialize_with = "super::null_as_default")]
    rx_rate: String,
    #[serde(deserialize_with = "super::null_as_default")]
    tx_bytes: String,
    #[serde(deserialize_with = "super::null_as_default")]
    tx_rate: String,
}

impl DpiStats {
    /// Decodes the `export` payload: client IP -> "Type|Category" -> counters.
    /// Keys that are not IP addresses are skipped.
    pub fn from_json(b: &[u8]) -> Result<Self> {
        let raw: HashMap<String, Option<HashMap<String, Option<RawDpiCounters>>>> =
            serde_json::from_slice(b)?;

        let mut out = Vec::new();
        for (client, types) in raw {
            let Ok(ip) = client.parse::<IpAddr>() else {
                continue;
            };

            for (key, counters) in types.unwrap_or_default() {
                let Some((kind, category)) = split_stat_key(&key) else {
                    return Err(Error::InvalidDpiKey(key.clone()));
                };
                let c = counters.unwrap_or_default();

                out.push(DpiStat {
                    ip,
                    kind: kind.to_string(),
                    category: category.to_string(),
                    receive_bytes: c.rx_bytes.parse()?,
                    receive_rate: c.rx_rate.parse()?,
                    transmit_bytes: c.tx_bytes.parse()?,
                    transmit_rate: c.tx_rate.parse()?,
                });
            }
        }

        Ok(DpiStats::from(out))
    }
}

/// Splits "Type|Category"; the key must hold exactly one separator.
fn split_stat_key(key: &str) -> Option<(&str, &str)> {
    let (t, c) = key.split_once('|')?;
    if c.contains('|') {
        return None;
    }
    Some((t, c))
}

/// Orders client addresses: IPv4 (including IPv4-mapped IPv6) before IPv6,
/// then octet by octet.
pub fn ip_cmp(a: &IpAddr, b: &IpAddr) -> Ordering {
    a.to_canonical().cmp(&b.to_canonical())
}

/// Sort predicate over possibly-absent addresses. Equal or absent addresses are never less.
pub fn ip_less(a: Option<&IpAddr>, b: Option<&IpAddr>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => ip_cmp(a, b) == Ordering::Less,
        _ => false,
    }
}
