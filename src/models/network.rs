// Network interface models

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::net::IpAddr;
use std::ops::Deref;

use super::HardwareAddr;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interface {
    pub name: String,
    pub up: bool,
    pub autonegotiation: bool,
    pub duplex: String,
    pub speed: i64,
    pub mac: Option<HardwareAddr>,
    pub mtu: i64,
    /// Interface addresses; the prefix length of each CIDR is dropped.
    pub addresses: Vec<IpAddr>,
    pub stats: InterfaceStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceStats {
    pub receive_packets: i64,
    pub transmit_packets: i64,
    pub receive_bytes: i64,
    pub transmit_bytes: i64,
    pub receive_errors: i64,
    pub transmit_errors: i64,
    pub receive_dropped: i64,
    pub transmit_dropped: i64,
    pub multicast: i64,
    pub receive_bps: i64,
    pub transmit_bps: i64,
}

/// All interfaces of one `interfaces` sample, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Interfaces(Vec<Interface>);

impl Deref for Interfaces {
    type Target = [Interface];

    fn deref(&self) -> &[Interface] {
        &self.0
    }
}

impl IntoIterator for Interfaces {
    type Item = Interface;
    type IntoIter = std::vec::IntoIter<Interface>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<Vec<Interface>> for Interfaces {
    fn from(mut v: Vec<Interface>) -> Self {
        v.sort_by(|a, b| a.name.cmp(&b.name));
        Interfaces(v)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawInterface {
    #[serde(deserialize_with = "super::null_as_default")]
    up: String,
    #[serde(deserialize_with = "super::null_as_default")]
    autoneg: String,
    #[serde(deserialize_with = "super::null_as_default")]
    duplex: String,
    #[serde(deserialize_with = "super::null_as_default")]
    speed: String,
    #[serde(deserialize_with = "super::null_as_default")]
    mac: String,
    #[serde(deserialize_with = "super::null_as_default")]
    mtu: String,
    // String or array of strings depending on firmware.
    addresses: Value,
    #[serde(deserialize_with = "super::null_as_default")]
    stats: RawInterfaceStats,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawInterfaceStats {
    #[serde(deserialize_with = "super::null_as_default")]
    rx_packets: String,
    #[serde(deserialize_with = "super::null_as_default")]
    tx_packets: String,
    #[serde(deserialize_with = "super::null_as_default")]
    rx_bytes: String,
    #[serde(deserialize_with = "super::null_as_default")]
    tx_bytes: String,
    #[serde(deserialize_with = "super::null_as_default")]
    rx_errors: String,
    #[serde(deserialize_with = "super::null_as_default")]
    tx_errors: String,
    #[serde(deserialize_with = "super::null_as_default")]
    rx_dropped: String,
    #[serde(deserialize_with = "super::null_as_default")]
    tx_dropped: String,
    #[serde(deserialize_with = "super::null_as_default")]
    multicast: String,
    #[serde(deserialize_with = "super::null_as_default")]
    rx_bps: String,
    #[serde(deserialize_with = "super::null_as_default")]
    tx_bps: String,
}

/// Empty counters read as zero; anything else must be an integer.
fn parse_counter(s: &str) -> Result<i64> {
    if s.is_empty() {
        return Ok(0);
    }
    Ok(s.parse()?)
}

fn parse_cidr_addr(s: &str) -> Result<IpAddr> {
    if !s.contains('/') {
        return Err(Error::Cidr(s.to_string()));
    }
    let net: IpNetwork = s.parse().map_err(|_| Error::Cidr(s.to_string()))?;
    Ok(net.ip())
}

fn parse_addresses(v: &Value) -> Result<Vec<IpAddr>> {
    match v {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => parse_cidr_addr(s),
                other => Err(Error::Cidr(other.to_string())),
            })
            .collect(),
        Value::String(s) if !s.is_empty() => Ok(vec![parse_cidr_addr(s)?]),
        _ => Ok(Vec::new()),
    }
}

impl Interface {
    fn from_raw(name: String, raw: RawInterface) -> Result<Self> {
        let mac = if raw.mac.is_empty() {
            None
        } else {
            Some(raw.mac.parse::<HardwareAddr>()?)
        };

        let s = &raw.stats;
        Ok(Interface {
            name,
            up: raw.up == "true",
            autonegotiation: raw.autoneg == "true",
            duplex: raw.duplex,
            speed: parse_counter(&raw.speed)?,
            mac,
            mtu: parse_counter(&raw.mtu)?,
            addresses: parse_addresses(&raw.addresses)?,
            stats: InterfaceStats {
                receive_packets: parse_counter(&s.rx_packets)?,
                transmit_packets: parse_counter(&s.tx_packets)?,
                receive_bytes: parse_counter(&s.rx_bytes)?,
                transmit_bytes: parse_counter(&s.tx_bytes)?,
                receive_errors: parse_counter(&s.rx_errors)?,
                transmit_errors: parse_counter(&s.tx_errors)?,
                receive_dropped: parse_counter(&s.rx_dropped)?,
                transmit_dropped: parse_counter(&s.tx_dropped)?,
                multicast: parse_counter(&s.multicast)?,
                receive_bps: parse_counter(&s.rx_bps)?,
                transmit_bps: parse_counter(&s.tx_bps)?,
            },
        })
    }
}

impl Interfaces {
    /// Decodes the `interfaces` payload, an object keyed by interface name.
    pub fn from_json(b: &[u8]) -> Result<Self> {
        let raw: HashMap<String, Option<RawInterface>> = serde_json::from_slice(b)?;

        let ifaces = raw
            .into_iter()
            .map(|(name, r)| Interface::from_raw(name, r.unwrap_or_default()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Interfaces::from(ifaces))
    }
}
