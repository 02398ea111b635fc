// Link-layer hardware (MAC) address

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A hardware address of 6 (EUI-48), 8 (EUI-64) or 20 (IPoIB) octets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HardwareAddr(Vec<u8>);

impl HardwareAddr {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 6]> for HardwareAddr {
    fn from(b: [u8; 6]) -> Self {
        HardwareAddr(b.to_vec())
    }
}

impl FromStr for HardwareAddr {
    type Err = Error;

    /// Parses colon- or hyphen-separated pairs of hex digits, e.g. `de:ad:be:ef:de:ad`.
    fn from_str(s: &str) -> Result<Self, Error> {
        let invalid = || Error::HardwareAddr(s.to_string());

        let sep = if s.contains('-') { '-' } else { ':' };
        let mut out = Vec::with_capacity(8);
        for part in s.split(sep) {
            if part.len() != 2 {
                return Err(invalid());
            }
            out.push(u8::from_str_radix(part, 16).map_err(|_| invalid())?);
        }

        match out.len() {
            6 | 8 | 20 => Ok(HardwareAddr(out)),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for HardwareAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl Serialize for HardwareAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
