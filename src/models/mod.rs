// Stat models and decoders for the appliance's string-typed JSON

use serde::{Deserialize, Deserializer};

mod dpi;
mod hwaddr;
mod network;
mod stat;
mod system;

pub use dpi::{DpiStat, DpiStats, ip_cmp, ip_less};
pub use hwaddr::HardwareAddr;
pub use network::{Interface, InterfaceStats, Interfaces};
pub use stat::{Stat, StatType};
pub use system::SystemStats;

/// The appliance sends `null` for blank fields; read it as the type's empty value.
fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(d).map(Option::unwrap_or_default)
}
