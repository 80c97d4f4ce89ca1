//! Types shared between the control plane and the kernel-side table.
//!
//! `BlacklistKey` is laid out exactly like the key of the kernel's per-CPU
//! hash map, so it must stay `#[repr(transparent)]` over a `u32`.

use aya::Pod;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::Error;

/// Well-known bpffs path the blacklist table is exported at.
pub const DEFAULT_PIN_PATH: &str = "/sys/fs/bpf/ddos_blacklist";

/// Name of the XDP program inside the eBPF object.
pub const DEFAULT_PROGRAM_NAME: &str = "xdp_prog";

/// Name of the per-CPU blacklist/counter map inside the eBPF object.
pub const DEFAULT_MAP_NAME: &str = "blacklist";

/// Default seconds between two statistics polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// An IPv4 address in network byte order, used as an opaque table key.
///
/// The in-memory bytes are the address octets in order, which is what the
/// filter program reads straight out of the IP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct BlacklistKey(pub u32);

impl BlacklistKey {
    /// The address this key was built from.
    pub fn to_ipv4(self) -> Ipv4Addr {
        Ipv4Addr::from(self.0.to_ne_bytes())
    }
}

impl From<Ipv4Addr> for BlacklistKey {
    fn from(ip: Ipv4Addr) -> Self {
        Self(u32::from_ne_bytes(ip.octets()))
    }
}

impl FromStr for BlacklistKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Ipv4Addr>()
            .map(Self::from)
            .map_err(|_| Error::InvalidAddress(s.to_string()))
    }
}

impl fmt::Display for BlacklistKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

unsafe impl Pod for BlacklistKey {}

/// Summed hit counter of one blacklist entry, produced per poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsRecord {
    pub key: BlacklistKey,
    pub total: u64,
}

impl fmt::Display for StatsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Key: IP-src-raw:{} ({}) count:{}",
            self.key,
            self.key.to_ipv4(),
            self.total
        )
    }
}

/// Whether the filter program is currently bound to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttachmentState {
    #[default]
    Detached,
    Attached,
}

impl fmt::Display for AttachmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentState::Detached => f.write_str("detached"),
            AttachmentState::Attached => f.write_str("attached"),
        }
    }
}

/// Result of a blacklist insertion that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new entry was created.
    Inserted,
    /// The address was already blacklisted; the table is unchanged.
    AlreadyPresent,
}

/// Result of a blacklist removal that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotPresent,
}
