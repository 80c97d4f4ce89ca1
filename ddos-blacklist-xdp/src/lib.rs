//! Userspace control plane for the XDP DDoS blacklist.
//!
//! This crate loads the filter program, binds it to a device, exports and
//! seeds its per-CPU blacklist table, and turns the table's hit counters
//! into periodic statistics. The packet matching itself happens in the
//! kernel program and is not part of this crate.

use anyhow::Context;
use aya_log::EbpfLogger;
use ddos_blacklist_common::{Error, Result};
use log::{debug, info};
use std::path::Path;

pub mod attach;
pub mod blacklist;
pub mod daemon;
pub mod device;
pub mod loader;
pub mod maps;
pub mod poll;
pub mod shutdown;
pub mod stats;

#[cfg(test)]
mod testing;

pub use attach::{AttachPoint, AttachmentController};
pub use blacklist::BlacklistManager;
pub use daemon::{Daemon, DaemonOptions};
pub use device::Device;
pub use loader::{XdpMode, XdpProgram};
pub use maps::{CounterTable, Keys, PerCpuCounterTable};
pub use poll::PollLoop;
pub use shutdown::Shutdown;
pub use stats::StatsAggregator;

/// Load the filter object at `path` and split it into its XDP program and
/// the blacklist table named `map_name`.
///
/// Must be called from within a tokio runtime: the kernel log forwarder,
/// when the object carries one, runs as a task.
pub fn load_from_file<P: AsRef<Path>>(
    path: P,
    program_name: &str,
    map_name: &str,
    mode: XdpMode,
) -> Result<(XdpProgram, PerCpuCounterTable)> {
    let load = || -> anyhow::Result<(XdpProgram, PerCpuCounterTable)> {
        let mut bpf = loader::load_bpf_object(path.as_ref())?;

        // Only objects built with aya-log carry the log ring
        if let Err(e) = EbpfLogger::init(&mut bpf) {
            debug!("eBPF logger not initialised: {}", e);
        }

        loader::load_xdp_program(&mut bpf, program_name)?;

        let map = bpf
            .take_map(map_name)
            .with_context(|| format!("Failed to find map '{}'", map_name))?;
        let table = PerCpuCounterTable::new(map)
            .with_context(|| format!("Map '{}' is not a per-CPU hash of u32 -> u64", map_name))?;

        info!("Blacklist table '{}' ready", map_name);
        Ok((XdpProgram::new(bpf, program_name, mode), table))
    };

    load().map_err(|e| Error::Ebpf(format!("{:#}", e)))
}
