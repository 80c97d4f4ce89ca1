//! Blacklist insertion policy and table export.

use ddos_blacklist_common::{AddOutcome, BlacklistKey, Error, RemoveOutcome, Result};
use log::{info, warn};
use std::fs;
use std::io;
use std::net::Ipv4Addr;
use std::path::Path;

use crate::maps::CounterTable;

/// Owns the blacklist table and the rules for changing it.
pub struct BlacklistManager<T: CounterTable> {
    table: T,
}

impl<T: CounterTable> BlacklistManager<T> {
    pub fn new(table: T) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    pub fn into_table(self) -> T {
        self.table
    }

    /// Pin the table at `path`, replacing a stale pin left by an earlier run.
    ///
    /// The unlink-and-retry happens once; any other failure is fatal because
    /// external tools would lose sight of the blacklist.
    pub fn export_table(&self, path: &Path) -> Result<()> {
        let export_error = |source: io::Error| {
            if source.kind() == io::ErrorKind::NotFound {
                warn!(
                    "Parent of {} missing; is bpffs mounted (mount -t bpf bpf /sys/fs/bpf/)?",
                    path.display()
                );
            }
            Error::Export {
                path: path.to_path_buf(),
                source,
            }
        };

        match self.table.pin(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                warn!("Del previous map file: {}", path.display());
                fs::remove_file(path).map_err(export_error)?;
                self.table.pin(path).map_err(export_error)?;
            }
            Err(e) => return Err(export_error(e)),
        }

        info!("Blacklist exported to file: {}", path.display());
        Ok(())
    }

    /// Blacklist the dotted-quad address `ip` with a zeroed counter row.
    pub fn add(&mut self, ip: &str) -> Result<AddOutcome> {
        let addr: Ipv4Addr = ip
            .parse()
            .map_err(|_| Error::InvalidAddress(ip.to_string()))?;
        let key = BlacklistKey::from(addr);

        let nr_cpus = self.table.nr_cpus().map_err(|source| Error::TableUpdate {
            ip: addr,
            key,
            source,
        })?;
        let zeroes = vec![0u64; nr_cpus];

        match self.table.insert_if_absent(&key, &zeroes) {
            Ok(()) => {
                info!("Blacklisted IP:{} key:{}", addr, key);
                Ok(AddOutcome::Inserted)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                info!("IP:{} key:{}: Already in blacklist", addr, key);
                Ok(AddOutcome::AlreadyPresent)
            }
            Err(source) => Err(Error::TableUpdate {
                ip: addr,
                key,
                source,
            }),
        }
    }

    /// Drop `ip` from the blacklist along with its counters.
    pub fn remove(&mut self, ip: &str) -> Result<RemoveOutcome> {
        let key: BlacklistKey = ip.parse()?;

        match self.table.remove(&key) {
            Ok(()) => {
                info!("Removed IP:{} key:{} from blacklist", ip, key);
                Ok(RemoveOutcome::Removed)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(RemoveOutcome::NotPresent),
            Err(source) => Err(Error::Table {
                op: "remove",
                source,
            }),
        }
    }
}
