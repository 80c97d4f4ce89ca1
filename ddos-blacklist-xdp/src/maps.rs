//! Map interaction utilities for the XDP program.
//!
//! The blacklist lives in a single per-CPU hash map keyed by IPv4 address.
//! The filter program bumps the current CPU's slot on every dropped packet;
//! userspace only creates rows, reads them, and walks the keys.

use aya::maps::{IterableMap, Map, MapData, MapError, PerCpuHashMap, PerCpuValues};
use ddos_blacklist_common::{error::into_io_error, BlacklistKey};
use log::{debug, info};
use std::io;
use std::path::Path;

/// `BPF_NOEXIST`: create a new element only if it did not exist.
const BPF_NOEXIST: u64 = 1;

/// Key walk over a table. Each step is one get-next-key call.
pub type Keys<'a> = Box<dyn Iterator<Item = io::Result<BlacklistKey>> + 'a>;

/// Access to a table mapping a blacklist key to one `u64` counter per CPU.
///
/// Errors are plain `io::Error`s: a duplicate insert or a taken pin path is
/// `ErrorKind::AlreadyExists`, a missing key is `ErrorKind::NotFound`.
pub trait CounterTable {
    /// Number of per-CPU slots in every row. Fixed for the table's lifetime.
    fn nr_cpus(&self) -> io::Result<usize>;

    /// Walks the keys from the first one to the end of the table.
    ///
    /// The order is only stable while the table is not modified. If the key
    /// the cursor sits on is deleted, the walk restarts from the first key,
    /// so callers may see a key twice.
    fn keys(&self) -> Keys<'_>;

    /// Reads the per-CPU row of `key` into `values`, replacing its contents.
    fn get_per_cpu(&self, key: &BlacklistKey, values: &mut Vec<u64>) -> io::Result<()>;

    /// Creates the row `key` with the given per-CPU values, failing with
    /// `AlreadyExists` if the key is already present.
    fn insert_if_absent(&mut self, key: &BlacklistKey, values: &[u64]) -> io::Result<()>;

    /// Deletes the row `key`.
    fn remove(&mut self, key: &BlacklistKey) -> io::Result<()>;

    /// Makes the table reachable at `path` on a bpf filesystem.
    fn pin(&self, path: &Path) -> io::Result<()>;
}

/// The kernel per-CPU hash map holding the blacklist.
pub struct PerCpuCounterTable {
    map: PerCpuHashMap<MapData, BlacklistKey, u64>,
}

impl PerCpuCounterTable {
    /// Wraps a map taken out of a loaded eBPF object.
    pub fn new(map: Map) -> Result<Self, MapError> {
        let map = PerCpuHashMap::try_from(map)?;
        Ok(Self { map })
    }

    /// Opens a table another process pinned at `path`.
    pub fn from_pin<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        debug!("Opening pinned map: {}", path.display());

        let data = MapData::from_pin(path).map_err(into_io_error)?;
        // Rejects a pinned map of any other kernel type.
        let map = Map::from_map_data(data).map_err(into_io_error)?;
        let map = PerCpuHashMap::try_from(map).map_err(into_io_error)?;

        info!("Opened pinned blacklist map: {}", path.display());
        Ok(Self { map })
    }
}

impl CounterTable for PerCpuCounterTable {
    fn nr_cpus(&self) -> io::Result<usize> {
        aya::util::nr_cpus().map_err(|(_, e)| e)
    }

    fn keys(&self) -> Keys<'_> {
        Box::new(self.map.keys().map(|key| key.map_err(into_io_error)))
    }

    fn get_per_cpu(&self, key: &BlacklistKey, values: &mut Vec<u64>) -> io::Result<()> {
        match self.map.get(key, 0) {
            Ok(row) => {
                values.clear();
                values.extend(row.iter().copied());
                Ok(())
            }
            Err(MapError::KeyNotFound) => Err(io::Error::from(io::ErrorKind::NotFound)),
            Err(e) => Err(into_io_error(e)),
        }
    }

    fn insert_if_absent(&mut self, key: &BlacklistKey, values: &[u64]) -> io::Result<()> {
        let values = PerCpuValues::try_from(values.to_vec())?;
        self.map
            .insert(key, values, BPF_NOEXIST)
            .map_err(into_io_error)
    }

    fn remove(&mut self, key: &BlacklistKey) -> io::Result<()> {
        match self.map.remove(key) {
            Ok(()) => Ok(()),
            Err(MapError::KeyNotFound) => Err(io::Error::from(io::ErrorKind::NotFound)),
            Err(e) => Err(into_io_error(e)),
        }
    }

    fn pin(&self, path: &Path) -> io::Result<()> {
        IterableMap::map(&self.map)
            .pin(path)
            .map_err(into_io_error)
    }
}
