//! In-memory stand-ins for the kernel table and attach point.

use ddos_blacklist_common::{BlacklistKey, Error, Result};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io;
use std::ops::Bound;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::attach::AttachPoint;
use crate::device::Device;
use crate::maps::{CounterTable, Keys};

/// Behaves like a `BPF_MAP_TYPE_PERCPU_HASH`: duplicate inserts fail with
/// `EEXIST`, a full table with `E2BIG`, and pins are exclusive files.
///
/// Rows sit behind a `RefCell` so another party can delete a key while a
/// walk over `&self` is in progress.
pub struct MemoryTable {
    rows: RefCell<BTreeMap<BlacklistKey, Vec<u64>>>,
    nr_cpus: usize,
    max_entries: usize,
}

impl MemoryTable {
    pub fn new(nr_cpus: usize) -> Self {
        Self {
            rows: RefCell::new(BTreeMap::new()),
            nr_cpus,
            max_entries: 100_000,
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// What the filter program does on a match.
    pub fn increment(&mut self, ip: &str, cpu: usize, by: u64) {
        let key: BlacklistKey = ip.parse().unwrap();
        let rows = self.rows.get_mut();
        let row = rows.get_mut(&key).expect("key not in table");
        row[cpu] = row[cpu].wrapping_add(by);
    }

    pub fn set_row(&mut self, key: BlacklistKey, values: Vec<u64>) {
        assert_eq!(values.len(), self.nr_cpus);
        self.rows.get_mut().insert(key, values);
    }

    pub fn len(&self) -> usize {
        self.rows.borrow().len()
    }

    pub fn contains(&self, ip: &str) -> bool {
        let key: BlacklistKey = ip.parse().unwrap();
        self.rows.borrow().contains_key(&key)
    }

    /// Deletes `key` behind the back of any walk in progress.
    pub fn evict(&self, key: &BlacklistKey) -> bool {
        self.rows.borrow_mut().remove(key).is_some()
    }

    fn next_key(&self, after: Option<&BlacklistKey>) -> Option<BlacklistKey> {
        let rows = self.rows.borrow();
        let next = match after {
            // Like the kernel, a key that is gone restarts the walk.
            Some(key) if rows.contains_key(key) => rows
                .range((Bound::Excluded(*key), Bound::Unbounded))
                .next(),
            _ => rows.iter().next(),
        };
        next.map(|(key, _)| *key)
    }
}

impl CounterTable for MemoryTable {
    fn nr_cpus(&self) -> io::Result<usize> {
        Ok(self.nr_cpus)
    }

    fn keys(&self) -> Keys<'_> {
        let mut cursor: Option<BlacklistKey> = None;
        Box::new(std::iter::from_fn(move || {
            let next = self.next_key(cursor.as_ref())?;
            cursor = Some(next);
            Some(Ok(next))
        }))
    }

    fn get_per_cpu(&self, key: &BlacklistKey, values: &mut Vec<u64>) -> io::Result<()> {
        let rows = self.rows.borrow();
        let row = rows
            .get(key)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOENT))?;
        values.clear();
        values.extend_from_slice(row);
        Ok(())
    }

    fn insert_if_absent(&mut self, key: &BlacklistKey, values: &[u64]) -> io::Result<()> {
        if values.len() != self.nr_cpus {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        let rows = self.rows.get_mut();
        if rows.contains_key(key) {
            return Err(io::Error::from_raw_os_error(libc::EEXIST));
        }
        if rows.len() >= self.max_entries {
            return Err(io::Error::from_raw_os_error(libc::E2BIG));
        }
        rows.insert(*key, values.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &BlacklistKey) -> io::Result<()> {
        self.rows
            .get_mut()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOENT))
    }

    fn pin(&self, path: &Path) -> io::Result<()> {
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map(|_| ())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointEvent {
    Attached(u32),
    Detached(u32),
}

/// Records attach/detach calls; the link is the device's ifindex.
#[derive(Default)]
pub struct FakeAttachPoint {
    events: Arc<Mutex<Vec<PointEvent>>>,
    fail_attach: bool,
    fail_detach: bool,
}

impl FakeAttachPoint {
    pub fn failing_attach() -> Self {
        Self {
            fail_attach: true,
            ..Default::default()
        }
    }

    pub fn failing_detach() -> Self {
        Self {
            fail_detach: true,
            ..Default::default()
        }
    }

    pub fn events(&self) -> Arc<Mutex<Vec<PointEvent>>> {
        Arc::clone(&self.events)
    }
}

impl AttachPoint for FakeAttachPoint {
    type Link = u32;

    fn attach(&mut self, device: &Device) -> Result<u32> {
        if self.fail_attach {
            return Err(Error::Attach {
                device: device.name().to_string(),
                ifindex: device.ifindex(),
                reason: "Operation not supported (os error 95)".to_string(),
            });
        }
        self.events
            .lock()
            .unwrap()
            .push(PointEvent::Attached(device.ifindex()));
        Ok(device.ifindex())
    }

    fn detach(&mut self, link: u32) -> Result<()> {
        if self.fail_detach {
            return Err(Error::Ebpf("link vanished".to_string()));
        }
        self.events.lock().unwrap().push(PointEvent::Detached(link));
        Ok(())
    }
}
