//! Per-CPU counter aggregation.
//!
//! Walks the table with the get-next-key cursor and sums every row. Nothing
//! here is atomic across keys or CPUs: the filter program keeps counting
//! while we read, so a total may be off by in-flight increments.

use ddos_blacklist_common::{BlacklistKey, StatsRecord};
use log::{debug, trace};
use std::collections::HashSet;
use std::io;

use crate::maps::CounterTable;

#[derive(Debug, Default)]
pub struct StatsAggregator {
    values: Vec<u64>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Summed counters of every entry that has seen traffic, in table order.
    pub fn snapshot<T: CounterTable>(&mut self, table: &T) -> io::Result<Vec<StatsRecord>> {
        self.collect(table, false)
    }

    /// Summed counters of every entry, zero totals included.
    pub fn entries<T: CounterTable>(&mut self, table: &T) -> io::Result<Vec<StatsRecord>> {
        self.collect(table, true)
    }

    fn collect<T: CounterTable>(
        &mut self,
        table: &T,
        include_zero: bool,
    ) -> io::Result<Vec<StatsRecord>> {
        let nr_cpus = table.nr_cpus()?;
        self.values.reserve(nr_cpus);

        let mut records = Vec::new();
        let mut seen = HashSet::new();

        for key in table.keys() {
            let key = key?;
            if !seen.insert(key) {
                // The walk restarted because an earlier key got deleted.
                trace!("Skipping repeated key {}", key);
                continue;
            }

            let Some(total) = self.sum(table, &key, nr_cpus)? else {
                continue;
            };
            if total != 0 || include_zero {
                records.push(StatsRecord { key, total });
            }
        }

        Ok(records)
    }

    /// Sum of the per-CPU row of `key`, `None` if the key vanished.
    fn sum<T: CounterTable>(
        &mut self,
        table: &T,
        key: &BlacklistKey,
        nr_cpus: usize,
    ) -> io::Result<Option<u64>> {
        match table.get_per_cpu(key, &mut self.values) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Key {} removed during stats walk", key);
                return Ok(None);
            }
            Err(e) => return Err(e),
        }

        if self.values.len() != nr_cpus {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "row of key {} has {} values, expected {}",
                    key,
                    self.values.len(),
                    nr_cpus
                ),
            ));
        }

        Ok(Some(
            self.values.iter().fold(0u64, |sum, v| sum.wrapping_add(*v)),
        ))
    }
}
