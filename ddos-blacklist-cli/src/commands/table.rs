//! Commands operating on the exported blacklist of a running daemon

use ddos_blacklist_common::{AddOutcome, BlacklistKey, Error, RemoveOutcome, Result, StatsRecord};
use ddos_blacklist_xdp::{BlacklistManager, PerCpuCounterTable, StatsAggregator};
use std::path::Path;

use crate::utils::print_header;

fn open(pin_path: &Path) -> Result<PerCpuCounterTable> {
    PerCpuCounterTable::from_pin(pin_path).map_err(|source| Error::Table {
        op: "open pinned map",
        source,
    })
}

/// Add `ip` to the blacklist
pub fn add(ip: &str, pin_path: &Path) -> Result<()> {
    // Reject bad input before touching the kernel
    let key: BlacklistKey = ip.parse()?;

    let mut blacklist = BlacklistManager::new(open(pin_path)?);
    match blacklist.add(ip)? {
        AddOutcome::Inserted => println!("Added {} (key:{}) to blacklist", ip, key),
        AddOutcome::AlreadyPresent => println!("{} (key:{}) already in blacklist", ip, key),
    }

    Ok(())
}

/// Remove `ip` from the blacklist
pub fn remove(ip: &str, pin_path: &Path) -> Result<()> {
    let key: BlacklistKey = ip.parse()?;

    let mut blacklist = BlacklistManager::new(open(pin_path)?);
    match blacklist.remove(ip)? {
        RemoveOutcome::Removed => println!("Removed {} (key:{}) from blacklist", ip, key),
        RemoveOutcome::NotPresent => println!("{} (key:{}) not in blacklist", ip, key),
    }

    Ok(())
}

/// One snapshot of addresses with hits
pub fn stats(pin_path: &Path) -> Result<()> {
    let table = open(pin_path)?;
    let records = StatsAggregator::new()
        .snapshot(&table)
        .map_err(|source| Error::Table {
            op: "stats snapshot",
            source,
        })?;

    print_header("Blacklist hits");
    print_records(&records, "No blacklisted address has been hit");
    Ok(())
}

/// Every blacklisted address with its hit count
pub fn list(pin_path: &Path) -> Result<()> {
    let table = open(pin_path)?;
    let records = StatsAggregator::new()
        .entries(&table)
        .map_err(|source| Error::Table {
            op: "list entries",
            source,
        })?;

    print_header(&format!("Blacklist ({} entries)", records.len()));
    print_records(&records, "Blacklist is empty");
    Ok(())
}

fn print_records(records: &[StatsRecord], empty: &str) {
    if records.is_empty() {
        println!("{}", empty);
    }
    for record in records {
        println!("{}", record);
    }
}
