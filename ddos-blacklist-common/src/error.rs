//! Error types for the XDP DDoS blacklist.

use std::error::Error as StdError;
use std::io;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::BlacklistKey;

/// Process exit codes. Calling scripts branch on these, so the values are
/// fixed.
pub mod exit_code {
    pub const OK: u8 = 0;
    pub const FAIL: u8 = 1;
    pub const FAIL_OPTION: u8 = 2;
    pub const FAIL_XDP: u8 = 3;
    pub const FAIL_KEY_UPDATE: u8 = 4;
    pub const FAIL_MAP: u8 = 5;
    pub const FAIL_IP: u8 = 102;
}

/// All possible errors that can occur within the blacklist control plane.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing configuration, detected before any side effect.
    #[error("configuration error: {0}")]
    Config(String),

    /// The filter program could not be bound to the device.
    #[error("cannot attach XDP program to device:{device} ifindex:{ifindex}: {reason}")]
    Attach {
        device: String,
        ifindex: u32,
        reason: String,
    },

    /// The table could not be pinned at its export path.
    #[error("cannot pin map file:{}: {source}", .path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The string is not a dotted-quad IPv4 address.
    #[error("IPv4 \"{0}\" not in presentation format")]
    InvalidAddress(String),

    /// Inserting a blacklist entry failed for a reason other than a
    /// duplicate key.
    #[error("map update failed for IP:{ip} key:{key}: {source}")]
    TableUpdate {
        ip: Ipv4Addr,
        key: BlacklistKey,
        #[source]
        source: io::Error,
    },

    /// Any other table access failure (lookup, iteration, removal).
    #[error("map error during {op}: {source}")]
    Table {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    /// Loading the eBPF object or program failed.
    #[error("eBPF/XDP error: {0}")]
    Ebpf(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Exit code a process should terminate with when this error is fatal.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Config(_) => exit_code::FAIL_OPTION,
            Error::Attach { .. } => exit_code::FAIL_XDP,
            Error::Export { .. } => exit_code::FAIL_MAP,
            Error::InvalidAddress(_) => exit_code::FAIL_IP,
            Error::TableUpdate { .. } => exit_code::FAIL_KEY_UPDATE,
            Error::Table { .. } | Error::Ebpf(_) | Error::Io(_) => exit_code::FAIL,
        }
    }
}

/// Walks the `source()` chain of `err` and returns the first `io::Error`.
///
/// aya wraps the errno of a failed syscall a couple of layers deep; this is
/// how callers recover `EEXIST`/`ENOENT` without depending on aya's error
/// layout.
pub fn find_io_error<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a io::Error> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            return Some(io_err);
        }
        current = e.source();
    }
    None
}

/// Converts an arbitrary error into an `io::Error`, keeping the OS error
/// code when one is present anywhere in the chain.
pub fn into_io_error<E>(err: E) -> io::Error
where
    E: StdError + 'static,
{
    match find_io_error(&err) {
        Some(io_err) => match io_err.raw_os_error() {
            Some(code) => io::Error::from_raw_os_error(code),
            None => io::Error::new(io_err.kind(), err.to_string()),
        },
        None => io::Error::other(err.to_string()),
    }
}
