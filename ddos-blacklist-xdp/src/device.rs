//! Network device resolution.

use ddos_blacklist_common::{Error, Result};
use log::info;
use std::ffi::CString;
use std::fmt;
use std::io;

/// The network interface the filter program is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    name: String,
    ifindex: u32,
}

impl Device {
    /// Create a device from an already known name/index pair.
    pub fn new(name: impl Into<String>, ifindex: u32) -> Self {
        Self {
            name: name.into(),
            ifindex,
        }
    }

    /// Look up the interface index of `name`.
    pub fn resolve(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::Config("--dev name is empty".to_string()));
        }
        if name.len() >= libc::IF_NAMESIZE {
            return Err(Error::Config(format!("--dev name too long: {}", name)));
        }
        let c_name = CString::new(name)
            .map_err(|_| Error::Config(format!("--dev name contains NUL: {:?}", name)))?;

        // SAFETY: `c_name` is a valid NUL-terminated string.
        let ifindex = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
        if ifindex == 0 {
            let err = io::Error::last_os_error();
            return Err(Error::Config(format!(
                "--dev name unknown {}: err({}):{}",
                name,
                err.raw_os_error().unwrap_or(0),
                err
            )));
        }

        info!("Device:{} have ifindex:{}", name, ifindex);
        Ok(Self::new(name, ifindex))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ifindex(&self) -> u32 {
        self.ifindex
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (ifindex {})", self.name, self.ifindex)
    }
}
