//! Loader utilities for the eBPF XDP program.
//!
//! This module provides functions for loading the compiled filter object,
//! preparing its XDP program and binding it to a device.

use anyhow::{Context, Result};
use aya::{
    programs::{xdp::XdpLinkId, Xdp, XdpFlags},
    Ebpf,
};
use ddos_blacklist_common::Error;
use log::{debug, info};
use serde::Deserialize;
use std::io;
use std::path::Path;

use crate::attach::AttachPoint;
use crate::device::Device;

/// How the XDP program is hooked into the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum XdpMode {
    /// Let the kernel pick native mode, falling back to generic.
    #[default]
    Auto,
    /// Native driver mode.
    Native,
    /// Generic SKB mode (slower but more compatible)
    Skb,
    /// Hardware offload
    Offload,
}

impl XdpMode {
    /// Convert to aya's XdpFlags
    pub fn to_aya_flags(self) -> XdpFlags {
        match self {
            XdpMode::Auto => XdpFlags::default(),
            XdpMode::Native => XdpFlags::DRV_MODE,
            XdpMode::Skb => XdpFlags::SKB_MODE,
            XdpMode::Offload => XdpFlags::HW_MODE,
        }
    }
}

/// Lift the locked-memory limit. Kernels without memcg based accounting
/// charge map memory against `RLIMIT_MEMLOCK`.
pub fn bump_memlock_rlimit() -> io::Result<()> {
    let rlim = libc::rlimit {
        rlim_cur: libc::RLIM_INFINITY,
        rlim_max: libc::RLIM_INFINITY,
    };

    // SAFETY: `rlim` is a valid rlimit for the duration of the call.
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }

    debug!("RLIMIT_MEMLOCK raised to infinity");
    Ok(())
}

/// Load an eBPF object file from the given path
pub fn load_bpf_object<P: AsRef<Path>>(path: P) -> Result<Ebpf> {
    let path = path.as_ref();

    debug!("Loading BPF object file: {}", path.display());

    let bpf = Ebpf::load_file(path)
        .with_context(|| format!("Failed to load BPF object file: {}", path.display()))?;

    info!("Successfully loaded BPF object file: {}", path.display());

    Ok(bpf)
}

/// Load the XDP program `program_name` of a BPF object into the kernel
pub fn load_xdp_program<'a>(bpf: &'a mut Ebpf, program_name: &str) -> Result<&'a mut Xdp> {
    debug!("Loading XDP program: {}", program_name);

    let program: &mut Xdp = bpf
        .program_mut(program_name)
        .with_context(|| format!("Failed to find program '{}'", program_name))?
        .try_into()
        .with_context(|| format!("Failed to convert program '{}' to XDP", program_name))?;

    program
        .load()
        .with_context(|| format!("Failed to load program '{}'", program_name))?;

    info!("Successfully loaded XDP program: {}", program_name);

    Ok(program)
}

/// A loaded XDP program that can be bound to a device.
pub struct XdpProgram {
    bpf: Ebpf,
    program_name: String,
    mode: XdpMode,
}

impl XdpProgram {
    /// Wrap an object whose program `program_name` has already been loaded.
    pub fn new(bpf: Ebpf, program_name: impl Into<String>, mode: XdpMode) -> Self {
        Self {
            bpf,
            program_name: program_name.into(),
            mode,
        }
    }

    fn program_mut(&mut self) -> Result<&mut Xdp> {
        let program: &mut Xdp = self
            .bpf
            .program_mut(&self.program_name)
            .with_context(|| format!("Failed to find program '{}'", self.program_name))?
            .try_into()?;
        Ok(program)
    }
}

impl AttachPoint for XdpProgram {
    type Link = XdpLinkId;

    fn attach(&mut self, device: &Device) -> ddos_blacklist_common::Result<XdpLinkId> {
        let flags = self.mode.to_aya_flags();
        let attach_error = |reason: String| Error::Attach {
            device: device.name().to_string(),
            ifindex: device.ifindex(),
            reason,
        };

        debug!(
            "Attaching XDP program to interface: {} ({:?} mode)",
            device, self.mode
        );

        let program = self
            .program_mut()
            .map_err(|e| attach_error(format!("{:#}", e)))?;
        let link_id = program
            .attach(device.name(), flags)
            .map_err(|e| attach_error(format!("{:#}", anyhow::Error::new(e))))?;

        Ok(link_id)
    }

    fn detach(&mut self, link: XdpLinkId) -> ddos_blacklist_common::Result<()> {
        let program = self
            .program_mut()
            .map_err(|e| Error::Ebpf(format!("{:#}", e)))?;
        program.detach(link).map_err(|e| {
            Error::Ebpf(format!(
                "Failed to detach XDP program: {:#}",
                anyhow::Error::new(e)
            ))
        })
    }
}
