//! `run` command: attach the filter and watch the blacklist

use ddos_blacklist_common::{Error, Result};
use ddos_blacklist_xdp::{loader, Daemon, DaemonOptions, Device, Shutdown};
use log::info;
use std::io;

use crate::settings::Settings;
use crate::utils::format_duration;

/// Bootstrap and run the daemon until SIGINT/SIGTERM.
///
/// Configuration is validated before anything touches the kernel, so a bad
/// invocation leaves no trace.
pub async fn run_daemon(settings: Settings) -> Result<()> {
    let interval = settings.interval()?;
    let device = Device::resolve(settings.require_device()?)?;

    loader::bump_memlock_rlimit().map_err(|e| {
        Error::Ebpf(format!("setrlimit(RLIMIT_MEMLOCK, RLIM_INFINITY): {}", e))
    })?;

    let object = settings.object_path();
    info!("Loading XDP program from file: {}", object.display());
    let (program, table) = ddos_blacklist_xdp::load_from_file(
        &object,
        &settings.program,
        &settings.map,
        settings.mode,
    )?;

    let (shutdown, rx) = Shutdown::new();
    shutdown.listen_for_signals()?;

    let options = DaemonOptions {
        device,
        pin_path: settings.pin_path,
        interval,
        seeds: settings.seeds,
        clear_screen: settings.clear_screen,
    };
    info!(
        "Watching blacklist on {} every {}",
        options.device,
        format_duration(interval)
    );

    let mut daemon = Daemon::new(program, table);
    daemon.run(&options, io::stdout(), rx).await?;

    info!(
        "XDP program {} from interface: {}",
        daemon.attachment_state(),
        options.device
    );
    Ok(())
}
