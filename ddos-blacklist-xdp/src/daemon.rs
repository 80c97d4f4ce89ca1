//! Top-level driver: attach, export, seed, poll, detach.
//!
//! Errors from the components are returned as-is; the only decision made
//! here is that once the program is attached, every exit path detaches it.

use ddos_blacklist_common::{AddOutcome, AttachmentState, Error, Result};
use log::{info, warn};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;

use crate::attach::{AttachPoint, AttachmentController};
use crate::blacklist::BlacklistManager;
use crate::device::Device;
use crate::maps::CounterTable;
use crate::poll::PollLoop;

/// Everything the daemon needs to know about its single attachment point.
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    pub device: Device,
    pub pin_path: PathBuf,
    pub interval: Duration,
    /// Addresses blacklisted right after the table is exported.
    pub seeds: Vec<String>,
    pub clear_screen: bool,
}

pub struct Daemon<P: AttachPoint, T: CounterTable> {
    attachment: AttachmentController<P>,
    blacklist: BlacklistManager<T>,
}

impl<P: AttachPoint, T: CounterTable> Daemon<P, T> {
    pub fn new(point: P, table: T) -> Self {
        Self {
            attachment: AttachmentController::new(point),
            blacklist: BlacklistManager::new(table),
        }
    }

    pub fn attachment_state(&self) -> AttachmentState {
        self.attachment.state()
    }

    pub fn blacklist(&self) -> &BlacklistManager<T> {
        &self.blacklist
    }

    /// Run until `shutdown` fires or a fatal error occurs.
    ///
    /// An attach failure returns immediately. Anything failing afterwards is
    /// returned only after the program has been detached.
    pub async fn run<W: Write>(
        &mut self,
        options: &DaemonOptions,
        out: W,
        shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        self.attachment.attach(&options.device)?;

        let result = self.serve(options, out, shutdown).await;
        if let Err(e) = &result {
            warn!("Fatal error while attached, detaching first: {}", e);
        }

        self.attachment.detach();
        result
    }

    async fn serve<W: Write>(
        &mut self,
        options: &DaemonOptions,
        out: W,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        self.blacklist.export_table(&options.pin_path)?;
        self.seed(&options.seeds)?;

        let mut poll = PollLoop::new(options.interval, out);
        if !options.clear_screen {
            poll = poll.without_clear_screen();
        }

        poll.run(self.blacklist.table(), &mut shutdown)
            .await
            .map_err(|source| Error::Table {
                op: "stats poll",
                source,
            })
    }

    fn seed(&mut self, seeds: &[String]) -> Result<()> {
        let mut inserted = 0;
        for ip in seeds {
            match self.blacklist.add(ip) {
                Ok(AddOutcome::Inserted) => inserted += 1,
                Ok(AddOutcome::AlreadyPresent) => {}
                Err(Error::InvalidAddress(ip)) => {
                    warn!("Skipping seed: IPv4 \"{}\" not in presentation format", ip);
                }
                Err(e) => return Err(e),
            }
        }

        if !seeds.is_empty() {
            info!("Seeded {} of {} blacklist entries", inserted, seeds.len());
        }
        Ok(())
    }
}
