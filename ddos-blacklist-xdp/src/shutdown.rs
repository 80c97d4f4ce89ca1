//! Signal-driven shutdown requests.
//!
//! Signals are only turned into a `watch` notification here. The actual
//! cleanup (detaching the program) runs on the main task once the poll loop
//! has returned.

use log::info;
use std::io;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;

/// Sending half of a shutdown request.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    /// A fresh, not yet triggered shutdown pair.
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, rx)
    }

    /// Ask every receiver to wind down.
    pub fn trigger(&self) {
        // Stored even when every receiver is already gone.
        self.tx.send_replace(true);
    }

    /// Install SIGINT and SIGTERM listeners that trigger this shutdown.
    ///
    /// Returns once the listeners are registered; the waiting happens on a
    /// spawned task.
    pub fn listen_for_signals(self) -> io::Result<()> {
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;

        tokio::spawn(async move {
            let name = tokio::select! {
                _ = interrupt.recv() => "SIGINT",
                _ = terminate.recv() => "SIGTERM",
            };
            info!("Interrupted by {}: shutting down", name);
            self.trigger();
        });

        Ok(())
    }
}
