//! Periodic statistics display.

use log::debug;
use std::io::{self, Write};
use std::time::Duration;
use tokio::sync::watch;

use crate::maps::CounterTable;
use crate::stats::StatsAggregator;

const CLEAR_SCREEN: &str = "\x1b[2J";

const TRACE_NOTICE: &str =
    "\nDebug output available via:\n sudo cat /sys/kernel/debug/tracing/trace_pipe\n";

/// Redraws the blacklist hit counters every `interval` until shutdown.
///
/// Pure observation: the loop never writes to the table.
pub struct PollLoop<W: Write> {
    interval: Duration,
    aggregator: StatsAggregator,
    out: W,
    cycle: u64,
    clear_screen: bool,
}

impl<W: Write> PollLoop<W> {
    pub fn new(interval: Duration, out: W) -> Self {
        Self {
            interval,
            aggregator: StatsAggregator::new(),
            out,
            cycle: 0,
            clear_screen: true,
        }
    }

    /// Keep the terminal history instead of redrawing in place.
    pub fn without_clear_screen(mut self) -> Self {
        self.clear_screen = false;
        self
    }

    /// Number of completed poll cycles.
    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Run one cycle: header, snapshot, one line per active entry.
    /// Returns the number of entries rendered.
    pub fn poll_once<T: CounterTable>(&mut self, table: &T) -> io::Result<usize> {
        let records = self.aggregator.snapshot(table)?;
        self.cycle += 1;

        if self.clear_screen {
            write!(self.out, "{}", CLEAR_SCREEN)?;
        }
        writeln!(self.out, "{}", TRACE_NOTICE)?;
        writeln!(self.out, "Stats: {}", self.cycle)?;
        for record in &records {
            writeln!(self.out, "{}", record)?;
        }
        self.out.flush()?;

        Ok(records.len())
    }

    /// Poll until `shutdown` flips to `true` or its sender goes away.
    ///
    /// The sleep between cycles is raced against the shutdown signal, so a
    /// request is honoured without waiting out the interval.
    pub async fn run<T: CounterTable>(
        &mut self,
        table: &T,
        shutdown: &mut watch::Receiver<bool>,
    ) -> io::Result<()> {
        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            self.poll_once(table)?;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("Shutdown sender dropped, leaving poll loop");
                        break;
                    }
                }
            }
        }

        debug!("Poll loop stopped after {} cycles", self.cycle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryTable;

    fn table() -> MemoryTable {
        let mut table = MemoryTable::new(2);
        table.set_row("192.2.1.3".parse().unwrap(), vec![3, 2]);
        table.set_row("198.18.50.3".parse().unwrap(), vec![0, 0]);
        table
    }

    #[test]
    fn test_poll_once_renders_active_entries() {
        let mut poll = PollLoop::new(Duration::from_secs(2), Vec::new());
        assert_eq!(poll.poll_once(&table()).unwrap(), 1);

        let out = String::from_utf8(poll.into_output()).unwrap();
        assert!(out.starts_with(CLEAR_SCREEN));
        assert!(out.contains("Stats: 1"));
        assert!(out.contains("(192.2.1.3) count:5"));
        assert!(!out.contains("198.18.50.3"));
    }

    #[test]
    fn test_without_clear_screen() {
        let mut poll = PollLoop::new(Duration::from_secs(2), Vec::new()).without_clear_screen();
        poll.poll_once(&table()).unwrap();
        poll.poll_once(&table()).unwrap();

        let out = String::from_utf8(poll.into_output()).unwrap();
        assert!(!out.contains(CLEAR_SCREEN));
        assert!(out.contains("Stats: 2"));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let table = table();
        let (tx, mut rx) = watch::channel(false);
        let mut poll = PollLoop::new(Duration::from_millis(10), Vec::new());

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(35)).await;
            tx.send(true).unwrap();
            tx
        });

        poll.run(&table, &mut rx).await.unwrap();
        let _tx = stopper.await.unwrap();
        assert!(poll.cycles() >= 1);
    }

    #[tokio::test]
    async fn test_run_wakes_from_long_sleep() {
        let table = table();
        let (tx, mut rx) = watch::channel(false);
        let mut poll = PollLoop::new(Duration::from_secs(3600), Vec::new());

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.send(true).unwrap();
            tx
        });

        tokio::time::timeout(Duration::from_secs(5), poll.run(&table, &mut rx))
            .await
            .expect("poll loop ignored shutdown")
            .unwrap();
        let _tx = stopper.await.unwrap();
        assert_eq!(poll.cycles(), 1);
    }

    #[tokio::test]
    async fn test_run_not_started_when_already_shut_down() {
        let (_tx, mut rx) = watch::channel(true);
        let mut poll = PollLoop::new(Duration::from_millis(10), Vec::new());

        poll.run(&table(), &mut rx).await.unwrap();
        assert_eq!(poll.cycles(), 0);
    }
}
