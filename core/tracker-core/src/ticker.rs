//! Scheduling primitive for the polling loop.
//!
//! The recorder never sleeps itself; it asks a `Ticker` to wait between
//! ticks. `IntervalTicker` sleeps in short slices so a shutdown request is
//! noticed well before a long poll interval elapses.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const SLICE_MS: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Shutdown,
}

pub trait Ticker {
    /// Blocks until the next tick is due, or reports that the loop should stop.
    fn wait(&mut self) -> TickOutcome;
}

pub struct IntervalTicker {
    interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl IntervalTicker {
    pub fn new(interval: Duration, shutdown: Arc<AtomicBool>) -> Self {
        Self { interval, shutdown }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

impl Ticker for IntervalTicker {
    fn wait(&mut self) -> TickOutcome {
        // An interval past the platform's Instant range waits until shutdown.
        let deadline = Instant::now().checked_add(self.interval);
        loop {
            if self.shutdown_requested() {
                return TickOutcome::Shutdown;
            }
            let slice = Duration::from_millis(SLICE_MS);
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return TickOutcome::Continue;
                    }
                    thread::sleep((deadline - now).min(slice));
                }
                None => thread::sleep(slice),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_shutdown_immediately_when_flag_set() {
        let flag = Arc::new(AtomicBool::new(true));
        let mut ticker = IntervalTicker::new(Duration::from_secs(3600), flag);
        let started = Instant::now();
        assert_eq!(ticker.wait(), TickOutcome::Shutdown);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn continues_after_interval() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut ticker = IntervalTicker::new(Duration::from_millis(20), flag);
        let started = Instant::now();
        assert_eq!(ticker.wait(), TickOutcome::Continue);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn unrepresentable_interval_waits_for_shutdown() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut ticker =
            IntervalTicker::new(Duration::from_secs(u64::MAX), Arc::clone(&flag));
        let setter = {
            let flag = Arc::clone(&flag);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                flag.store(true, Ordering::SeqCst);
            })
        };
        assert_eq!(ticker.wait(), TickOutcome::Shutdown);
        setter.join().expect("setter thread");
    }

    #[test]
    fn notices_shutdown_mid_interval() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut ticker = IntervalTicker::new(Duration::from_secs(3600), Arc::clone(&flag));
        let setter = {
            let flag = Arc::clone(&flag);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                flag.store(true, Ordering::SeqCst);
            })
        };
        assert_eq!(ticker.wait(), TickOutcome::Shutdown);
        setter.join().expect("setter thread");
    }
}
