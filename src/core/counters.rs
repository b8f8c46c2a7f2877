//! Running read/base totals shared by the ingest loop and the consolidator.
//!
//! The counters have their own lock, independent of the scaffold model lock. The
//! same lock carries the stop request and a condition variable so the consolidator
//! can sleep until either enough new reads arrived, its deadline passed, or the
//! ingest loop finished.

use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use serde::Serialize;

/// Consistent view of the counters at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub reads: u64,
    pub bases: u64,
}

/// Why [`Counters::wait_for_tick`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// A cadence condition is met, a consolidation cycle is due
    Tick,
    /// The ingest loop is done
    Stop,
}

#[derive(Debug, Default)]
struct CounterState {
    reads: u64,
    bases: u64,
    reads_at_last_tick: u64,
    stopping: bool,
}

#[derive(Debug)]
pub struct Counters {
    state: Mutex<CounterState>,
    wakeup: Condvar,
    /// Reads between count-driven ticks, 0 disables count triggering
    read_period: u64,
}

impl Counters {
    #[must_use]
    pub fn new(read_period: u64) -> Self {
        Self {
            state: Mutex::new(CounterState::default()),
            wakeup: Condvar::new(),
            read_period,
        }
    }

    /// Count one newly observed read of `bases` length
    pub fn record_read(&self, bases: u64) {
        let mut state = self.state.lock();
        state.reads += 1;
        state.bases += bases;
        if self.read_period > 0 && state.reads - state.reads_at_last_tick == self.read_period {
            self.wakeup.notify_one();
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        let state = self.state.lock();
        CounterSnapshot {
            reads: state.reads,
            bases: state.bases,
        }
    }

    /// Take a snapshot and restart the read-count period from it
    pub fn mark_tick(&self) -> CounterSnapshot {
        let mut state = self.state.lock();
        state.reads_at_last_tick = state.reads;
        CounterSnapshot {
            reads: state.reads,
            bases: state.bases,
        }
    }

    /// Ask the consolidator to wind down
    pub fn request_stop(&self) {
        let mut state = self.state.lock();
        state.stopping = true;
        self.wakeup.notify_all();
    }

    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.state.lock().stopping
    }

    /// Block until the next consolidation cycle is due or a stop is requested.
    ///
    /// A tick is due once `read_period` reads have been seen since the last
    /// [`Counters::mark_tick`], or once `deadline` has passed, whichever happens
    /// first. Without a deadline only the read count (or a stop) can wake the caller.
    /// A pending stop always wins over a due tick.
    pub fn wait_for_tick(&self, deadline: Option<Instant>) -> Wake {
        let mut state = self.state.lock();
        loop {
            if state.stopping {
                return Wake::Stop;
            }
            if self.read_period > 0 && state.reads - state.reads_at_last_tick >= self.read_period {
                return Wake::Tick;
            }
            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return Wake::Tick;
                    }
                    self.wakeup.wait_until(&mut state, deadline);
                }
                None => self.wakeup.wait(&mut state),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_record_and_snapshot() {
        let counters = Counters::new(0);
        counters.record_read(100);
        counters.record_read(250);
        assert_eq!(
            counters.snapshot(),
            CounterSnapshot {
                reads: 2,
                bases: 350
            }
        );
    }

    #[test]
    fn test_read_period_triggers_tick() {
        let counters = Counters::new(3);
        for _ in 0..3 {
            counters.record_read(10);
        }
        assert_eq!(counters.wait_for_tick(None), Wake::Tick);

        counters.mark_tick();
        counters.record_read(10);
        assert_eq!(
            counters.wait_for_tick(Some(Instant::now() + Duration::from_millis(20))),
            Wake::Tick
        );
    }

    #[test]
    fn test_read_count_wins_over_long_deadline() {
        let counters = Arc::new(Counters::new(3));
        let start = Instant::now();
        let waiter = {
            let counters = Arc::clone(&counters);
            thread::spawn(move || counters.wait_for_tick(Some(start + Duration::from_secs(60))))
        };

        thread::sleep(Duration::from_millis(20));
        for _ in 0..3 {
            counters.record_read(10);
        }

        assert_eq!(waiter.join().unwrap(), Wake::Tick);
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(!counters.is_stopping());
    }

    #[test]
    fn test_deadline_triggers_tick() {
        let counters = Counters::new(0);
        let start = Instant::now();
        let wake = counters.wait_for_tick(Some(start + Duration::from_millis(30)));
        assert_eq!(wake, Wake::Tick);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_stop_wins_over_due_tick() {
        let counters = Counters::new(1);
        counters.record_read(10);
        counters.request_stop();
        assert_eq!(counters.wait_for_tick(None), Wake::Stop);
        assert!(counters.is_stopping());
    }

    #[test]
    fn test_stop_wakes_waiter() {
        let counters = Arc::new(Counters::new(0));
        let waiter = {
            let counters = Arc::clone(&counters);
            thread::spawn(move || counters.wait_for_tick(None))
        };
        thread::sleep(Duration::from_millis(20));
        counters.request_stop();
        assert_eq!(waiter.join().unwrap(), Wake::Stop);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let counters = Arc::new(Counters::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counters = Arc::clone(&counters);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        counters.record_read(2);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let snapshot = counters.snapshot();
        assert_eq!(snapshot.reads, 4000);
        assert_eq!(snapshot.bases, 8000);
    }
}
