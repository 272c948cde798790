//! Performance statistics for the lookahead pipeline
//!
//! Timing is collected as wall-clock plus per-thread CPU time so a report can
//! distinguish "blocked waiting" from "burning CPU". Collection is optional;
//! a disabled [`SweepStats`] never touches its accumulators.

use std::time::{Duration, Instant};

/// CPU time consumed by the calling thread so far.
#[cfg(target_os = "linux")]
fn thread_cpu_time() -> Duration {
    use libc::{clock_gettime, timespec, CLOCK_THREAD_CPUTIME_ID};

    let mut ts = timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let rc = unsafe { clock_gettime(CLOCK_THREAD_CPUTIME_ID, &mut ts) };
    if rc == 0 {
        Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32)
    } else {
        Duration::ZERO
    }
}

#[cfg(not(target_os = "linux"))]
fn thread_cpu_time() -> Duration {
    Duration::ZERO
}

/// A paired wall-clock / thread-CPU timestamp.
///
/// Deltas are only meaningful between two timestamps taken on the same
/// thread, because the CPU component is per-thread.
#[derive(Debug, Clone, Copy)]
pub struct ThreadTimes {
    wall: Instant,
    cpu: Duration,
}

impl ThreadTimes {
    /// Capture the current wall and thread-CPU time
    pub fn now() -> Self {
        Self {
            wall: Instant::now(),
            cpu: thread_cpu_time(),
        }
    }

    /// Wall and CPU time elapsed since an earlier timestamp on this thread
    pub fn since(&self, earlier: &ThreadTimes) -> (Duration, Duration) {
        (
            self.wall.saturating_duration_since(earlier.wall),
            self.cpu.saturating_sub(earlier.cpu),
        )
    }
}

/// Accumulated wall/CPU intervals plus an event count.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeltaThreadTimes {
    elapsed: Duration,
    cpu: Duration,
    events: u64,
}

impl DeltaThreadTimes {
    /// Add the interval between two same-thread timestamps
    pub fn add(&mut self, start: &ThreadTimes, end: &ThreadTimes) {
        let (wall, cpu) = end.since(start);
        self.elapsed += wall;
        self.cpu += cpu;
        self.events += 1;
    }

    pub fn events(&self) -> u64 {
        self.events
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn cpu(&self) -> Duration {
        self.cpu
    }

    /// Mean wall-clock interval per event
    pub fn mean_elapsed(&self) -> Duration {
        if self.events == 0 {
            Duration::ZERO
        } else {
            self.elapsed / self.events as u32
        }
    }
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1e3
}

/// The four interval accumulators of one lookahead session.
///
/// Fill wait is the worker blocked for ring capacity; fill cycle is
/// `fill_start` to `fill_complete`; read wait is the consumer blocked in
/// `read_start`; read cycle is delivery to `read_complete` (the consumer
/// using the batch).
#[derive(Debug, Clone, Default)]
pub struct SweepStats {
    enabled: bool,
    fill_wait: DeltaThreadTimes,
    fill_cycle: DeltaThreadTimes,
    read_wait: DeltaThreadTimes,
    read_cycle: DeltaThreadTimes,
    last_delivery: Option<ThreadTimes>,
}

impl SweepStats {
    /// Create statistics, enabled or not
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Default::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record time the worker spent waiting for ring capacity
    pub fn record_fill_wait(&mut self, since: &ThreadTimes) {
        if self.enabled {
            self.fill_wait.add(since, &ThreadTimes::now());
        }
    }

    /// Record one completed fill interval
    pub fn record_fill_cycle(&mut self, since: &ThreadTimes) {
        if self.enabled {
            self.fill_cycle.add(since, &ThreadTimes::now());
        }
    }

    /// Record time the consumer spent blocked in `read_start`
    pub fn record_read_wait(&mut self, since: &ThreadTimes) {
        if self.enabled {
            self.read_wait.add(since, &ThreadTimes::now());
            self.last_delivery = Some(ThreadTimes::now());
        }
    }

    /// Record the end of the consumer's use of the delivered batch
    pub fn record_read_complete(&mut self) {
        if self.enabled {
            if let Some(delivered) = self.last_delivery.take() {
                self.read_cycle.add(&delivered, &ThreadTimes::now());
            }
        }
    }

    pub fn fill_count(&self) -> u64 {
        self.fill_cycle.events()
    }

    pub fn read_count(&self) -> u64 {
        self.read_wait.events()
    }

    pub fn fill_wait(&self) -> DeltaThreadTimes {
        self.fill_wait
    }

    pub fn fill_cycle(&self) -> DeltaThreadTimes {
        self.fill_cycle
    }

    pub fn read_wait(&self) -> DeltaThreadTimes {
        self.read_wait
    }

    pub fn read_cycle(&self) -> DeltaThreadTimes {
        self.read_cycle
    }

    /// Get a summary string of the statistics
    pub fn report(&self) -> String {
        if !self.enabled {
            return "SweepStats { disabled }".to_string();
        }
        format!(
            "SweepStats {{ fills: {}, reads: {}, \
             fill_wait: {:.2}ms (cpu {:.2}ms), fill_cycle: {:.2}ms (cpu {:.2}ms), \
             read_wait: {:.2}ms (cpu {:.2}ms), read_cycle: {:.2}ms (cpu {:.2}ms) }}",
            self.fill_count(),
            self.read_count(),
            ms(self.fill_wait.elapsed()),
            ms(self.fill_wait.cpu()),
            ms(self.fill_cycle.elapsed()),
            ms(self.fill_cycle.cpu()),
            ms(self.read_wait.elapsed()),
            ms(self.read_wait.cpu()),
            ms(self.read_cycle.elapsed()),
            ms(self.read_cycle.cpu()),
        )
    }

    /// Reset all accumulators, keeping the enabled flag
    pub fn reset(&mut self) {
        *self = Self::new(self.enabled);
    }
}
