//! Sampling CPU-usage limiter.
//!
//! [`CpuThrottle`] compares the process's CPU time against wall-clock time
//! between two checks. When usage over that window exceeds the configured
//! limit, it sleeps for a short, bounded time proportional to the excess.
//! The limiter is soft: it never blocks for long and never fails a job.
//!
//! The throttle measures the whole process. Two throttled exports running
//! at once will each see the other's CPU time, so only one throttle-governed
//! export per process is supported; a warning is logged when a second one is
//! created while the first is alive.

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    thread,
    time::{Duration, Instant},
};

/// Default CPU cap, as a percentage of all cores.
pub const DEFAULT_CPU_LIMIT_PERCENT: u8 = 30;

const MIN_PAUSE: Duration = Duration::from_millis(1);
const MAX_PAUSE: Duration = Duration::from_millis(15);

static LIVE_THROTTLES: AtomicUsize = AtomicUsize::new(0);

/// Source of process CPU time and wall-clock time.
///
/// Abstracted so the throttle can be driven with synthetic readings.
pub trait CpuClock: Send {
    /// Cumulative CPU time consumed by the process, or `None` if the
    /// platform cannot report it.
    fn cpu_time(&mut self) -> Option<Duration>;

    /// Monotonic wall-clock reading.
    fn wall_time(&mut self) -> Duration;

    /// Number of logical cores the CPU time is spread over.
    fn core_count(&self) -> usize;
}

/// [`CpuClock`] backed by the operating system.
#[derive(Debug)]
pub struct ProcessClock {
    origin: Instant,
    cores: usize,
}

impl ProcessClock {
    /// Create a clock for the current process.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            cores: num_cpus::get().max(1),
        }
    }
}

impl Default for ProcessClock {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuClock for ProcessClock {
    #[cfg(unix)]
    fn cpu_time(&mut self) -> Option<Duration> {
        let mut spec = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: `spec` is a valid, writable timespec for the duration of
        // the call.
        let result = unsafe { libc::clock_gettime(libc::CLOCK_PROCESS_CPUTIME_ID, &mut spec) };
        if result != 0 {
            return None;
        }
        Some(Duration::new(spec.tv_sec as u64, spec.tv_nsec as u32))
    }

    #[cfg(not(unix))]
    fn cpu_time(&mut self) -> Option<Duration> {
        None
    }

    fn wall_time(&mut self) -> Duration {
        self.origin.elapsed()
    }

    fn core_count(&self) -> usize {
        self.cores
    }
}

/// Bounded-pause CPU limiter, invoked once per copied packet.
pub struct CpuThrottle {
    clock: Box<dyn CpuClock>,
    limit_percent: f64,
    last_cpu: Option<Duration>,
    last_wall: Duration,
    pauses: u64,
    paused_for: Duration,
}

impl CpuThrottle {
    /// Create a throttle over the real process clock.
    ///
    /// `limit_percent` is clamped to `1..=100`.
    pub fn new(limit_percent: u8) -> Self {
        Self::with_clock(limit_percent, Box::new(ProcessClock::new()))
    }

    /// Create a throttle over a custom clock.
    pub fn with_clock(limit_percent: u8, mut clock: Box<dyn CpuClock>) -> Self {
        let limit_percent = limit_percent.clamp(1, 100) as f64;
        let last_cpu = clock.cpu_time();
        let last_wall = clock.wall_time();

        if last_cpu.is_none() {
            log::debug!("Process CPU time unavailable; CPU throttle is inactive");
        }

        let live = LIVE_THROTTLES.fetch_add(1, Ordering::AcqRel) + 1;
        if live > 1 {
            log::warn!(
                "{live} CPU throttles are active in this process; each one measures the whole process, so limits will over-trigger"
            );
        }

        Self {
            clock,
            limit_percent,
            last_cpu,
            last_wall,
            pauses: 0,
            paused_for: Duration::ZERO,
        }
    }

    /// Take a sample and return the pause owed, without sleeping.
    ///
    /// Returns `None` when usage is within the limit, when no wall time has
    /// elapsed since the previous sample, or when CPU time is unavailable.
    pub fn check(&mut self) -> Option<Duration> {
        let now = self.clock.wall_time();
        let wall_delta = now.saturating_sub(self.last_wall);
        if wall_delta.is_zero() {
            return None;
        }

        let cpu = self.clock.cpu_time()?;
        let cpu_delta = match self.last_cpu {
            Some(last) => cpu.saturating_sub(last),
            None => Duration::ZERO,
        };
        self.last_cpu = Some(cpu);
        self.last_wall = now;

        let cores = self.clock.core_count().max(1) as f64;
        let cpu_percent = cpu_delta.as_secs_f64() / (wall_delta.as_secs_f64() * cores) * 100.0;
        if cpu_percent <= self.limit_percent {
            return None;
        }

        let excess = cpu_percent - self.limit_percent;
        let millis = (excess / self.limit_percent * 10.0) as u64;
        Some(Duration::from_millis(millis).clamp(MIN_PAUSE, MAX_PAUSE))
    }

    /// Sample and, if over the limit, sleep for the owed pause.
    pub fn throttle(&mut self) {
        if let Some(pause) = self.check() {
            self.pauses += 1;
            self.paused_for += pause;
            thread::sleep(pause);
        }
    }

    /// Number of pauses taken so far.
    pub fn pauses(&self) -> u64 {
        self.pauses
    }

    /// Total time spent paused so far.
    pub fn paused_for(&self) -> Duration {
        self.paused_for
    }

    /// The effective limit after clamping.
    pub fn limit_percent(&self) -> f64 {
        self.limit_percent
    }
}

impl Drop for CpuThrottle {
    fn drop(&mut self) {
        LIVE_THROTTLES.fetch_sub(1, Ordering::AcqRel);
    }
}
