//! Time throttled progress reporting helpers.

use std::time::{Duration, Instant};

/// Default period between two progress log lines.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(2);

// the clock is consulted once per this many ticks
const TICKS_PER_CLOCK_CHECK: u64 = 1024;

/// Tells when the next periodic progress report is due.
pub struct ProgressTimer {
    started: Instant,
    last_report: Duration,
    interval: Duration,
    ticks: u64,
}

impl ProgressTimer {
    pub fn new() -> Self {
        Self::with_interval(REPORT_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        ProgressTimer {
            started: Instant::now(),
            last_report: Duration::ZERO,
            interval,
            ticks: 0,
        }
    }

    /// Registers one processed item. Returns the elapsed time if a report is due.
    pub fn tick(&mut self) -> Option<Duration> {
        self.ticks += 1;
        if self.ticks % TICKS_PER_CLOCK_CHECK != 0 {
            return None;
        }

        let elapsed = self.started.elapsed();
        if elapsed.saturating_sub(self.last_report) >= self.interval {
            self.last_report = elapsed;
            Some(elapsed)
        } else {
            None
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for ProgressTimer {
    fn default() -> Self {
        ProgressTimer::new()
    }
}

/// Amount per second, guarded against a zero elapsed time.
pub fn per_second(amount: u64, elapsed: Duration) -> f64 {
    amount as f64 / elapsed.as_secs_f64().max(0.001)
}

/// Formats a duration as `hh:mm:ss`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}
