//! # Cadence Module
//!
//! Keeps the pipeline in step with the live input: each cycle should take
//! exactly as long as the audio it consumed. The controller measures a
//! cycle, sleeps whatever is left of the period, and reports cycles that ran
//! over.

use std::time::{Duration, Instant};

use crate::config::SampleRateConfig;
use crate::error::CycleOverrun;

/// Source of time for the cadence controller.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall-clock time and thread sleeps.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// What is left of the period once a cycle finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slack {
    /// Time remaining in the period.
    Sleep(Duration),
    /// Time by which the cycle exceeded the period.
    Overrun(Duration),
}

/// Timing of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTiming {
    pub started: Instant,
    pub finished: Instant,
    pub slack: Slack,
}

impl CycleTiming {
    pub fn elapsed(&self) -> Duration {
        self.finished.saturating_duration_since(self.started)
    }

    /// The delay before the next cycle. Zero after an overrun.
    pub fn sleep_duration(&self) -> Duration {
        match self.slack {
            Slack::Sleep(remaining) => remaining,
            Slack::Overrun(_) => Duration::ZERO,
        }
    }

    /// `period - elapsed` in seconds, negative after an overrun.
    pub fn signed_slack_secs(&self) -> f64 {
        match self.slack {
            Slack::Sleep(remaining) => remaining.as_secs_f64(),
            Slack::Overrun(excess) => -excess.as_secs_f64(),
        }
    }

    pub fn is_overrun(&self) -> bool {
        matches!(self.slack, Slack::Overrun(_))
    }
}

/// Paces cycles to a fixed period.
pub struct CadenceController<C: Clock = SystemClock> {
    period: Duration,
    clock: C,
    consecutive_overruns: u32,
    total_overruns: u64,
}

impl CadenceController<SystemClock> {
    /// A controller whose period is one frame of real time.
    pub fn for_rate(rate: &SampleRateConfig) -> Self {
        Self::new(rate.period(), SystemClock)
    }
}

impl<C: Clock> CadenceController<C> {
    pub fn new(period: Duration, clock: C) -> Self {
        Self {
            period,
            clock,
            consecutive_overruns: 0,
            total_overruns: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Waits one period so the input stream can fill its first buffer.
    pub fn warm_up(&self) {
        log::debug!("Warming up for {:?}", self.period);
        self.clock.sleep(self.period);
    }

    /// Marks the start of a cycle.
    pub fn begin(&self) -> Instant {
        self.clock.now()
    }

    /// Marks the end of a cycle's work and computes the remaining slack.
    pub fn finish(&mut self, started: Instant) -> CycleTiming {
        let finished = self.clock.now();
        let elapsed = finished.saturating_duration_since(started);

        let slack = match self.period.checked_sub(elapsed) {
            Some(remaining) => {
                self.consecutive_overruns = 0;
                Slack::Sleep(remaining)
            }
            None => {
                self.consecutive_overruns += 1;
                self.total_overruns += 1;
                Slack::Overrun(elapsed - self.period)
            }
        };

        CycleTiming {
            started,
            finished,
            slack,
        }
    }

    /// Describes the overrun of `timing`, if it was one.
    pub fn overrun(&self, timing: &CycleTiming) -> Option<CycleOverrun> {
        timing.is_overrun().then(|| CycleOverrun {
            elapsed: timing.elapsed(),
            period: self.period,
            consecutive: self.consecutive_overruns,
        })
    }

    /// Sleeps out the rest of the period. Does nothing after an overrun.
    pub fn delay(&self, timing: &CycleTiming) {
        let sleep = timing.sleep_duration();
        if !sleep.is_zero() {
            self.clock.sleep(sleep);
        }
    }

    pub fn consecutive_overruns(&self) -> u32 {
        self.consecutive_overruns
    }

    pub fn total_overruns(&self) -> u64 {
        self.total_overruns
    }
}
