//! # Data Frame Pacing
//!
//! `StreamScheduler` decides when the next data frame is due. The interval is
//! `1000 / data_rate` whole milliseconds. When a frame is emitted the clock moves to the
//! emission instant, not to the previous deadline, so lateness is absorbed rather than
//! caught up with bursts.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct StreamScheduler {
    interval: Duration,
    last_emission: Option<Instant>,
}

impl StreamScheduler {
    /// `data_rate` must be non-zero; validated stations guarantee it.
    pub fn new(data_rate: u16) -> Self {
        StreamScheduler {
            interval: Duration::from_millis(1000 / data_rate.max(1) as u64),
            last_emission: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Restarts the pacing clock; the first frame is due one interval after `now`.
    pub fn reset(&mut self, now: Instant) {
        self.last_emission = Some(now);
    }

    /// Returns `true` at most once per interval, advancing the clock to `now` when it does.
    pub fn is_due(&mut self, now: Instant) -> bool {
        match self.last_emission {
            Some(last) if now.saturating_duration_since(last) >= self.interval => {
                self.last_emission = Some(now);
                true
            }
            Some(_) => false,
            None => {
                self.last_emission = Some(now);
                true
            }
        }
    }

    /// Instant at which the next frame becomes due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.last_emission.map(|last| last + self.interval)
    }
}
