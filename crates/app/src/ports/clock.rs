//! Clock ports — monotonic milliseconds and local wall time.

use chrono::{Datelike, Local};
use tokio::time::Instant;

use relaysync_domain::time::{Millis, WallTime};

/// Source of wrapping monotonic milliseconds.
pub trait MonotonicClock {
    fn now(&self) -> Millis;
}

/// Source of the local time of day.
pub trait WallClock {
    fn now(&self) -> WallTime;
}

/// [`MonotonicClock`] measuring from the moment it was created.
///
/// Backed by the tokio clock, so paused test runtimes drive it too.
#[derive(Debug, Clone, Copy)]
pub struct SystemMonotonicClock {
    origin: Instant,
}

impl Default for SystemMonotonicClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl MonotonicClock for SystemMonotonicClock {
    fn now(&self) -> Millis {
        Millis::from_duration(self.origin.elapsed())
    }
}

/// Year before which the host clock is assumed never to have been synchronised.
const FIRST_PLAUSIBLE_YEAR: i32 = 2024;

/// [`WallClock`] reading the host's local time through chrono.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalWallClock;

impl WallClock for LocalWallClock {
    fn now(&self) -> WallTime {
        let local = Local::now();
        let mut time = WallTime::from_datetime(&local);
        time.valid = local.year() >= FIRST_PLAUSIBLE_YEAR;
        time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn should_follow_tokio_time() {
        let clock = SystemMonotonicClock::default();
        assert_eq!(clock.now().get(), 0);
        tokio::time::advance(std::time::Duration::from_millis(3_000)).await;
        assert_eq!(clock.now().get(), 3_000);
    }

    #[test]
    fn should_report_plausible_local_time() {
        let time = LocalWallClock.now();
        assert!(time.minute_of_day < 1440);
        assert!(time.weekday_mon0 < 7);
    }
}
