//! Time helpers: a wrapping monotonic millisecond counter and wall-clock
//! time of day.

use std::fmt;
use std::time::Duration;

use chrono::{Datelike, Timelike};

/// Monotonic milliseconds since an arbitrary origin, wrapping at `u32::MAX`.
///
/// Comparisons go through [`elapsed_since`](Self::elapsed_since), which uses
/// unsigned wrapping subtraction, so deadlines keep working across the wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Millis(u32);

impl Millis {
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Truncate a [`Duration`] measured from the clock origin.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_duration(elapsed: Duration) -> Self {
        // Truncation is the wrap.
        Self(elapsed.as_millis() as u32)
    }

    #[must_use]
    pub const fn wrapping_add(self, millis: u32) -> Self {
        Self(self.0.wrapping_add(millis))
    }

    /// Milliseconds from `earlier` to `self`, modulo 2^32.
    #[must_use]
    pub const fn elapsed_since(self, earlier: Self) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// Whether at least `timeout` milliseconds have passed since `started`.
    #[must_use]
    pub const fn has_elapsed(self, started: Self, timeout: u32) -> bool {
        self.elapsed_since(started) >= timeout
    }
}

impl fmt::Display for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Local time of day as understood by the remote node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallTime {
    /// Minutes since midnight (`0..=1439`).
    pub minute_of_day: u16,
    /// Day of week, Monday = 0 through Sunday = 6.
    pub weekday_mon0: u8,
    /// Whether the clock has been synchronised.
    pub valid: bool,
}

impl WallTime {
    /// The time reported before any clock synchronisation.
    pub const UNSYNCHRONISED: Self = Self {
        minute_of_day: 0,
        weekday_mon0: 0,
        valid: false,
    };

    /// Derive the time of day from any chrono date-time.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_datetime<T: Datelike + Timelike>(at: &T) -> Self {
        // hour <= 23, minute <= 59 and weekday <= 6 always fit.
        Self {
            minute_of_day: (at.hour() * 60 + at.minute()) as u16,
            weekday_mon0: at.weekday().num_days_from_monday() as u8,
            valid: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn should_measure_elapsed_time() {
        let start = Millis::new(1_000);
        let now = Millis::new(3_999);
        assert_eq!(now.elapsed_since(start), 2_999);
        assert!(!now.has_elapsed(start, 3_000));
        assert!(Millis::new(4_000).has_elapsed(start, 3_000));
    }

    #[test]
    fn should_measure_elapsed_time_across_wraparound() {
        let start = Millis::new(u32::MAX - 999);
        let deadline_passed = start.wrapping_add(3_000);
        assert_eq!(deadline_passed.get(), 2_000);
        assert_eq!(deadline_passed.elapsed_since(start), 3_000);
        assert!(deadline_passed.has_elapsed(start, 3_000));
        assert!(!Millis::new(1_000).has_elapsed(start, 3_000));
    }

    #[test]
    fn should_truncate_duration_into_wrapping_counter() {
        let millis = Millis::from_duration(Duration::from_millis(u64::from(u32::MAX) + 11));
        assert_eq!(millis.get(), 10);
    }

    #[test]
    fn should_derive_wall_time_monday_first() {
        // 2024-01-01 was a Monday.
        let monday = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let wall = WallTime::from_datetime(&monday);
        assert_eq!(wall.minute_of_day, 480);
        assert_eq!(wall.weekday_mon0, 0);
        assert!(wall.valid);

        let sunday = NaiveDate::from_ymd_opt(2024, 1, 7)
            .unwrap()
            .and_hms_opt(23, 59, 0)
            .unwrap();
        let wall = WallTime::from_datetime(&sunday);
        assert_eq!(wall.minute_of_day, 1439);
        assert_eq!(wall.weekday_mon0, 6);
    }
}
