//! Jittered delay between poll cycles.
//!
//! The delay is the sum of two independently sampled waits, each drawn
//! uniformly (millisecond resolution) from an inclusive window:
//!
//! ```text
//! delay = uniform(first.min ..= first.max) + uniform(second.min ..= second.max)
//! ```
//!
//! The defaults (`10s..=10s` then `10s..=15s`) give a total of 20-25 seconds.

use crate::{CoreError, Result};
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayWindow {
    min: Duration,
    max: Duration,
}

impl DelayWindow {
    pub fn new(min: Duration, max: Duration) -> Result<Self> {
        if min > max {
            return Err(CoreError::InvalidDelayWindow(format!(
                "min {}ms exceeds max {}ms",
                min.as_millis(),
                max.as_millis()
            )));
        }
        Ok(Self { min, max })
    }

    pub fn fixed(delay: Duration) -> Self {
        Self {
            min: delay,
            max: delay,
        }
    }

    /// Parse `"<min>-<max>"` or a single `"<ms>"`, both in milliseconds.
    pub fn parse_millis(raw: &str) -> Result<Self> {
        let parse = |s: &str| {
            s.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| CoreError::InvalidDelayWindow(format!("'{raw}': {e}")))
        };

        match raw.split_once('-') {
            Some((min, max)) => Self::new(parse(min)?, parse(max)?),
            None => Ok(Self::fixed(parse(raw)?)),
        }
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let lo = millis(self.min);
        let hi = millis(self.max);
        Duration::from_millis(rng.gen_range(lo..=hi))
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    pub first: DelayWindow,
    pub second: DelayWindow,
}

impl PollSchedule {
    pub fn new(first: DelayWindow, second: DelayWindow) -> Self {
        Self { first, second }
    }

    /// A schedule with no delay at all.
    pub fn immediate() -> Self {
        Self::new(
            DelayWindow::fixed(Duration::ZERO),
            DelayWindow::fixed(Duration::ZERO),
        )
    }

    pub fn next_delay(&self) -> Duration {
        self.sample(&mut rand::thread_rng())
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let first = self.first.sample(rng);
        first.saturating_add(self.second.sample(rng))
    }

    /// Smallest and largest delay this schedule can produce.
    pub fn bounds(&self) -> (Duration, Duration) {
        (
            self.first.min.saturating_add(self.second.min),
            self.first.max.saturating_add(self.second.max),
        )
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            first: DelayWindow::fixed(Duration::from_secs(10)),
            second: DelayWindow {
                min: Duration::from_secs(10),
                max: Duration::from_secs(15),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_window_rejects_inverted_bounds() {
        let result = DelayWindow::new(Duration::from_secs(5), Duration::from_secs(1));
        assert!(matches!(result, Err(CoreError::InvalidDelayWindow(_))));
    }

    #[test]
    fn test_parse_millis_range_and_single() {
        let range = DelayWindow::parse_millis("1000-2500").unwrap();
        assert_eq!(range.min(), Duration::from_millis(1000));
        assert_eq!(range.max(), Duration::from_millis(2500));

        let single = DelayWindow::parse_millis(" 750 ").unwrap();
        assert_eq!(single, DelayWindow::fixed(Duration::from_millis(750)));
    }

    #[test]
    fn test_parse_millis_rejects_garbage() {
        assert!(DelayWindow::parse_millis("soon").is_err());
        assert!(DelayWindow::parse_millis("9-1").is_err());
    }

    #[test]
    fn test_fixed_window_always_returns_same_delay() {
        let mut rng = StdRng::seed_from_u64(3);
        let window = DelayWindow::fixed(Duration::from_secs(10));
        for _ in 0..20 {
            assert_eq!(window.sample(&mut rng), Duration::from_secs(10));
        }
    }

    #[test]
    fn test_default_schedule_bounds() {
        let schedule = PollSchedule::default();
        assert_eq!(
            schedule.bounds(),
            (Duration::from_secs(20), Duration::from_secs(25))
        );
    }

    #[test]
    fn test_immediate_schedule_is_zero() {
        assert_eq!(PollSchedule::immediate().next_delay(), Duration::ZERO);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn property_sampled_delay_within_bounds(
            a in 0u64..60_000,
            b in 0u64..60_000,
            c in 0u64..60_000,
            d in 0u64..60_000,
            seed in any::<u64>(),
        ) {
            let first = DelayWindow::new(
                Duration::from_millis(a.min(b)),
                Duration::from_millis(a.max(b)),
            ).unwrap();
            let second = DelayWindow::new(
                Duration::from_millis(c.min(d)),
                Duration::from_millis(c.max(d)),
            ).unwrap();
            let schedule = PollSchedule::new(first, second);
            let (lo, hi) = schedule.bounds();

            let mut rng = StdRng::seed_from_u64(seed);
            let delay = schedule.sample(&mut rng);
            prop_assert!(delay >= lo && delay <= hi);
        }
    }
}
