//! A trivial wall-clock stopwatch, used by the CLI's `--measure` flag
//! to time one or more pipeline stages and report them together.

use std::time::Instant;

pub struct Clock {
    instant: Instant,
}

impl Default for Clock {
    fn default() -> Clock {
        Clock::new()
    }
}

impl Clock {
    pub fn new() -> Clock {
        Clock {
            instant: Instant::now(),
        }
    }

    /// Elapsed time since construction, in fractional seconds.
    pub fn seconds(&self) -> f64 {
        let e = self.instant.elapsed();
        (e.as_secs() as f64) + (0.001 * e.subsec_millis() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_seconds_is_monotonically_nondecreasing() {
        let clock = Clock::new();
        let a = clock.seconds();
        sleep(Duration::from_millis(5));
        let b = clock.seconds();
        assert!(b >= a);
    }
}
