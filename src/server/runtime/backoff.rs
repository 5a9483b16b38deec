//! Back-off policy for the server accept loop.

use std::time::Duration;

const MIN_DELAY: Duration = Duration::from_millis(1);

/// Exponential back-off applied when `accept()` fails.
///
/// The first retry waits `initial_delay`; each further consecutive failure
/// doubles the wait up to `max_delay`. A successful accept resets it.
///
/// Defaults: 10 ms initial, 1 s cap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Delay used for the first retry after an `accept()` failure.
    pub initial_delay: Duration,
    /// Upper bound for the doubled delay.
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl BackoffConfig {
    /// Raise both delays to at least one millisecond and order them.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use framecast::server::BackoffConfig;
    ///
    /// let cfg = BackoffConfig {
    ///     initial_delay: Duration::from_millis(5),
    ///     max_delay: Duration::ZERO,
    /// }
    /// .normalized();
    /// assert_eq!(cfg.initial_delay, Duration::from_millis(1));
    /// assert_eq!(cfg.max_delay, Duration::from_millis(5));
    /// ```
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.initial_delay = self.initial_delay.max(MIN_DELAY);
        self.max_delay = self.max_delay.max(MIN_DELAY);
        if self.initial_delay > self.max_delay {
            std::mem::swap(&mut self.initial_delay, &mut self.max_delay);
        }
        self
    }

    /// Delay to use after a failure that waited `current`.
    #[must_use]
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Duration::from_millis(10), Duration::from_millis(20))]
    #[case(Duration::from_millis(600), Duration::from_secs(1))]
    #[case(Duration::from_secs(1), Duration::from_secs(1))]
    fn delay_doubles_up_to_cap(#[case] current: Duration, #[case] expected: Duration) {
        assert_eq!(BackoffConfig::default().next_delay(current), expected);
    }

    #[test]
    fn normalized_keeps_valid_config() {
        let cfg = BackoffConfig::default();
        assert_eq!(cfg.normalized(), cfg);
    }
}
