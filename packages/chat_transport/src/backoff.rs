use std::time::Duration;

/// Multiplicative reconnect backoff with an upper bound.
///
/// [`next_delay`](Self::next_delay) hands out the delay for the attempt being
/// scheduled and grows the stored delay for the one after it. A successful
/// open calls [`reset`](Self::reset).
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    factor: f64,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, factor: f64) -> Self {
        Self {
            initial,
            max: max.max(initial),
            factor: factor.max(1.0),
            current: initial,
        }
    }

    /// Delay that the next scheduled attempt will wait.
    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.max.min(delay.mul_f64(self.factor));
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_backoff() -> Backoff {
        Backoff::new(Duration::from_secs(20), Duration::from_secs(30), 1.5)
    }

    #[test]
    fn test_sequence_is_capped() {
        let mut backoff = default_backoff();
        let delays: Vec<u128> = (0..4).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![20_000, 30_000, 30_000, 30_000]);
    }

    #[test]
    fn test_growth_follows_factor() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(10), 1.5);
        let delays: Vec<u128> = (0..7).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![1_000, 1_500, 2_250, 3_375, 5_062, 7_593, 10_000]);
    }

    #[test]
    fn test_reset_returns_to_initial() {
        let mut backoff = default_backoff();
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.current(), Duration::from_secs(30));

        backoff.reset();
        assert_eq!(backoff.current(), Duration::from_secs(20));
        assert_eq!(backoff.next_delay(), Duration::from_secs(20));
    }

    #[test]
    fn test_degenerate_settings_never_shrink() {
        let mut backoff = Backoff::new(Duration::from_secs(5), Duration::from_secs(1), 0.5);
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
    }
}
