use std::time::Duration;

/// Exponential backoff with a cap, shared by the callback dispatcher and any other component
/// that retries transient failures (file staging downloads, transient store
/// errors).
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base: Duration,
    factor: f64,
    cap: Duration,
    max_attempts: u32,
}

impl Backoff {
    pub const fn new(base: Duration, factor: f64, cap: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            factor,
            cap,
            max_attempts,
        }
    }

    /// The dispatcher's default policy: base 1s, factor 2, cap 60s, 5 attempts.
    pub const fn callback_default() -> Self {
        Self::new(Duration::from_secs(1), 2.0, Duration::from_secs(60), 5)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the given 1-indexed attempt number, `None` once attempts
    /// are exhausted.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let scaled = self.base.as_secs_f64() * self.factor.powi(attempt as i32 - 1);
        let capped = scaled.min(self.cap.as_secs_f64()).max(0.0);
        Some(Duration::from_secs_f64(capped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn grows_exponentially_then_caps() {
        let backoff = Backoff::callback_default();
        assert_eq!(backoff.delay_for_attempt(1), Some(Duration::from_secs(1)));
        assert_eq!(backoff.delay_for_attempt(2), Some(Duration::from_secs(2)));
        assert_eq!(backoff.delay_for_attempt(3), Some(Duration::from_secs(4)));
        assert_eq!(backoff.delay_for_attempt(4), Some(Duration::from_secs(8)));
        assert_eq!(backoff.delay_for_attempt(5), None);
    }

    #[test]
    fn caps_growth_for_long_retry_chains() {
        let backoff = Backoff::new(Duration::from_secs(1), 2.0, Duration::from_secs(10), 20);
        assert_eq!(backoff.delay_for_attempt(10), Some(Duration::from_secs(10)));
    }
}
