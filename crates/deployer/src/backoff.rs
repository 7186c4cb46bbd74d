use {crate::config::ConfirmationPolicy, std::time::Duration};

/// Exponentially growing delays, doubling from `initial` until `max` is
/// reached and staying there.
#[derive(Clone, Debug)]
pub struct Backoff {
    next: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            next: initial.min(max),
            max,
        }
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next;
        self.next = current.saturating_mul(2).min(self.max);
        Some(current)
    }
}

impl ConfirmationPolicy {
    /// Delays to wait before each receipt poll. Yields exactly
    /// `max_attempts` items.
    pub fn backoff(&self) -> impl Iterator<Item = Duration> + use<> {
        Backoff::new(self.initial_backoff, self.max_backoff).take(self.max_attempts as usize)
    }
}
