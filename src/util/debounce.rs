/// Holds back a value until no new value has arrived for a quiet period.
///
/// Time is passed in explicitly (seconds, see [`super::time::current_time_secs`])
/// so the owner decides when to poll.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    quiet_period: f64,
    pending: Option<(T, f64)>,
}

impl<T> Debouncer<T> {
    pub fn new(quiet_period_secs: f64) -> Self {
        Self {
            quiet_period: quiet_period_secs.max(0.0),
            pending: None,
        }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(millis as f64 / 1000.0)
    }

    pub fn quiet_period_secs(&self) -> f64 {
        self.quiet_period
    }

    /// Replaces any pending value and restarts the quiet period
    pub fn schedule(&mut self, value: T, now: f64) {
        self.pending = Some((value, now));
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Returns the pending value once the quiet period has elapsed
    pub fn take_ready(&mut self, now: f64) -> Option<T> {
        match &self.pending {
            Some((_, scheduled_at)) if now - scheduled_at >= self.quiet_period => {
                self.pending.take().map(|(value, _)| value)
            }
            _ => None,
        }
    }

    /// Returns the pending value regardless of the quiet period
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waits_for_quiet_period() {
        let mut debouncer = Debouncer::from_millis(500);
        debouncer.schedule(1, 10.0);
        assert_eq!(debouncer.take_ready(10.2), None);
        debouncer.schedule(2, 10.3);
        assert_eq!(debouncer.take_ready(10.7), None);
        assert_eq!(debouncer.take_ready(10.8), Some(2));
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.take_ready(20.0), None);
    }

    #[test]
    fn test_flush_ignores_timer() {
        let mut debouncer = Debouncer::new(5.0);
        debouncer.schedule("viewport", 0.0);
        assert_eq!(debouncer.flush(), Some("viewport"));
        assert_eq!(debouncer.flush(), None);
    }
}
