//! Retransmit timer state for a channel.
//!
//! The sender sees a single logical timer through
//! [`crate::context::SenderContext`].  Channels back it with a
//! [`RetransmitTimer`], which stores at most one deadline:
//! - arming while armed **replaces** the old deadline;
//! - a deadline that has been replaced or cancelled never fires.
//!
//! The deadline type is generic so the simulator can use virtual time
//! (`Duration` since start) and the UDP link can use `tokio::time::Instant`.

/// A single re-armable deadline.
#[derive(Debug, Clone)]
pub struct RetransmitTimer<T> {
    deadline: Option<T>,
    /// Number of times the timer has been armed, for diagnostics.
    arms: u64,
}

impl<T> Default for RetransmitTimer<T> {
    fn default() -> Self {
        Self {
            deadline: None,
            arms: 0,
        }
    }
}

impl<T: Copy + Ord> RetransmitTimer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer, superseding any pending deadline.
    pub fn arm(&mut self, deadline: T) {
        self.deadline = Some(deadline);
        self.arms += 1;
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<T> {
        self.deadline
    }

    pub fn arm_count(&self) -> u64 {
        self.arms
    }

    /// Disarm and return `true` if the current deadline is at or before `now`.
    ///
    /// A wake-up scheduled for a deadline that was later replaced finds the
    /// new, later deadline here and returns `false`.
    pub fn fire_if_due(&mut self, now: T) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn starts_disarmed() {
        let mut t = RetransmitTimer::<Duration>::new();
        assert!(!t.is_armed());
        assert!(!t.fire_if_due(ms(1_000)));
    }

    #[test]
    fn fires_once_at_deadline() {
        let mut t = RetransmitTimer::new();
        t.arm(ms(300));
        assert!(!t.fire_if_due(ms(299)));
        assert!(t.fire_if_due(ms(300)));
        assert!(!t.is_armed());
        assert!(!t.fire_if_due(ms(301)));
    }

    #[test]
    fn rearm_replaces_deadline() {
        let mut t = RetransmitTimer::new();
        t.arm(ms(300));
        t.arm(ms(350));
        assert_eq!(t.arm_count(), 2);
        // The wake-up for the first deadline is stale.
        assert!(!t.fire_if_due(ms(300)));
        assert!(t.fire_if_due(ms(350)));
    }

    #[test]
    fn cancel_suppresses_fire() {
        let mut t = RetransmitTimer::new();
        t.arm(ms(10));
        t.cancel();
        assert_eq!(t.deadline(), None);
        assert!(!t.fire_if_due(ms(10)));
    }
}
