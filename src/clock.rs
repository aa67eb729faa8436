use chrono::{DateTime, Duration, Utc};

/// Countdown coupled to an issued token. Cancellation and the
/// one-shot expiry edge share state: a cancelled or superseded clock
/// can never fire late against a token that no longer exists.
#[derive(Debug)]
pub struct ExpiryClock {
    deadline: DateTime<Utc>,
    fired: bool,
    cancelled: bool,
}

impl ExpiryClock {
    pub fn start(now: DateTime<Utc>, validity_seconds: i64) -> Self {
        ExpiryClock {
            deadline: now + Duration::seconds(validity_seconds),
            fired: false,
            cancelled: false,
        }
    }

    /// Whole seconds left, rounded up, clamped at zero.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        let ms = (self.deadline - now).num_milliseconds();
        if ms <= 0 {
            0
        } else {
            (ms + 999) / 1000
        }
    }

    pub fn countdown(&self, now: DateTime<Utc>) -> String {
        format_countdown(self.remaining_seconds(now))
    }

    /// Edge-triggered expiry check: reports true exactly once, at or
    /// after the deadline, and never once cancelled.
    pub fn poll(&mut self, now: DateTime<Utc>) -> bool {
        if self.cancelled || self.fired || now < self.deadline {
            return false;
        }
        self.fired = true;
        true
    }

    /// Idempotent.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }
}

/// `MM:SS`, clamped at `00:00`.
pub fn format_countdown(seconds: i64) -> String {
    let s = seconds.max(0);
    format!("{:02}:{:02}", s / 60, s % 60)
}
