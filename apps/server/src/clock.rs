use chrono::NaiveDateTime;

/// Source of "now" for booking decisions. Wall-clock local time, no timezones.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    /// Unix seconds, used for session expiry.
    fn timestamp(&self) -> i64;
}

/// The host's local clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }

    fn timestamp(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Clock pinned to a single instant, for tests.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }

    fn timestamp(&self) -> i64 {
        self.0.and_utc().timestamp()
    }
}
