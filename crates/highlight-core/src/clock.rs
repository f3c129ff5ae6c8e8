//! Wall-clock source for `updatedAt`.

/// Current time in whole seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_epoch_seconds(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_seconds(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Always returns the same instant. Used by tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_epoch_seconds(&self) -> i64 {
        self.0
    }
}
