use jiff::Timestamp;

/// A source of wall-clock time.
///
/// Expiration checks and circuit breaker timeouts read the time through this
/// trait so that tests can drive them deterministically.
pub trait Clock: std::fmt::Debug + Send + Sync + 'static {
    /// Returns the current time of the clock.
    fn now(&self) -> Timestamp;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}
