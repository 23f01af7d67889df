//! A tri-state circuit breaker guarding calls to the cache tier.
//!
//! ```text
//! Closed   --(failure_threshold consecutive failures)--> Open
//! Open     --(reset_timeout since last failure)--------> HalfOpen
//! HalfOpen --(success_threshold consecutive successes)-> Closed
//! HalfOpen --(any failure)------------------------------> Open
//! ```
//!
//! The breaker is advisory: it never blocks and none of its operations can
//! fail. Callers ask [`CircuitBreaker::is_open`] before a cache call and
//! report the outcome with [`CircuitBreaker::record_success`] or
//! [`CircuitBreaker::record_failure`]. Calls that may be cancelled take a
//! [`BreakerPermit`] instead, so an abandoned probe cannot hold the breaker
//! half-open.

use jiff::{SignedDuration, Timestamp};
use parking_lot::Mutex;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tinylink_core::{Clock, SystemClock};
use tracing::{info, warn};
use typed_builder::TypedBuilder;

/// The state of a [`CircuitBreaker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls flow normally.
    Closed,
    /// Calls are skipped until the reset timeout elapses.
    Open,
    /// A limited number of probe calls are let through.
    HalfOpen,
}

impl Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => f.write_str("closed"),
            CircuitState::Open => f.write_str("open"),
            CircuitState::HalfOpen => f.write_str("half-open"),
        }
    }
}

/// Thresholds and timeouts for a [`CircuitBreaker`].
#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct CircuitBreakerSettings {
    /// Consecutive failures that open a closed breaker.
    #[builder(default = 5)]
    pub failure_threshold: u32,
    /// How long the breaker stays open after the last failure.
    #[builder(default = Duration::from_secs(30))]
    pub reset_timeout: Duration,
    /// Consecutive half-open successes that close the breaker.
    #[builder(default = 2)]
    pub success_threshold: u32,
    /// Probes admitted concurrently while half-open. Defaults to the
    /// success threshold.
    #[builder(default, setter(strip_option))]
    pub half_open_max_probes: Option<u32>,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A point-in-time copy of the breaker's state and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub last_failure_at: Option<Timestamp>,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_failure_at: Option<Timestamp>,
    probes_in_flight: u32,
    /// Bumped on every state change; permits from an older generation
    /// report into a state they were not admitted under.
    generation: u64,
}

impl Inner {
    fn reset_counters(&mut self) {
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        self.probes_in_flight = 0;
    }

    fn enter(&mut self, state: CircuitState) {
        self.state = state;
        self.generation = self.generation.wrapping_add(1);
    }
}

/// Admission for a single guarded call, handed out by
/// [`CircuitBreaker::try_acquire`].
///
/// Report the outcome with [`BreakerPermit::success`] or
/// [`BreakerPermit::failure`]. A permit dropped without an outcome, because
/// the call was cancelled, gives its half-open probe slot back. An outcome
/// reported after the breaker changed state is ignored.
#[must_use = "dropping a permit discards the call outcome"]
#[derive(Debug)]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    probe: bool,
    settled: bool,
}

impl BreakerPermit<'_> {
    /// True when this permit holds one of the half-open probe slots.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn success(mut self) {
        self.settled = true;
        self.breaker.settle(self.generation, self.probe, true);
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.settle(self.generation, self.probe, false);
    }
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            self.breaker.release_probe(self.generation);
        }
    }
}

/// A thread-safe circuit breaker.
///
/// All state lives behind one mutex, so a threshold crossing or the
/// Open -> HalfOpen timeout transition happens exactly once even when many
/// tasks report outcomes at the same time.
pub struct CircuitBreaker {
    failure_threshold: u32,
    success_threshold: u32,
    half_open_max_probes: u32,
    reset_timeout: SignedDuration,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Creates a closed breaker backed by the system clock.
    pub fn new(settings: CircuitBreakerSettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    /// Creates a closed breaker that reads time from `clock`.
    pub fn with_clock(settings: CircuitBreakerSettings, clock: Arc<dyn Clock>) -> Self {
        let success_threshold = settings.success_threshold.max(1);
        Self {
            failure_threshold: settings.failure_threshold.max(1),
            success_threshold,
            half_open_max_probes: settings
                .half_open_max_probes
                .unwrap_or(success_threshold)
                .max(1),
            reset_timeout: SignedDuration::try_from(settings.reset_timeout)
                .unwrap_or(SignedDuration::MAX),
            clock,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                last_failure_at: None,
                probes_in_flight: 0,
                generation: 0,
            }),
        }
    }

    /// Returns true when the caller must skip the cache.
    ///
    /// While open, this moves the breaker to half-open once the reset
    /// timeout has elapsed. While half-open, each `false` answer admits one
    /// probe; once the probe budget is spent the breaker reports open until
    /// an outcome is recorded with [`record_success`](Self::record_success)
    /// or [`record_failure`](Self::record_failure).
    pub fn is_open(&self) -> bool {
        self.admit().is_none()
    }

    /// Admits one call, or returns `None` when the caller must skip the
    /// cache. Transitions exactly like [`is_open`](Self::is_open), but the
    /// outcome travels with the returned permit.
    pub fn try_acquire(&self) -> Option<BreakerPermit<'_>> {
        let (generation, probe) = self.admit()?;
        Some(BreakerPermit {
            breaker: self,
            generation,
            probe,
            settled: false,
        })
    }

    fn admit(&self) -> Option<(u64, bool)> {
        let mut inner = self.inner.lock();

        if inner.state == CircuitState::Open {
            let elapsed = inner
                .last_failure_at
                .map(|at| self.clock.now().duration_since(at));
            if elapsed.is_none_or(|elapsed| elapsed >= self.reset_timeout) {
                inner.enter(CircuitState::HalfOpen);
                inner.reset_counters();
                info!("cache circuit breaker half-open, probing backend");
            }
        }

        match inner.state {
            CircuitState::Closed => Some((inner.generation, false)),
            CircuitState::Open => None,
            CircuitState::HalfOpen => {
                if inner.probes_in_flight >= self.half_open_max_probes {
                    return None;
                }
                inner.probes_in_flight += 1;
                Some((inner.generation, true))
            }
        }
    }

    /// Records a successful cache call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.probes_in_flight = inner.probes_in_flight.saturating_sub(1);
        }
        self.on_success(&mut inner);
    }

    /// Records a failed cache call.
    pub fn record_failure(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        self.on_failure(&mut inner, now);
    }

    fn settle(&self, generation: u64, probe: bool, succeeded: bool) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        if inner.generation != generation {
            if !succeeded && inner.state == CircuitState::Open {
                inner.last_failure_at = Some(now);
            }
            return;
        }
        if probe {
            inner.probes_in_flight = inner.probes_in_flight.saturating_sub(1);
        }
        if succeeded {
            self.on_success(&mut inner);
        } else {
            self.on_failure(&mut inner, now);
        }
    }

    fn release_probe(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation == generation {
            inner.probes_in_flight = inner.probes_in_flight.saturating_sub(1);
        }
    }

    fn on_success(&self, inner: &mut Inner) {
        match inner.state {
            CircuitState::Closed => inner.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.success_threshold {
                    inner.enter(CircuitState::Closed);
                    inner.reset_counters();
                    info!("cache circuit breaker closed");
                }
            }
            // A call admitted before the breaker opened; it proves nothing
            // about the cooldown.
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self, inner: &mut Inner, now: Timestamp) {
        inner.last_failure_at = Some(now);

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.enter(CircuitState::Open);
                    warn!(
                        failures = inner.consecutive_failures,
                        "cache circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.enter(CircuitState::Open);
                inner.reset_counters();
                warn!("cache circuit breaker probe failed, reopening");
            }
            CircuitState::Open => {}
        }
    }

    /// Returns the current state without triggering any transition.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        BreakerSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            consecutive_successes: inner.consecutive_successes,
            last_failure_at: inner.last_failure_at,
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerSettings::default())
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("failure_threshold", &self.failure_threshold)
            .field("success_threshold", &self.success_threshold)
            .field("reset_timeout", &self.reset_timeout)
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinylink_test_infra::ManualClock;

    fn breaker(clock: &ManualClock) -> CircuitBreaker {
        CircuitBreaker::with_clock(
            CircuitBreakerSettings::builder()
                .failure_threshold(5)
                .reset_timeout(Duration::from_secs(30))
                .success_threshold(2)
                .build(),
            Arc::new(clock.clone()),
        )
    }

    fn trip(breaker: &CircuitBreaker) {
        for _ in 0..5 {
            breaker.record_failure();
        }
    }

    #[test]
    fn starts_closed() {
        let clock = ManualClock::starting_now();
        let breaker = breaker(&clock);

        assert!(!breaker.is_open());
        assert_eq!(
            breaker.snapshot(),
            BreakerSnapshot {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                last_failure_at: None,
            }
        );
    }

    #[test]
    fn opens_at_failure_threshold() {
        let clock = ManualClock::starting_now();
        let breaker = breaker(&clock);

        for _ in 0..4 {
            breaker.record_failure();
        }
        assert!(!breaker.is_open());

        breaker.record_failure();
        assert!(breaker.is_open());
        assert_eq!(breaker.snapshot().last_failure_at, Some(clock.now()));
    }

    #[test]
    fn success_resets_failure_streak() {
        let clock = ManualClock::starting_now();
        let breaker = breaker(&clock);

        for _ in 0..4 {
            breaker.record_failure();
        }
        breaker.record_success();
        assert_eq!(breaker.snapshot().consecutive_failures, 0);

        for _ in 0..4 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn stays_open_until_reset_timeout() {
        let clock = ManualClock::starting_now();
        let breaker = breaker(&clock);
        trip(&breaker);

        clock.advance(SignedDuration::from_secs(29));
        assert!(breaker.is_open());
        assert_eq!(breaker.state(), CircuitState::Open);

        clock.advance(SignedDuration::from_secs(1));
        assert!(!breaker.is_open());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.consecutive_failures, 0);
        assert_eq!(snapshot.consecutive_successes, 0);
    }

    #[test]
    fn half_open_closes_after_success_threshold() {
        let clock = ManualClock::starting_now();
        let breaker = breaker(&clock);
        trip(&breaker);
        clock.advance(SignedDuration::from_secs(30));

        assert!(!breaker.is_open());
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert_eq!(breaker.snapshot().consecutive_successes, 1);

        assert!(!breaker.is_open());
        breaker.record_success();

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.consecutive_failures, 0);
        assert_eq!(snapshot.consecutive_successes, 0);
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let clock = ManualClock::starting_now();
        let breaker = breaker(&clock);
        trip(&breaker);
        clock.advance(SignedDuration::from_secs(30));

        assert!(!breaker.is_open());
        breaker.record_success();
        breaker.record_failure();

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.consecutive_successes, 0);
        assert_eq!(snapshot.last_failure_at, Some(clock.now()));
        assert!(breaker.is_open());

        // the cooldown restarts from the probe failure
        clock.advance(SignedDuration::from_secs(29));
        assert!(breaker.is_open());
        clock.advance(SignedDuration::from_secs(1));
        assert!(!breaker.is_open());
    }

    #[test]
    fn half_open_limits_concurrent_probes() {
        let clock = ManualClock::starting_now();
        let breaker = breaker(&clock);
        trip(&breaker);
        clock.advance(SignedDuration::from_secs(30));

        // two probes admitted, the third caller is turned away
        assert!(!breaker.is_open());
        assert!(!breaker.is_open());
        assert!(breaker.is_open());

        breaker.record_success();
        assert!(!breaker.is_open());
    }

    #[test]
    fn late_failure_while_open_extends_cooldown() {
        let clock = ManualClock::starting_now();
        let breaker = breaker(&clock);
        trip(&breaker);

        clock.advance(SignedDuration::from_secs(20));
        breaker.record_failure();
        clock.advance(SignedDuration::from_secs(20));
        assert!(breaker.is_open());

        clock.advance(SignedDuration::from_secs(10));
        assert!(!breaker.is_open());
    }

    #[test]
    fn concurrent_checks_transition_once() {
        let clock = ManualClock::starting_now();
        let breaker = Arc::new(
            CircuitBreaker::with_clock(
                CircuitBreakerSettings::builder()
                    .half_open_max_probes(1)
                    .build(),
                Arc::new(clock.clone()),
            ),
        );
        trip(&breaker);
        clock.advance(SignedDuration::from_secs(30));

        let admitted: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| {
                    let breaker = Arc::clone(&breaker);
                    scope.spawn(move || usize::from(!breaker.is_open()))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(admitted, 1);
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn dropped_probe_permits_are_returned() {
        let clock = ManualClock::starting_now();
        let breaker = breaker(&clock);
        trip(&breaker);
        clock.advance(SignedDuration::from_secs(30));

        let first = breaker.try_acquire().unwrap();
        let second = breaker.try_acquire().unwrap();
        assert!(first.is_probe() && second.is_probe());
        assert!(breaker.try_acquire().is_none());

        drop(first);
        drop(second);

        breaker.try_acquire().unwrap().success();
        breaker.try_acquire().unwrap().success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn permit_failure_reopens_half_open_breaker() {
        let clock = ManualClock::starting_now();
        let breaker = breaker(&clock);
        trip(&breaker);
        clock.advance(SignedDuration::from_secs(30));

        breaker.try_acquire().unwrap().failure();

        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.snapshot().last_failure_at, Some(clock.now()));
    }

    #[test]
    fn outcome_from_before_half_open_is_ignored() {
        let clock = ManualClock::starting_now();
        let breaker = breaker(&clock);

        let slow_call = breaker.try_acquire().unwrap();
        assert!(!slow_call.is_probe());
        trip(&breaker);
        clock.advance(SignedDuration::from_secs(30));

        let probe = breaker.try_acquire().unwrap();
        slow_call.success();

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::HalfOpen);
        assert_eq!(snapshot.consecutive_successes, 0);

        // the probe slot is still held, so only one more caller fits
        let other = breaker.try_acquire().unwrap();
        assert!(breaker.try_acquire().is_none());
        other.success();
        probe.success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn late_permit_failure_while_open_extends_cooldown() {
        let clock = ManualClock::starting_now();
        let breaker = breaker(&clock);

        let slow_call = breaker.try_acquire().unwrap();
        trip(&breaker);
        clock.advance(SignedDuration::from_secs(20));
        slow_call.failure();

        clock.advance(SignedDuration::from_secs(20));
        assert!(breaker.is_open());
        clock.advance(SignedDuration::from_secs(10));
        assert!(!breaker.is_open());
    }
}
