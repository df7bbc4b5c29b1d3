use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::time::Duration;

type GovernorLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Non-blocking send budget: at most `max_alerts` within any `window`.
///
/// A GCRA limiter with a burst of `max_alerts` that regains one slot per
/// `window`, so no span shorter than `window` ever admits more than
/// `max_alerts` sends. Callers drop the alert when [`Self::try_acquire`]
/// fails; nothing queues.
pub struct AlertLimiter {
    limiter: GovernorLimiter,
    max_alerts: NonZeroU32,
    window: Duration,
}

impl AlertLimiter {
    /// A zero `max_alerts` or `window` is raised to the smallest usable value.
    #[must_use]
    pub fn new(max_alerts: u32, window: Duration) -> Self {
        let max_alerts = NonZeroU32::new(max_alerts).unwrap_or(NonZeroU32::MIN);
        let window = window.max(Duration::from_millis(1));
        let quota = Quota::with_period(window)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(max_alerts);

        Self {
            limiter: RateLimiter::direct(quota),
            max_alerts,
            window,
        }
    }

    /// Consumes one slot if available.
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    #[must_use]
    pub const fn max_alerts(&self) -> u32 {
        self.max_alerts.get()
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }
}
