//! Backoff delay calculation.

use std::time::Duration;

/// Double-exponential backoff between attempts.
///
/// The delay after attempt `n` (1-indexed) fails is
/// `base ^ (exponent ^ (n - 1))` milliseconds. With the defaults
/// (`base = 100`, `exponent = 1.1`) that gives roughly
/// 100ms, 158ms, 263ms, 459ms, 848ms, ...
///
/// A `base` of zero disables delays entirely.
///
/// # Examples
///
/// ```rust
/// use stillwater_retry::Backoff;
/// use std::time::Duration;
///
/// let backoff = Backoff::new(100.0, 3.0);
///
/// assert_eq!(backoff.delay_for_attempt(1), Duration::from_millis(100));
/// assert_eq!(backoff.delay_for_attempt(2), Duration::from_secs(1000));
///
/// assert!(Backoff::none().delay_for_attempt(5).is_zero());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    base: f64,
    exponent: f64,
    max_delay: Option<Duration>,
}

impl Backoff {
    /// Default base, in milliseconds.
    pub const DEFAULT_BASE: f64 = 100.0;
    /// Default exponent.
    pub const DEFAULT_EXPONENT: f64 = 1.1;

    /// Create a backoff with the given base (milliseconds) and exponent.
    pub fn new(base: f64, exponent: f64) -> Self {
        Self {
            base,
            exponent,
            max_delay: None,
        }
    }

    /// A backoff that never waits.
    pub fn none() -> Self {
        Self::new(0.0, Self::DEFAULT_EXPONENT)
    }

    /// Cap every computed delay at `max`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stillwater_retry::Backoff;
    /// use std::time::Duration;
    ///
    /// let backoff = Backoff::new(100.0, 3.0).with_max_delay(Duration::from_millis(250));
    ///
    /// assert_eq!(backoff.delay_for_attempt(1), Duration::from_millis(100));
    /// assert_eq!(backoff.delay_for_attempt(2), Duration::from_millis(250)); // capped
    /// ```
    pub fn with_max_delay(mut self, max: Duration) -> Self {
        self.max_delay = Some(max);
        self
    }

    /// Base delay in milliseconds.
    pub fn base(&self) -> f64 {
        self.base
    }

    /// Growth exponent.
    pub fn exponent(&self) -> f64 {
        self.exponent
    }

    /// The delay cap, if any.
    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }

    /// Raw delay in milliseconds after attempt `attempt` (1-indexed) fails.
    pub fn delay_millis(&self, attempt: u32) -> f64 {
        let step = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        self.base.powf(self.exponent.powi(step))
    }

    /// Delay to wait after attempt `attempt` (1-indexed) fails.
    ///
    /// Delays too large to represent saturate to the cap, or to `Duration::MAX`
    /// when no cap is set.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let millis = self.delay_millis(attempt);
        let delay = if millis.is_nan() || millis <= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(millis / 1000.0).unwrap_or(Duration::MAX)
        };

        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE, Self::DEFAULT_EXPONENT)
    }
}
