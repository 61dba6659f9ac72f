//! The retry engine.
//!
//! Attempts run strictly one after another inside a single loop. Each attempt
//! is raced against the optional timeout, and a timeout ends the sequence. Any
//! other failure is checked against the attempt limit and match rules, and a
//! retry waits out the backoff delay before the next attempt starts.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::Instrument;

use crate::retry::error::{InvalidArgument, RetryError, TimeoutError};
use crate::retry::options::{callback_name, RetryConfig, RetryOptions};

/// Attempt information passed to the retried callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    current: u32,
    max: u32,
}

impl Attempt {
    /// Create attempt info. Mostly useful for calling callbacks directly in tests.
    pub fn new(current: u32, max: u32) -> Self {
        Self { current, max }
    }

    /// This attempt's number, starting at 1.
    pub fn current(&self) -> u32 {
        self.current
    }

    /// Inclusive attempt limit.
    pub fn max(&self) -> u32 {
        self.max
    }

    /// Returns true for the first attempt.
    pub fn is_first(&self) -> bool {
        self.current == 1
    }

    /// Returns true if no attempt follows this one.
    pub fn is_last(&self) -> bool {
        self.current >= self.max
    }
}

/// How a single attempt settled.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome<T, E> {
    /// The callback resolved.
    Success(T),
    /// The callback failed.
    Failure(E),
    /// The timeout fired first.
    TimedOut(TimeoutError),
}

impl<T, E> AttemptOutcome<T, E> {
    /// Convert into the value or the failure the engine will inspect.
    pub fn into_result(self) -> Result<T, RetryError<E>> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(err) => Err(RetryError::Operation(err)),
            Self::TimedOut(err) => Err(RetryError::Timeout(err)),
        }
    }
}

/// A validated retry sequence, ready to run.
///
/// Building a `Retry` normalizes the options up front, so invalid options are
/// reported before any attempt or future exists.
///
/// # Examples
///
/// ```rust
/// use stillwater_retry::{Attempt, Retry, RetryOptions};
///
/// # tokio_test::block_on(async {
/// let retry = Retry::new(
///     |attempt: Attempt| async move {
///         if attempt.current() < 3 {
///             Err(format!("not yet ({})", attempt.current()))
///         } else {
///             Ok(attempt.current())
///         }
///     },
///     RetryOptions::new().with_max(5).with_backoff_base(0.0),
/// )
/// .expect("valid options");
///
/// assert_eq!(retry.run().await, Ok(3));
/// # });
/// ```
///
/// ```rust
/// use stillwater_retry::{Attempt, InvalidArgument, Retry, RetryOptions};
///
/// let result = Retry::new(
///     |_: Attempt| async { Ok::<_, String>(()) },
///     RetryOptions::<String>::new(),
/// );
/// assert_eq!(result.err(), Some(InvalidArgument::MissingMax));
/// ```
pub struct Retry<F, E> {
    callback: F,
    config: RetryConfig<E>,
}

impl<F, E> Retry<F, E> {
    /// Validate `options` for `callback`.
    ///
    /// `options` is either a bare attempt count or [`RetryOptions`].
    pub fn new<O>(callback: F, options: O) -> Result<Self, InvalidArgument>
    where
        O: Into<RetryOptions<E>>,
    {
        let config = RetryConfig::normalize(options, callback_name::<F>())?;
        Ok(Self { callback, config })
    }

    /// The normalized configuration for the first attempt.
    pub fn config(&self) -> &RetryConfig<E> {
        &self.config
    }

    /// Run attempts until one succeeds, attempts run out, or a failure is not
    /// retryable.
    ///
    /// Resolves exactly once: with the first successful value, or with the
    /// failure of the last attempt made. An attempt that exceeds its timeout
    /// ends the sequence with [`RetryError::Timeout`], even if attempts remain.
    pub async fn run<Fut, T>(self) -> Result<T, RetryError<E>>
    where
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display + fmt::Debug + 'static,
    {
        let span = tracing::debug_span!(
            "retry",
            operation = %self.config.name(),
            max = self.config.max()
        );
        self.run_attempts().instrument(span).await
    }

    async fn run_attempts<Fut, T>(self) -> Result<T, RetryError<E>>
    where
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display + fmt::Debug + 'static,
    {
        let Self {
            mut callback,
            mut config,
        } = self;

        loop {
            if config.has_reporter() {
                config.report(&format!(
                    "Trying {} #{} at {}",
                    config.name(),
                    config.current(),
                    chrono::Local::now().format("%H:%M:%S")
                ));
            }
            tracing::debug!(attempt = config.current(), "starting attempt");

            let error = match attempt(&mut callback, &config).await.into_result() {
                Ok(value) => {
                    tracing::debug!(attempt = config.current(), "attempt succeeded");
                    return Ok(value);
                }
                Err(error) => error,
            };

            config.report(&error.describe());

            if !config.should_retry(&error) {
                tracing::warn!(attempt = config.current(), error = %error, "giving up");
                return Err(error);
            }

            let delay = config.retry_delay();
            config = config.advance()?;

            tracing::debug!(
                next_attempt = config.current(),
                delay_ms = millis(delay),
                error = %error,
                "retrying"
            );
            config.report(&format!("Retrying {} ({})", config.name(), config.current()));

            if !delay.is_zero() {
                config.report(&format!(
                    "Delaying retry of {} by {}ms",
                    config.name(),
                    millis(delay)
                ));
                tokio::time::sleep(delay).await;
            }
        }
    }
}

impl<F, E> fmt::Debug for Retry<F, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retry")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Fractional milliseconds, without the truncation of `as_millis`.
fn millis(delay: Duration) -> f64 {
    delay.as_nanos() as f64 / 1_000_000.0
}

/// Invoke the callback once, racing it against the configured timeout.
///
/// On timeout the callback's future is dropped.
async fn attempt<F, Fut, T, E>(callback: &mut F, config: &RetryConfig<E>) -> AttemptOutcome<T, E>
where
    F: FnMut(Attempt) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let pending = callback(Attempt::new(config.current(), config.max()));

    let settled = match config.timeout() {
        None => pending.await,
        Some(limit) => match tokio::time::timeout(limit, pending).await {
            Ok(settled) => settled,
            Err(_) => return AttemptOutcome::TimedOut(TimeoutError::new(config.name(), limit)),
        },
    };

    match settled {
        Ok(value) => AttemptOutcome::Success(value),
        Err(err) => AttemptOutcome::Failure(err),
    }
}

/// Retry `callback` according to `options`.
///
/// `options` is either a bare attempt count (`retry(op, 3)`) or
/// [`RetryOptions`]. Invalid options resolve to
/// [`RetryError::InvalidArgument`] without invoking the callback; use
/// [`Retry::new`] to catch them before awaiting.
///
/// # Examples
///
/// ```rust
/// use stillwater_retry::retry;
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// # tokio_test::block_on(async {
/// let calls = &AtomicU32::new(0);
///
/// let result = retry(
///     move |_| async move {
///         calls.fetch_add(1, Ordering::SeqCst);
///         Err::<(), _>("boom")
///     },
///     1,
/// )
/// .await;
///
/// assert_eq!(result.unwrap_err().into_operation(), Some("boom"));
/// assert_eq!(calls.load(Ordering::SeqCst), 1);
/// # });
/// ```
pub async fn retry<F, Fut, T, E, O>(callback: F, options: O) -> Result<T, RetryError<E>>
where
    F: FnMut(Attempt) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display + fmt::Debug + 'static,
    O: Into<RetryOptions<E>>,
{
    Retry::new(callback, options)?.run().await
}

#[cfg(test)]
mod engine_tests {
    use super::*;

    #[test]
    fn test_millis_keeps_fractions() {
        assert_eq!(millis(Duration::from_millis(1)), 1.0);
        assert_eq!(millis(Duration::from_micros(158_490)), 158.49);
    }

    #[test]
    fn test_millis_of_saturated_delay() {
        assert!(millis(Duration::MAX) > u64::MAX as f64);
    }
}
