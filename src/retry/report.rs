//! Reporting hooks for observing a retry sequence.

use crate::retry::options::RetryConfig;

/// Observer notified at each step of a retry sequence.
///
/// The engine calls [`Reporter::report`] before every attempt, after every
/// failure (with [`RetryError::describe`](crate::RetryError::describe)), and
/// when a retry is scheduled. Reporting never influences control
/// flow, and a panicking reporter is not caught.
///
/// Any `Fn(&str, &RetryConfig<E>)` closure is a reporter:
///
/// ```rust
/// use stillwater_retry::{retry, RetryConfig, RetryOptions};
/// use std::sync::{Arc, Mutex};
///
/// # tokio_test::block_on(async {
/// let log = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&log);
///
/// let options = RetryOptions::new()
///     .with_max(2)
///     .with_backoff_base(0.0)
///     .with_name("ping")
///     .with_reporter(move |message: &str, config: &RetryConfig<String>| {
///         sink.lock().unwrap().push(format!("[{}] {}", config.current(), message));
///     });
///
/// let _ = retry(|_| async { Err::<(), _>("down".to_string()) }, options).await;
///
/// let log = log.lock().unwrap();
/// assert!(log[0].starts_with("[1] Trying ping #1 at "));
/// assert_eq!(log[1], r#"[1] "down""#);
/// assert_eq!(log[2], "[2] Retrying ping (2)");
/// # });
/// ```
pub trait Reporter<E>: Send + Sync {
    /// Receive one progress message for the sequence described by `config`.
    fn report(&self, message: &str, config: &RetryConfig<E>);
}

impl<E, F> Reporter<E> for F
where
    F: Fn(&str, &RetryConfig<E>) + Send + Sync,
{
    fn report(&self, message: &str, config: &RetryConfig<E>) {
        self(message, config)
    }
}

/// Reporter that forwards every message to `tracing` at `INFO` level.
///
/// Events carry the sequence's name (as `operation`), `attempt` and `max` as fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl<E> Reporter<E> for TracingReporter {
    fn report(&self, message: &str, config: &RetryConfig<E>) {
        tracing::info!(
            operation = %config.name(),
            attempt = config.current(),
            max = config.max(),
            "{}",
            message
        );
    }
}
