//! Testing utilities for code that retries
//!
//! This module provides a scripted operation for driving the retry engine
//! through a known sequence of outcomes, plus assertion macros for the
//! outcome of a retry sequence.
//!
//! # Examples
//!
//! ## Scripted operation
//!
//! ```rust
//! use stillwater_retry::testing::{Script, Step};
//! use stillwater_retry::{retry, RetryOptions};
//!
//! # tokio_test::block_on(async {
//! let script = Script::new()
//!     .then(Step::err("busy"))
//!     .then(Step::err("busy"))
//!     .then(Step::ok(7));
//!
//! let result = retry(
//!     |attempt| script.call(attempt),
//!     RetryOptions::new().with_max(5).with_backoff_base(0.0),
//! )
//! .await;
//!
//! assert_eq!(result, Ok(7));
//! assert_eq!(script.calls(), vec![1, 2, 3]);
//! # });
//! ```
//!
//! ## Assertion macros
//!
//! ```rust
//! use stillwater_retry::{assert_operation_error, assert_timed_out, RetryError, TimeoutError};
//! use std::time::Duration;
//!
//! let failed: Result<(), RetryError<&str>> = Err(RetryError::Operation("boom"));
//! assert_operation_error!(failed, "boom");
//!
//! let timed_out: Result<(), RetryError<&str>> =
//!     Err(TimeoutError::new("db", Duration::from_secs(1)).into());
//! assert_timed_out!(timed_out);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};

use crate::retry::Attempt;

/// One scripted outcome, optionally settling after a delay.
#[derive(Debug, Clone)]
pub struct Step<T, E> {
    outcome: Result<T, E>,
    delay: Duration,
}

impl<T, E> Step<T, E> {
    /// Resolve with `value`.
    pub fn ok(value: T) -> Self {
        Self {
            outcome: Ok(value),
            delay: Duration::ZERO,
        }
    }

    /// Fail with `error`.
    pub fn err(error: E) -> Self {
        Self {
            outcome: Err(error),
            delay: Duration::ZERO,
        }
    }

    /// Settle only after `delay` has passed.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug)]
struct ScriptState<T, E> {
    steps: VecDeque<Step<T, E>>,
    fallback: Option<Step<T, E>>,
    calls: Vec<Attempt>,
}

/// An operation that replays scripted outcomes and records every call.
///
/// Steps added with [`Script::then`] are consumed in order; once they run
/// out, the step given to [`Script::always`] repeats. Calling past the end of
/// a script without a fallback panics.
///
/// Clones share the same script and call log.
#[derive(Debug)]
pub struct Script<T, E> {
    state: Arc<Mutex<ScriptState<T, E>>>,
}

impl<T, E> Script<T, E> {
    /// Create an empty script.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                steps: VecDeque::new(),
                fallback: None,
                calls: Vec::new(),
            })),
        }
    }

    /// Append a step.
    pub fn then(self, step: Step<T, E>) -> Self {
        self.lock().steps.push_back(step);
        self
    }

    /// Repeat `step` once the scripted steps are used up.
    pub fn always(self, step: Step<T, E>) -> Self {
        self.lock().fallback = Some(step);
        self
    }

    /// Attempt numbers seen so far, in call order.
    pub fn calls(&self) -> Vec<u32> {
        self.lock().calls.iter().map(Attempt::current).collect()
    }

    /// Number of calls so far.
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState<T, E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T, E> Script<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Run the next step for `attempt`.
    ///
    /// # Panics
    ///
    /// Panics when the script is exhausted and no fallback is set.
    pub fn call(&self, attempt: Attempt) -> BoxFuture<'static, Result<T, E>> {
        let step = {
            let mut state = self.lock();
            state.calls.push(attempt);
            match state.steps.pop_front() {
                Some(step) => step,
                None => match &state.fallback {
                    Some(step) => step.clone(),
                    None => panic!("script exhausted at attempt {}", attempt.current()),
                },
            }
        };

        async move {
            if !step.delay.is_zero() {
                tokio::time::sleep(step.delay).await;
            }
            step.outcome
        }
        .boxed()
    }
}

impl<T, E> Clone for Script<T, E> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T, E> Default for Script<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Assert that a retry sequence failed with a specific operation error.
///
/// # Example
///
/// ```rust
/// use stillwater_retry::{assert_operation_error, RetryError};
///
/// let result: Result<i32, RetryError<String>> = Err(RetryError::Operation("boom".into()));
/// assert_operation_error!(result, "boom".to_string());
/// ```
#[macro_export]
macro_rules! assert_operation_error {
    ($result:expr, $expected:expr) => {
        match $result {
            Err($crate::RetryError::Operation(e)) => {
                assert_eq!(e, $expected);
            }
            other => {
                panic!(
                    "Expected operation error {:?}, got {:?}",
                    $expected, other
                );
            }
        }
    };
}

/// Assert that a retry sequence ended in a timeout.
///
/// # Example
///
/// ```rust
/// use stillwater_retry::{assert_timed_out, RetryError, TimeoutError};
/// use std::time::Duration;
///
/// let result: Result<i32, RetryError<String>> =
///     Err(TimeoutError::new("fetch", Duration::from_millis(5)).into());
/// assert_timed_out!(result);
/// ```
#[macro_export]
macro_rules! assert_timed_out {
    ($result:expr) => {
        match $result {
            Err($crate::RetryError::Timeout(_)) => {}
            other => {
                panic!("Expected TimeoutError, got {:?}", other);
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RetryError;

    #[tokio::test]
    async fn script_replays_steps_in_order() {
        let script = Script::new().then(Step::err("a")).then(Step::ok(1));

        assert_eq!(script.call(Attempt::new(1, 2)).await, Err("a"));
        assert_eq!(script.call(Attempt::new(2, 2)).await, Ok(1));
        assert_eq!(script.calls(), vec![1, 2]);
    }

    #[tokio::test]
    async fn script_repeats_fallback() {
        let script = Script::<i32, _>::new().always(Step::err("down"));

        for n in 1..=3 {
            assert_eq!(script.call(Attempt::new(n, 3)).await, Err("down"));
        }
        assert_eq!(script.call_count(), 3);
    }

    #[tokio::test]
    #[should_panic(expected = "script exhausted")]
    async fn script_panics_when_exhausted() {
        let script = Script::<i32, &str>::new();
        let _ = script.call(Attempt::new(1, 1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_step_waits() {
        let script = Script::<_, &str>::new().then(Step::ok(5).after(Duration::from_secs(3)));

        let start = tokio::time::Instant::now();
        assert_eq!(script.call(Attempt::new(1, 1)).await, Ok(5));
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[test]
    fn clones_share_call_log() {
        let script = Script::<i32, &str>::new().always(Step::ok(1));
        let other = script.clone();

        let _ = other.call(Attempt::new(1, 1));
        assert_eq!(script.call_count(), 1);
    }

    #[test]
    fn assert_operation_error_macro() {
        let result: Result<(), RetryError<&str>> = Err(RetryError::Operation("boom"));
        assert_operation_error!(result, "boom");
    }

    #[test]
    #[should_panic(expected = "Expected TimeoutError")]
    fn assert_timed_out_panics_on_operation_error() {
        let result: Result<(), RetryError<&str>> = Err(RetryError::Operation("boom"));
        assert_timed_out!(result);
    }
}
