//! # Stillwater Retry
//!
//! Declarative retry for async operations.
//!
//! Wrap a flaky operation (a network call, a database query, file I/O) once,
//! and describe how it should be retried instead of hand-rolling a loop:
//!
//! - how many attempts it gets,
//! - how long each attempt may take,
//! - which failures are worth another attempt,
//! - how long to wait in between.
//!
//! ## Quick Example
//!
//! ```rust
//! use stillwater_retry::{retry, RetryError, RetryOptions};
//!
//! # tokio_test::block_on(async {
//! // Fails every time: three attempts, then the last error surfaces.
//! let result = retry(
//!     |_| async { Err::<(), _>("boom") },
//!     RetryOptions::new().with_max(3).with_backoff_base(0.0),
//! )
//! .await;
//!
//! assert_eq!(result, Err(RetryError::Operation("boom")));
//! # });
//! ```
//!
//! A bare number is shorthand for the attempt limit:
//!
//! ```rust
//! use stillwater_retry::retry;
//!
//! # tokio_test::block_on(async {
//! let result = retry(|_| async { Ok::<_, String>(42) }, 1).await;
//! assert_eq!(result, Ok(42));
//! # });
//! ```
//!
//! See [`retry`](crate::retry::retry) for the full set of options.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod retry;
pub mod testing;

// Re-exports
pub use retry::{
    matches, retry, Attempt, AttemptOutcome, Backoff, InvalidArgument, MatchRule, Reporter,
    Retry, RetryConfig, RetryError, RetryOptions, TimeoutError, TracingReporter, TypeTag,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::retry::{
        retry, Attempt, Backoff, MatchRule, Retry, RetryConfig, RetryError, RetryOptions,
        TimeoutError,
    };
}
