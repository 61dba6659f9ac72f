//! Retry orchestration for async operations.
//!
//! This module wraps a possibly-failing async operation with declarative
//! retry rules:
//!
//! - **Attempt limit**: `max` attempts in total, counted from 1
//! - **Timeout**: an optional limit on each attempt; exceeding it ends the sequence
//! - **Match rules**: only failures matching a rule are retried
//! - **Backoff**: a double-exponential delay between attempts
//!
//! # Quick Start
//!
//! ```rust
//! use stillwater_retry::{retry, RetryOptions};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let result = retry(
//!     |attempt| async move {
//!         if attempt.current() < 2 {
//!             Err("connection reset")
//!         } else {
//!             Ok("payload")
//!         }
//!     },
//!     RetryOptions::new()
//!         .with_max(4)
//!         .with_timeout(Duration::from_secs(1))
//!         .with_match("connection reset")
//!         .with_backoff_base(1.0),
//! )
//! .await;
//!
//! assert_eq!(result, Ok("payload"));
//! # });
//! ```
//!
//! # Match Rules
//!
//! - **Exact**: the failure's message or full representation equals a string
//! - **Predicate**: a closure returns true
//! - **Kind**: the failure is an instance of a type
//! - **Pattern**: a regular expression matches the message or representation
//!
//! # Error Types
//!
//! - [`RetryError`]: the single rejection of a retry sequence
//! - [`TimeoutError`]: produced when an attempt exceeds its timeout
//! - [`InvalidArgument`]: produced when options cannot be normalized

mod backoff;
mod engine;
mod error;
mod matcher;
mod options;
mod report;

pub use backoff::Backoff;
pub use engine::{retry, Attempt, AttemptOutcome, Retry};
pub use error::{InvalidArgument, RetryError, TimeoutError};
pub use matcher::{matches, MatchRule, TypeTag};
pub use options::{RetryConfig, RetryOptions, UNKNOWN_NAME};
pub use report::{Reporter, TracingReporter};
