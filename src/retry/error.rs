//! Error types for retry operations.

use std::time::Duration;

/// Error produced when an attempt does not settle within the configured timeout.
///
/// The message is always `"<name> timed out"`, where `<name>` is the display
/// label of the retried operation.
///
/// # Examples
///
/// ```rust
/// use stillwater_retry::{retry, RetryError, RetryOptions, TimeoutError};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let result = retry(
///     |_| async {
///         tokio::time::sleep(Duration::from_secs(10)).await;
///         Ok::<_, String>(42)
///     },
///     RetryOptions::new()
///         .with_max(1)
///         .with_name("slow-query")
///         .with_timeout(Duration::from_millis(10)),
/// )
/// .await;
///
/// match result {
///     Err(RetryError::Timeout(err)) => {
///         assert_eq!(err.message(), "slow-query timed out");
///         assert_eq!(err.name(), TimeoutError::NAME);
///     }
///     _ => panic!("Expected timeout"),
/// }
/// # });
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutError {
    operation: String,
    limit: Duration,
}

impl TimeoutError {
    /// The error name reported by [`TimeoutError::name`].
    pub const NAME: &'static str = "TimeoutError";

    /// Create a timeout error for the named operation.
    pub fn new(operation: impl Into<String>, limit: Duration) -> Self {
        Self {
            operation: operation.into(),
            limit,
        }
    }

    /// Always `"TimeoutError"`, so callers can tell timeouts apart by name.
    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    /// Human-readable message, `"<name> timed out"`.
    pub fn message(&self) -> String {
        format!("{} timed out", self.operation)
    }

    /// Display label of the operation that timed out.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// The per-attempt limit that was exceeded.
    pub fn limit(&self) -> Duration {
        self.limit
    }
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} timed out", self.operation)
    }
}

impl std::error::Error for TimeoutError {}

/// Rejected retry options.
///
/// Returned synchronously by [`Retry::new`](crate::Retry::new) before any
/// attempt is made.
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidArgument {
    /// No attempt limit was supplied.
    MissingMax,
    /// The attempt limit was zero or negative.
    NonPositiveMax(i64),
    /// The attempt limit does not fit in a `u32`.
    MaxOutOfRange(i64),
    /// A backoff parameter was negative or not finite.
    InvalidBackoff {
        /// Which parameter was rejected.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
}

impl std::fmt::Display for InvalidArgument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingMax => write!(
                f,
                "retry must be passed a callback and an options set or a number"
            ),
            Self::NonPositiveMax(max) => write!(f, "max attempts must be at least 1 (got {})", max),
            Self::MaxOutOfRange(max) => {
                write!(f, "max attempts must be at most {} (got {})", u32::MAX, max)
            }
            Self::InvalidBackoff { field, value } => {
                write!(f, "{} must be a finite, non-negative number (got {})", field, value)
            }
        }
    }
}

impl std::error::Error for InvalidArgument {}

/// The single rejection a retry sequence can produce.
///
/// # Examples
///
/// ```rust
/// use stillwater_retry::{retry, RetryError, RetryOptions};
///
/// # tokio_test::block_on(async {
/// let result = retry(
///     |_| async { Err::<(), _>("boom") },
///     RetryOptions::new().with_max(3).with_backoff_base(0.0),
/// )
/// .await;
///
/// match result {
///     Err(RetryError::Operation(err)) => assert_eq!(err, "boom"),
///     _ => panic!("Expected the operation error"),
/// }
/// # });
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RetryError<E> {
    /// The options could not be normalized.
    InvalidArgument(InvalidArgument),
    /// The error produced by the final attempt, verbatim.
    Operation(E),
    /// The final attempt exceeded its timeout.
    Timeout(TimeoutError),
}

impl<E> RetryError<E> {
    /// Returns true if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Returns true if this is an error produced by the operation.
    pub fn is_operation(&self) -> bool {
        matches!(self, Self::Operation(_))
    }

    /// Returns true if the options were rejected.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Get a reference to the operation error, if present.
    pub fn operation(&self) -> Option<&E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Get the timeout error, if present.
    pub fn timeout(&self) -> Option<&TimeoutError> {
        match self {
            Self::Timeout(t) => Some(t),
            _ => None,
        }
    }

    /// Extract the operation error, discarding the other variants.
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Map the operation error, leaving timeouts and argument errors intact.
    pub fn map_operation<F, E2>(self, f: F) -> RetryError<E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            Self::InvalidArgument(a) => RetryError::InvalidArgument(a),
            Self::Operation(e) => RetryError::Operation(f(e)),
            Self::Timeout(t) => RetryError::Timeout(t),
        }
    }
}

impl<E: std::fmt::Display> RetryError<E> {
    /// The failure's message text.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl<E: std::fmt::Debug> RetryError<E> {
    /// The failure's full representation.
    ///
    /// Operation errors render through `Debug`; timeouts render as
    /// `"TimeoutError: <message>"`.
    pub fn describe(&self) -> String {
        match self {
            Self::InvalidArgument(a) => format!("InvalidArgument: {}", a),
            Self::Operation(e) => format!("{:?}", e),
            Self::Timeout(t) => format!("{}: {}", t.name(), t.message()),
        }
    }
}

impl<E> From<TimeoutError> for RetryError<E> {
    fn from(err: TimeoutError) -> Self {
        Self::Timeout(err)
    }
}

impl<E> From<InvalidArgument> for RetryError<E> {
    fn from(err: InvalidArgument) -> Self {
        Self::InvalidArgument(err)
    }
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(a) => write!(f, "invalid argument: {}", a),
            Self::Operation(e) => write!(f, "{}", e),
            Self::Timeout(t) => write!(f, "{}", t),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidArgument(a) => Some(a),
            Self::Operation(e) => Some(e),
            Self::Timeout(t) => Some(t),
        }
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn test_timeout_error_message() {
        let err = TimeoutError::new("fetch_user", Duration::from_millis(500));
        assert_eq!(err.message(), "fetch_user timed out");
        assert_eq!(err.to_string(), "fetch_user timed out");
        assert_eq!(err.name(), "TimeoutError");
        assert_eq!(err.limit(), Duration::from_millis(500));
    }

    #[test]
    fn test_retry_error_predicates() {
        let err: RetryError<String> = TimeoutError::new("op", Duration::from_secs(1)).into();
        assert!(err.is_timeout());
        assert!(!err.is_operation());
        assert!(err.into_operation().is_none());

        let err = RetryError::Operation("boom".to_string());
        assert!(err.is_operation());
        assert_eq!(err.operation(), Some(&"boom".to_string()));
        assert_eq!(err.into_operation(), Some("boom".to_string()));
    }

    #[test]
    fn test_retry_error_display() {
        let op: RetryError<String> = RetryError::Operation("connection refused".into());
        assert_eq!(op.to_string(), "connection refused");

        let timeout: RetryError<String> = TimeoutError::new("db", Duration::from_secs(1)).into();
        assert_eq!(timeout.to_string(), "db timed out");

        let invalid: RetryError<String> = InvalidArgument::NonPositiveMax(0).into();
        assert!(invalid.to_string().contains("at least 1"));

        let invalid: RetryError<String> = InvalidArgument::MaxOutOfRange(5_000_000_000).into();
        assert!(invalid.to_string().contains("at most 4294967295"));
    }

    #[test]
    fn test_describe_differs_from_message() {
        let op: RetryError<&str> = RetryError::Operation("boom");
        assert_eq!(op.message(), "boom");
        assert_eq!(op.describe(), "\"boom\"");

        let timeout: RetryError<&str> = TimeoutError::new("db", Duration::from_secs(1)).into();
        assert_eq!(timeout.describe(), "TimeoutError: db timed out");
    }

    #[test]
    fn test_map_operation_keeps_timeout() {
        let timeout: RetryError<i32> = TimeoutError::new("db", Duration::from_secs(1)).into();
        let mapped = timeout.map_operation(|n| n.to_string());
        assert!(mapped.is_timeout());

        let op: RetryError<i32> = RetryError::Operation(7);
        assert_eq!(op.map_operation(|n| n * 2), RetryError::Operation(14));
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error;

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        let err = RetryError::Operation(io);
        assert_eq!(err.source().map(|s| s.to_string()), Some("disk".to_string()));
    }
}
