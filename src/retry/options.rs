//! Retry options and their normalized configuration.
//!
//! [`RetryOptions`] is the partial, caller-facing description of a retry
//! sequence. [`RetryConfig`] is the canonical, fully-populated form the engine
//! runs with. Normalization is cheap and idempotent, so the engine performs it
//! again for every attempt.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::retry::backoff::Backoff;
use crate::retry::error::{InvalidArgument, RetryError};
use crate::retry::matcher::{self, MatchRule};
use crate::retry::report::Reporter;

/// Display label used when neither the options nor the callback provide one.
pub const UNKNOWN_NAME: &str = "unknown";

/// Caller-supplied retry options. Every field is optional except `max`.
///
/// A bare attempt count converts directly:
///
/// ```rust
/// use stillwater_retry::{RetryConfig, RetryOptions};
///
/// let config = RetryConfig::<String>::normalize(3, None).unwrap();
/// assert_eq!(config.max(), 3);
/// assert_eq!(config.current(), 1);
/// assert_eq!(config.name(), "unknown");
/// ```
///
/// Builder methods cover the rest:
///
/// ```rust
/// use stillwater_retry::{MatchRule, RetryOptions};
/// use std::time::Duration;
///
/// let options = RetryOptions::<std::io::Error>::new()
///     .with_max(5)
///     .with_timeout(Duration::from_secs(2))
///     .with_match(MatchRule::operation(|e: &std::io::Error| {
///         e.kind() == std::io::ErrorKind::TimedOut
///     }))
///     .with_backoff_base(50.0)
///     .with_name("read_manifest");
/// ```
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, bound = ""))]
pub struct RetryOptions<E> {
    #[cfg_attr(feature = "serde", serde(skip))]
    current: Option<u32>,
    max: Option<i64>,
    #[cfg_attr(
        feature = "serde",
        serde(rename = "timeout_ms", deserialize_with = "millis::deserialize")
    )]
    timeout: Option<Duration>,
    #[cfg_attr(feature = "serde", serde(skip))]
    match_rules: Vec<MatchRule<E>>,
    backoff_base: Option<f64>,
    backoff_exponent: Option<f64>,
    #[cfg_attr(
        feature = "serde",
        serde(rename = "max_delay_ms", deserialize_with = "millis::deserialize")
    )]
    max_delay: Option<Duration>,
    name: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip))]
    reporter: Option<Arc<dyn Reporter<E>>>,
}

impl<E> RetryOptions<E> {
    /// Create empty options. `max` must be set before normalizing.
    pub fn new() -> Self {
        Self {
            current: None,
            max: None,
            timeout: None,
            match_rules: Vec::new(),
            backoff_base: None,
            backoff_exponent: None,
            max_delay: None,
            name: None,
            reporter: None,
        }
    }

    /// Set the inclusive attempt limit.
    pub fn with_max(mut self, max: u32) -> Self {
        self.max = Some(i64::from(max));
        self
    }

    /// Fail any single attempt that runs longer than `timeout`.
    ///
    /// A zero duration disables the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add one match rule. Failures are retried only if some rule matches.
    pub fn with_match(mut self, rule: impl Into<MatchRule<E>>) -> Self {
        self.match_rules.push(rule.into());
        self
    }

    /// Add several match rules, in order.
    pub fn with_matches<I, R>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<MatchRule<E>>,
    {
        self.match_rules.extend(rules.into_iter().map(Into::into));
        self
    }

    /// Set the backoff base in milliseconds. Zero disables delays.
    pub fn with_backoff_base(mut self, base: f64) -> Self {
        self.backoff_base = Some(base);
        self
    }

    /// Set the backoff exponent. Zero falls back to the default.
    pub fn with_backoff_exponent(mut self, exponent: f64) -> Self {
        self.backoff_exponent = Some(exponent);
        self
    }

    /// Cap the delay between attempts.
    pub fn with_max_delay(mut self, max: Duration) -> Self {
        self.max_delay = Some(max);
        self
    }

    /// Set the display label used in reports and timeout messages.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Install a reporter.
    pub fn with_reporter<R>(mut self, reporter: R) -> Self
    where
        R: Reporter<E> + 'static,
    {
        self.reporter = Some(Arc::new(reporter));
        self
    }

    pub(crate) fn starting_at(mut self, current: u32) -> Self {
        self.current = Some(current);
        self
    }
}

impl<E> Default for RetryOptions<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> From<u32> for RetryOptions<E> {
    fn from(max: u32) -> Self {
        Self::new().with_max(max)
    }
}

// Unsuffixed integer literals default to i32, so `retry(op, 3)` lands here.
impl<E> From<i32> for RetryOptions<E> {
    fn from(max: i32) -> Self {
        Self {
            max: Some(i64::from(max)),
            ..Self::new()
        }
    }
}

impl<E> From<RetryConfig<E>> for RetryOptions<E> {
    fn from(config: RetryConfig<E>) -> Self {
        Self {
            current: Some(config.current),
            max: Some(i64::from(config.max)),
            timeout: config.timeout,
            match_rules: config.match_rules,
            backoff_base: Some(config.backoff.base()),
            backoff_exponent: Some(config.backoff.exponent()),
            max_delay: config.backoff.max_delay(),
            name: Some(config.name),
            reporter: config.reporter,
        }
    }
}

impl<E> Clone for RetryOptions<E> {
    fn clone(&self) -> Self {
        Self {
            current: self.current,
            max: self.max,
            timeout: self.timeout,
            match_rules: self.match_rules.clone(),
            backoff_base: self.backoff_base,
            backoff_exponent: self.backoff_exponent,
            max_delay: self.max_delay,
            name: self.name.clone(),
            reporter: self.reporter.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("current", &self.current)
            .field("max", &self.max)
            .field("timeout", &self.timeout)
            .field("match_rules", &self.match_rules)
            .field("backoff_base", &self.backoff_base)
            .field("backoff_exponent", &self.backoff_exponent)
            .field("max_delay", &self.max_delay)
            .field("name", &self.name)
            .field("reporter", &self.reporter.is_some())
            .finish()
    }
}

/// Normalized configuration for one retry sequence.
///
/// Produced by [`RetryConfig::normalize`]; every field is populated. The
/// engine never mutates a config, it normalizes a new one with `current`
/// advanced by one for each retry.
pub struct RetryConfig<E> {
    current: u32,
    max: u32,
    timeout: Option<Duration>,
    match_rules: Vec<MatchRule<E>>,
    backoff: Backoff,
    name: String,
    reporter: Option<Arc<dyn Reporter<E>>>,
}

impl<E> RetryConfig<E> {
    /// Validate `options` and fill in defaults.
    ///
    /// `callback_name` is the intrinsic name of the retried callback, used
    /// when the options carry no name.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stillwater_retry::{InvalidArgument, RetryConfig, RetryOptions};
    ///
    /// let err = RetryConfig::<String>::normalize(RetryOptions::new(), None).unwrap_err();
    /// assert_eq!(err, InvalidArgument::MissingMax);
    ///
    /// let config = RetryConfig::<String>::normalize(
    ///     RetryOptions::new().with_max(4).with_backoff_base(0.0),
    ///     Some("sync_orders"),
    /// )
    /// .unwrap();
    /// assert_eq!(config.name(), "sync_orders");
    /// assert_eq!(config.backoff().base(), 0.0);
    /// assert_eq!(config.backoff().exponent(), 1.1);
    /// ```
    pub fn normalize(
        options: impl Into<RetryOptions<E>>,
        callback_name: Option<&str>,
    ) -> Result<Self, InvalidArgument> {
        let options = options.into();

        let max = match options.max {
            None => return Err(InvalidArgument::MissingMax),
            Some(max) if max <= 0 => return Err(InvalidArgument::NonPositiveMax(max)),
            Some(max) => u32::try_from(max).map_err(|_| InvalidArgument::MaxOutOfRange(max))?,
        };

        let base = options.backoff_base.unwrap_or(Backoff::DEFAULT_BASE);
        check_backoff("backoff_base", base)?;

        let exponent = match options.backoff_exponent {
            None => Backoff::DEFAULT_EXPONENT,
            Some(e) if e == 0.0 => Backoff::DEFAULT_EXPONENT,
            Some(e) => e,
        };
        check_backoff("backoff_exponent", exponent)?;

        let mut backoff = Backoff::new(base, exponent);
        if let Some(cap) = options.max_delay {
            backoff = backoff.with_max_delay(cap);
        }

        let name = options
            .name
            .filter(|n| !n.is_empty())
            .or_else(|| callback_name.filter(|n| !n.is_empty()).map(str::to_owned))
            .unwrap_or_else(|| UNKNOWN_NAME.to_owned());

        Ok(Self {
            current: options.current.filter(|&c| c > 0).unwrap_or(1),
            max,
            timeout: options.timeout.filter(|t| !t.is_zero()),
            match_rules: options.match_rules,
            backoff,
            name,
            reporter: options.reporter,
        })
    }

    /// Attempt number about to run (or running), starting at 1.
    pub fn current(&self) -> u32 {
        self.current
    }

    /// Inclusive attempt limit.
    pub fn max(&self) -> u32 {
        self.max
    }

    /// Per-attempt timeout, if enabled.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Configured match rules. Empty means every failure is retryable.
    pub fn match_rules(&self) -> &[MatchRule<E>] {
        &self.match_rules
    }

    /// Backoff parameters.
    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Display label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if a reporter is installed.
    pub fn has_reporter(&self) -> bool {
        self.reporter.is_some()
    }

    /// Returns true if this is the final permitted attempt.
    pub fn is_last_attempt(&self) -> bool {
        self.current >= self.max
    }

    /// Delay to wait after the current attempt fails.
    pub fn retry_delay(&self) -> Duration {
        self.backoff.delay_for_attempt(self.current)
    }

    /// Send `message` to the reporter, if any.
    pub fn report(&self, message: &str) {
        if let Some(reporter) = &self.reporter {
            reporter.report(message, self);
        }
    }

    /// Configuration for the next attempt, re-normalized.
    pub fn advance(self) -> Result<Self, InvalidArgument> {
        let next = self.current.saturating_add(1);
        Self::normalize(RetryOptions::from(self).starting_at(next), None)
    }
}

impl<E> RetryConfig<E>
where
    E: fmt::Display + fmt::Debug + 'static,
{
    /// Decide whether `err`, produced by the current attempt, earns another attempt.
    ///
    /// Timeouts are final. Otherwise attempts remain while `current < max`,
    /// and when match rules are configured the failure must also match at
    /// least one of them.
    pub fn should_retry(&self, err: &RetryError<E>) -> bool {
        if err.is_timeout() || self.is_last_attempt() {
            return false;
        }
        self.match_rules.is_empty() || matcher::matches(&self.match_rules, err)
    }
}

impl<E> Clone for RetryConfig<E> {
    fn clone(&self) -> Self {
        Self {
            current: self.current,
            max: self.max,
            timeout: self.timeout,
            match_rules: self.match_rules.clone(),
            backoff: self.backoff,
            name: self.name.clone(),
            reporter: self.reporter.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryConfig<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("current", &self.current)
            .field("max", &self.max)
            .field("timeout", &self.timeout)
            .field("match_rules", &self.match_rules)
            .field("backoff", &self.backoff)
            .field("name", &self.name)
            .field("reporter", &self.reporter.is_some())
            .finish()
    }
}

fn check_backoff(field: &'static str, value: f64) -> Result<(), InvalidArgument> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(InvalidArgument::InvalidBackoff { field, value })
    }
}

/// Intrinsic name of a callback type.
///
/// Named `fn` items report their final path segment; closures have no
/// intrinsic name.
pub(crate) fn callback_name<F>() -> Option<&'static str> {
    let full = std::any::type_name::<F>();
    if full.contains("{{closure}}") || full.contains(['<', '&', '(']) {
        return None;
    }
    full.rsplit("::").next().filter(|segment| !segment.is_empty())
}

#[cfg(feature = "serde")]
mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
