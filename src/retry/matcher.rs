//! Error-match rules deciding which failures are worth retrying.

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::retry::error::RetryError;

type Predicate<E> = Arc<dyn Fn(&RetryError<E>) -> bool + Send + Sync>;

/// A single rule that a failure must satisfy to be retried.
///
/// When a retry sequence has any rules configured, a failure is retried only
/// if at least one rule matches it. With no rules every failure is retried.
///
/// # Examples
///
/// ```rust
/// use stillwater_retry::{MatchRule, RetryError};
/// use regex::Regex;
///
/// let exact: MatchRule<String> = "connection reset".into();
/// let pattern: MatchRule<String> = Regex::new("^5\\d\\d").unwrap().into();
/// let custom = MatchRule::operation(|e: &String| e.starts_with("busy"));
///
/// let err = RetryError::Operation("503 service unavailable".to_string());
/// assert!(!exact.matches(&err));
/// assert!(pattern.matches(&err));
/// assert!(!custom.matches(&err));
/// ```
pub enum MatchRule<E> {
    /// Equal to the failure's message or its full representation.
    Exact(String),
    /// Satisfied when the predicate returns true.
    Predicate(Predicate<E>),
    /// Satisfied when the failure is an instance of the tagged type.
    Kind(TypeTag),
    /// Satisfied when the expression matches the message or the full representation.
    Pattern(Regex),
}

impl<E> MatchRule<E> {
    /// Match failures equal to `text`.
    pub fn exact(text: impl Into<String>) -> Self {
        Self::Exact(text.into())
    }

    /// Match failures for which `f` returns true. Sees timeouts as well as
    /// operation errors.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&RetryError<E>) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    /// Match operation errors for which `f` returns true. Timeouts never match.
    pub fn operation<F>(f: F) -> Self
    where
        E: 'static,
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self::predicate(move |err: &RetryError<E>| err.operation().is_some_and(&f))
    }

    /// Match failures whose value is a `T`.
    pub fn of_type<T: Any>() -> Self {
        Self::Kind(TypeTag::of::<T>())
    }

    /// Match failures that are, or box, an error of type `T`.
    pub fn of_error<T: StdError + 'static>() -> Self {
        Self::Kind(TypeTag::error::<T>())
    }

    /// Match failures whose message or representation matches `regex`.
    pub fn pattern(regex: Regex) -> Self {
        Self::Pattern(regex)
    }
}

impl<E> MatchRule<E>
where
    E: fmt::Display + fmt::Debug + 'static,
{
    /// Evaluate this rule against a failure.
    pub fn matches(&self, err: &RetryError<E>) -> bool {
        match self {
            Self::Exact(text) => *text == err.describe() || *text == err.message(),
            Self::Predicate(f) => f(err),
            Self::Kind(tag) => tag.is_instance(failure_value(err)),
            Self::Pattern(regex) => {
                regex.is_match(&err.message()) || regex.is_match(&err.describe())
            }
        }
    }
}

/// Returns true if any rule matches the failure.
///
/// Every rule is a candidate; evaluation stops at the first match. An empty
/// rule set matches nothing, the "retry everything" reading of an empty set
/// belongs to the caller.
pub fn matches<E>(rules: &[MatchRule<E>], err: &RetryError<E>) -> bool
where
    E: fmt::Display + fmt::Debug + 'static,
{
    rules.iter().any(|rule| rule.matches(err))
}

fn failure_value<E: 'static>(err: &RetryError<E>) -> &dyn Any {
    match err {
        RetryError::InvalidArgument(a) => a,
        RetryError::Operation(e) => e,
        RetryError::Timeout(t) => t,
    }
}

/// A runtime type tag used by [`MatchRule::Kind`].
#[derive(Clone, Copy)]
pub struct TypeTag {
    name: &'static str,
    check: fn(&dyn Any) -> bool,
}

impl TypeTag {
    /// Tag for values of exactly type `T`.
    pub fn of<T: Any>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            check: is_exactly::<T>,
        }
    }

    /// Tag for errors of type `T`, also seen through `Box<dyn Error>`.
    pub fn error<T: StdError + 'static>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            check: is_error::<T>,
        }
    }

    /// The tagged type's name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns true if `value` is an instance of the tagged type.
    pub fn is_instance(&self, value: &dyn Any) -> bool {
        (self.check)(value)
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeTag").field(&self.name).finish()
    }
}

fn is_exactly<T: Any>(value: &dyn Any) -> bool {
    value.is::<T>()
}

fn is_error<T: StdError + 'static>(value: &dyn Any) -> bool {
    if value.is::<T>() {
        return true;
    }
    if let Some(boxed) = value.downcast_ref::<Box<dyn StdError + Send + Sync>>() {
        return (**boxed).is::<T>();
    }
    if let Some(boxed) = value.downcast_ref::<Box<dyn StdError>>() {
        return (**boxed).is::<T>();
    }
    false
}

impl<E> Clone for MatchRule<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Exact(text) => Self::Exact(text.clone()),
            Self::Predicate(f) => Self::Predicate(Arc::clone(f)),
            Self::Kind(tag) => Self::Kind(*tag),
            Self::Pattern(regex) => Self::Pattern(regex.clone()),
        }
    }
}

impl<E> fmt::Debug for MatchRule<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(text) => f.debug_tuple("Exact").field(text).finish(),
            Self::Predicate(_) => f.write_str("Predicate(<fn>)"),
            Self::Kind(tag) => f.debug_tuple("Kind").field(tag).finish(),
            Self::Pattern(regex) => f.debug_tuple("Pattern").field(&regex.as_str()).finish(),
        }
    }
}

impl<E> From<&str> for MatchRule<E> {
    fn from(text: &str) -> Self {
        Self::exact(text)
    }
}

impl<E> From<String> for MatchRule<E> {
    fn from(text: String) -> Self {
        Self::Exact(text)
    }
}

impl<E> From<Regex> for MatchRule<E> {
    fn from(regex: Regex) -> Self {
        Self::Pattern(regex)
    }
}

impl<E> From<TypeTag> for MatchRule<E> {
    fn from(tag: TypeTag) -> Self {
        Self::Kind(tag)
    }
}

#[cfg(test)]
mod matcher_tests {
    use super::*;
    use crate::retry::error::TimeoutError;
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    struct Busy;

    impl fmt::Display for Busy {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "resource busy")
        }
    }

    impl StdError for Busy {}

    fn timeout<E>() -> RetryError<E> {
        TimeoutError::new("sync", Duration::from_millis(5)).into()
    }

    #[test]
    fn test_exact_matches_message() {
        let rule: MatchRule<String> = "boom".into();
        assert!(rule.matches(&RetryError::Operation("boom".to_string())));
        assert!(!rule.matches(&RetryError::Operation("boom!".to_string())));
    }

    #[test]
    fn test_exact_matches_representation() {
        let rule: MatchRule<Busy> = "Busy".into();
        assert!(rule.matches(&RetryError::Operation(Busy)));

        let rule: MatchRule<Busy> = "TimeoutError: sync timed out".into();
        assert!(rule.matches(&timeout()));
    }

    #[test]
    fn test_predicate_sees_timeouts() {
        let rule = MatchRule::<String>::predicate(|e| e.is_timeout());
        assert!(rule.matches(&timeout()));
        assert!(!rule.matches(&RetryError::Operation("x".into())));
    }

    #[test]
    fn test_operation_predicate_skips_timeouts() {
        let rule = MatchRule::operation(|e: &String| e.contains("busy"));
        assert!(rule.matches(&RetryError::Operation("db busy".into())));
        assert!(!rule.matches(&timeout()));
    }

    #[test]
    fn test_kind_matches_concrete_type() {
        let rule = MatchRule::<Busy>::of_type::<Busy>();
        assert!(rule.matches(&RetryError::Operation(Busy)));
        assert!(!rule.matches(&timeout()));

        let rule = MatchRule::<Busy>::of_type::<TimeoutError>();
        assert!(rule.matches(&timeout()));
    }

    #[test]
    fn test_kind_sees_through_boxed_errors() {
        type Boxed = Box<dyn StdError + Send + Sync>;

        let err: RetryError<Boxed> = RetryError::Operation(Box::new(Busy));
        assert!(MatchRule::<Boxed>::of_error::<Busy>().matches(&err));
        assert!(!MatchRule::<Boxed>::of_error::<std::io::Error>().matches(&err));
        assert!(!MatchRule::<Boxed>::of_type::<Busy>().matches(&err));
    }

    #[test]
    fn test_pattern_matches_message_or_representation() {
        let rule: MatchRule<Busy> = Regex::new("busy$").unwrap().into();
        assert!(rule.matches(&RetryError::Operation(Busy)));

        let rule: MatchRule<Busy> = Regex::new("^Bu").unwrap().into();
        assert!(rule.matches(&RetryError::Operation(Busy)));

        let rule: MatchRule<Busy> = Regex::new("^TimeoutError").unwrap().into();
        assert!(rule.matches(&timeout()));
    }

    #[test]
    fn test_any_rule_suffices() {
        let rules: Vec<MatchRule<String>> = vec![
            "first".into(),
            MatchRule::operation(|e: &String| e.len() == 6),
        ];

        assert!(matches(&rules, &RetryError::Operation("second".into())));
        assert!(matches(&rules, &RetryError::Operation("first".into())));
        assert!(!matches(&rules, &RetryError::Operation("third".into())));
    }

    #[test]
    fn test_empty_rules_match_nothing() {
        assert!(!matches::<String>(&[], &RetryError::Operation("x".into())));
    }

    #[test]
    fn test_debug_output() {
        let rule: MatchRule<String> = Regex::new("a+").unwrap().into();
        assert_eq!(format!("{:?}", rule), "Pattern(\"a+\")");

        let rule = MatchRule::<String>::predicate(|_| true);
        assert_eq!(format!("{:?}", rule), "Predicate(<fn>)");
    }
}
