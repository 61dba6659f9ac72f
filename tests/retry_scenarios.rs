//! End-to-end retry scenarios through the public API.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use stillwater_retry::prelude::*;
use stillwater_retry::testing::{Script, Step};
use stillwater_retry::{assert_operation_error, assert_timed_out, InvalidArgument};

#[tokio::test]
async fn always_failing_operation_is_called_max_times() {
    let calls = Arc::new(AtomicU32::new(0));

    let result = retry(
        {
            let calls = calls.clone();
            move |_| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>("boom")
                }
            }
        },
        RetryOptions::new().with_max(3).with_backoff_base(0.0),
    )
    .await;

    assert_operation_error!(result, "boom");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn resolves_on_fourth_call() {
    let calls = Arc::new(AtomicU32::new(0));

    let result = retry(
        {
            let calls = calls.clone();
            move |_| {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 3 {
                        Err("transient failure")
                    } else {
                        Ok("ok")
                    }
                }
            }
        },
        RetryOptions::new().with_max(10).with_backoff_base(0.0),
    )
    .await;

    assert_eq!(result, Ok("ok"));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn unmatched_error_is_not_retried() {
    let script = Script::<(), _>::new().always(Step::err("something else"));

    let result = retry(
        |attempt| script.call(attempt),
        RetryOptions::new()
            .with_max(15)
            .with_backoff_base(0.0)
            .with_match("specific-error"),
    )
    .await;

    assert_operation_error!(result, "something else");
    assert_eq!(script.call_count(), 1);
}

#[tokio::test]
async fn integer_shorthand_behaves_like_options() {
    let shorthand = Script::<(), _>::new().always(Step::err("nope"));
    let explicit = Script::<(), _>::new().always(Step::err("nope"));

    let a = retry(|attempt| shorthand.call(attempt), 1).await;
    let b = retry(|attempt| explicit.call(attempt), RetryOptions::new().with_max(1)).await;

    assert_eq!(a, b);
    assert_eq!(shorthand.call_count(), explicit.call_count());
}

#[tokio::test]
async fn validation_happens_before_any_attempt() {
    let script = Script::<(), &str>::new().always(Step::ok(()));

    let err = Retry::new(
        |attempt: Attempt| script.call(attempt),
        RetryOptions::<&str>::new(),
    )
    .unwrap_err();

    assert_eq!(err, InvalidArgument::MissingMax);
    assert_eq!(script.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn timeout_surfaces_timeout_error_not_operation_error() {
    let script = Script::<(), _>::new()
        .then(Step::err("refused"))
        .always(Step::err("refused").after(Duration::from_secs(10)));

    let result = retry(
        |attempt| script.call(attempt),
        RetryOptions::new()
            .with_max(2)
            .with_backoff_base(0.0)
            .with_name("fetch_profile")
            .with_timeout(Duration::from_secs(1)),
    )
    .await;

    let err = result.as_ref().unwrap_err().timeout().cloned();
    assert_timed_out!(result);
    assert_eq!(err.map(|e| e.message()), Some("fetch_profile timed out".to_string()));
}

#[tokio::test(start_paused = true)]
async fn slow_operation_times_out_without_further_attempts() {
    let calls = Arc::new(AtomicU32::new(0));
    let start = tokio::time::Instant::now();

    let result = retry(
        {
            let calls = calls.clone();
            move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    Ok::<_, String>(())
                }
            }
        },
        RetryOptions::new()
            .with_max(15)
            .with_timeout(Duration::from_secs(1)),
    )
    .await;

    assert_timed_out!(result);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(start.elapsed(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn backoff_delays_grow_between_attempts() {
    let stamps = Arc::new(std::sync::Mutex::new(Vec::new()));
    let start = tokio::time::Instant::now();

    let _ = retry(
        {
            let stamps = stamps.clone();
            move |_| {
                stamps.lock().unwrap().push(start.elapsed());
                async { Err::<(), _>("busy") }
            }
        },
        RetryOptions::new().with_max(5).with_backoff_base(10.0).with_backoff_exponent(1.5),
    )
    .await;

    let stamps = stamps.lock().unwrap();
    let gaps: Vec<Duration> = stamps.windows(2).map(|w| w[1] - w[0]).collect();

    assert_eq!(gaps.len(), 4);
    for pair in gaps.windows(2) {
        assert!(pair[1] > pair[0], "gaps should grow: {:?}", gaps);
    }
}

#[tokio::test]
async fn boxed_errors_can_be_matched_by_type() {
    #[derive(Debug)]
    struct Throttled;

    impl std::fmt::Display for Throttled {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "throttled")
        }
    }

    impl std::error::Error for Throttled {}

    type BoxError = Box<dyn std::error::Error + Send + Sync>;

    let calls = Arc::new(AtomicU32::new(0));

    let result: Result<u32, RetryError<BoxError>> = retry(
        {
            let calls = calls.clone();
            move |attempt: Attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt.current() < 3 {
                        Err(Box::new(Throttled) as BoxError)
                    } else {
                        Ok(attempt.current())
                    }
                }
            }
        },
        RetryOptions::new()
            .with_max(5)
            .with_backoff_base(0.0)
            .with_match(MatchRule::of_error::<Throttled>()),
    )
    .await;

    assert_eq!(result.ok(), Some(3));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}
