//! Retry Patterns Example
//!
//! Demonstrates declarative retry for async operations:
//! - Basic retry with the default double-exponential backoff
//! - How the delay grows with different base/exponent pairs
//! - Retrying only matching failures
//! - Per-attempt timeouts, which end the sequence when exceeded
//! - Observing a sequence through `tracing`
//!
//! Run with: cargo run --example retry_patterns

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use stillwater_retry::prelude::*;
use stillwater_retry::TracingReporter;

// ==================== Basic Retry ====================

/// Example 1: an operation that fails twice before succeeding.
async fn example_basic_retry() {
    println!("\n=== Example 1: Basic Retry ===");

    let attempts = Arc::new(AtomicU32::new(0));

    let result = retry(
        {
            let attempts = attempts.clone();
            move |attempt: Attempt| {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    println!("  Attempt {} of {}", attempt.current(), attempt.max());
                    if attempt.current() < 3 {
                        Err("transient failure")
                    } else {
                        Ok("success!")
                    }
                }
            }
        },
        5,
    )
    .await;

    match result {
        Ok(value) => println!(
            "Success after {} attempts: {}",
            attempts.load(Ordering::SeqCst),
            value
        ),
        Err(e) => println!("Failed: {}", e),
    }
}

// ==================== Backoff Curves ====================

/// Example 2: delays produced by a few base/exponent pairs.
fn example_backoff_curves() {
    println!("\n=== Example 2: Backoff Curves ===");

    let curves = [
        ("default", Backoff::default()),
        ("gentle", Backoff::new(50.0, 1.05)),
        ("steep", Backoff::new(10.0, 2.0)),
        (
            "capped",
            Backoff::new(100.0, 1.5).with_max_delay(Duration::from_millis(500)),
        ),
    ];

    for (label, backoff) in curves {
        let delays: Vec<String> = (1..=5)
            .map(|n| format!("{:?}", backoff.delay_for_attempt(n)))
            .collect();
        println!("  {:<8} {}", label, delays.join(", "));
    }
}

// ==================== Match Rules ====================

/// Example 3: only connection errors are retried; a 404 is returned at once.
async fn example_match_rules() {
    println!("\n=== Example 3: Match Rules ===");

    let options = || {
        RetryOptions::new()
            .with_max(4)
            .with_backoff_base(20.0)
            .with_match("ECONNRESET")
            .with_match(Regex::new(r"^503 ").expect("valid regex"))
    };

    let flaky = retry(
        |attempt: Attempt| async move {
            match attempt.current() {
                1 => Err("ECONNRESET".to_string()),
                2 => Err("503 Service Unavailable".to_string()),
                _ => Ok(attempt.current()),
            }
        },
        options(),
    )
    .await;
    println!("  Transient failures: {:?}", flaky);

    let calls = AtomicU32::new(0);
    let missing = retry(
        |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<u32, _>("404 Not Found".to_string()) }
        },
        options(),
    )
    .await;
    println!(
        "  Client error: {:?} after {} call(s)",
        missing,
        calls.load(Ordering::SeqCst)
    );
}

// ==================== Timeouts ====================

/// Example 4: quick failures are retried within the 50ms limit, but an
/// attempt that overruns it ends the sequence.
async fn example_timeout() {
    println!("\n=== Example 4: Timeouts ===");

    let result = retry(
        |attempt: Attempt| async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if attempt.current() < 3 {
                Err(format!("refused on attempt {}", attempt.current()))
            } else {
                Ok(format!("finished on attempt {}", attempt.current()))
            }
        },
        RetryOptions::new()
            .with_max(3)
            .with_name("quick_query")
            .with_timeout(Duration::from_millis(50))
            .with_backoff_base(10.0),
    )
    .await;
    println!("  {:?}", result);

    let calls = AtomicU32::new(0);
    let result = retry(
        |_: Attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, String>(())
            }
        },
        RetryOptions::new()
            .with_max(5)
            .with_name("stuck_query")
            .with_timeout(Duration::from_millis(50))
            .with_backoff_base(10.0),
    )
    .await;
    match result {
        Err(RetryError::Timeout(e)) => println!(
            "  Gave up: {} (limit {:?}) after {} call(s)",
            e,
            e.limit(),
            calls.load(Ordering::SeqCst)
        ),
        other => println!("  Unexpected: {:?}", other),
    }
}

// ==================== Tracing ====================

/// Example 5: progress messages forwarded to the tracing subscriber.
async fn example_tracing() {
    println!("\n=== Example 5: Tracing Reporter ===");

    let _ = retry(
        |attempt: Attempt| async move {
            if attempt.is_last() {
                Ok(())
            } else {
                Err("broker unavailable")
            }
        },
        RetryOptions::new()
            .with_max(3)
            .with_backoff_base(25.0)
            .with_name("publish_event")
            .with_reporter(TracingReporter),
    )
    .await;
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("======================================");
    println!("       Retry Patterns Example         ");
    println!("======================================");

    example_basic_retry().await;
    example_backoff_curves();
    example_match_rules().await;
    example_timeout().await;
    example_tracing().await;

    println!("\n======================================");
    println!("           Examples Complete           ");
    println!("======================================");
}
