use std::time::Duration;

use docconv::application::services::RetryPolicy;

#[test]
fn given_base_delay_when_backoff_computed_then_doubles_within_jitter() {
    let policy = RetryPolicy::new(5, Duration::from_millis(1000), Duration::from_secs(60));

    for (retry_count, nominal_ms) in [(1, 1000u64), (2, 2000), (3, 4000)] {
        let delay = policy.backoff_for(retry_count).as_millis() as u64;
        assert!(
            delay >= nominal_ms * 9 / 10 && delay <= nominal_ms * 11 / 10,
            "retry {retry_count}: {delay}ms"
        );
    }
}

#[test]
fn given_many_retries_when_backoff_computed_then_capped_at_max() {
    let policy = RetryPolicy::new(50, Duration::from_millis(1000), Duration::from_secs(5));

    assert!(policy.backoff_for(40) <= Duration::from_secs(5));
}

#[test]
fn given_first_retry_when_backoff_computed_then_never_below_base() {
    let policy = RetryPolicy::new(3, Duration::from_millis(500), Duration::from_secs(10));

    for _ in 0..50 {
        assert!(policy.backoff_for(1) >= Duration::from_millis(500));
    }
}

#[test]
fn given_zero_base_when_backoff_computed_then_no_delay() {
    let policy = RetryPolicy::new(3, Duration::ZERO, Duration::ZERO);

    assert_eq!(policy.backoff_for(2), Duration::ZERO);
}

#[test]
fn given_max_below_base_when_created_then_max_is_raised_to_base() {
    let policy = RetryPolicy::new(3, Duration::from_secs(2), Duration::from_secs(1));

    assert_eq!(policy.backoff_max, Duration::from_secs(2));
}
