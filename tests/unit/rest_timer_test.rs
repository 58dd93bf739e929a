//! Unit tests for the rest countdown.

use setpace::workouts::rest_timer::{RestTimer, DEFAULT_MAX_EXTENSION_SECONDS};

#[test]
fn test_countdown_reaches_exactly_zero() {
    let mut timer = RestTimer::start(3);
    assert!(timer.is_active());

    assert!(!timer.tick());
    assert!(!timer.tick());
    assert!(timer.tick());
    assert_eq!(timer.remaining_seconds(), 0);
    assert!(timer.is_expired());

    // Floored at zero
    timer.tick();
    assert_eq!(timer.remaining_seconds(), 0);
}

#[test]
fn test_frozen_timer_holds() {
    let mut timer = RestTimer::start(20);
    timer.freeze();
    for _ in 0..10 {
        timer.tick();
    }
    assert_eq!(timer.remaining_seconds(), 20);

    timer.unfreeze();
    timer.tick();
    assert_eq!(timer.remaining_seconds(), 19);
}

#[test]
fn test_extension_is_capped_per_call() {
    let mut timer = RestTimer::start(60);

    let added = timer.add_seconds(1_000, DEFAULT_MAX_EXTENSION_SECONDS);
    assert_eq!(added, DEFAULT_MAX_EXTENSION_SECONDS);
    assert_eq!(timer.remaining_seconds(), 360);

    assert_eq!(timer.add_seconds(15, DEFAULT_MAX_EXTENSION_SECONDS), 15);
    assert_eq!(timer.remaining_seconds(), 375);
}

#[test]
fn test_skip_expires_immediately() {
    let mut timer = RestTimer::start(90);
    timer.skip();

    assert!(timer.is_expired());
    assert_eq!(timer.state().remaining_seconds, 0);
    assert_eq!(timer.state().total_seconds, 90);
}
