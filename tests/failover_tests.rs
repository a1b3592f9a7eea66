//! Failover URI parsing and the reconnect schedule it drives.

use std::collections::HashSet;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use stomp_core::{Failover, FailoverUri, StompError};

fn parse(uri: &str) -> FailoverUri {
    uri.parse().expect("uri parse failed")
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

// ============================================================================
// URI parsing
// ============================================================================

#[test]
fn bracketed_form_with_options() {
    let uri = parse("failover:(tcp://primary:61613,tcp://secondary:61614)?randomize=false");
    assert_eq!(uri.brokers.len(), 2);
    assert_eq!(uri.brokers[0].host, "primary");
    assert_eq!(uri.brokers[1].port, 61614);
    assert!(!uri.options.randomize);
}

#[test]
fn double_slash_and_bracketless_forms() {
    let a = parse("failover://(tcp://a:1,tcp://b:2)");
    let b = parse("failover:tcp://a:1,tcp://b:2");
    assert_eq!(a.brokers, b.brokers);
}

#[test]
fn whitespace_around_commas_tolerated() {
    let uri = parse("failover:(tcp://a:1, tcp://b:2 , tcp://c:3)");
    let hosts: Vec<_> = uri.brokers.iter().map(|b| b.host.as_str()).collect();
    assert_eq!(hosts, vec!["a", "b", "c"]);
}

#[test]
fn option_defaults() {
    let uri = parse("failover:(tcp://a:1)");
    let options = &uri.options;
    assert_eq!(options.initial_reconnect_delay, 10);
    assert_eq!(options.max_reconnect_delay, 30_000);
    assert!(options.use_exponential_back_off);
    assert_eq!(options.back_off_multiplier, 2.0);
    assert_eq!(options.max_reconnect_attempts, -1);
    assert_eq!(options.startup_max_reconnect_attempts, 0);
    assert!(options.randomize);
}

#[test]
fn malformed_uris_rejected() {
    for uri in [
        "failover:(tcp://a:1",
        "failover:(udp://a:1)",
        "failover:(tcp://a)",
        "failover:(tcp://a:notaport)",
        "failover:(tcp://a:1)?randomize=maybe",
        "failover:(tcp://a:1)?unknownOption=1",
        "failover:(tcp://a:1)?randomize",
    ] {
        assert!(
            matches!(uri.parse::<FailoverUri>(), Err(StompError::InvalidUri(_))),
            "uri should be rejected: {}",
            uri
        );
    }
}

// ============================================================================
// Schedule
// ============================================================================

#[test]
fn exponential_backoff_cycle() {
    let uri = parse(
        "failover:(tcp://a:1,tcp://b:2)?randomize=false&initialReconnectDelay=100&maxReconnectDelay=400&backOffMultiplier=2",
    );
    let mut schedule = uri.schedule();

    let expected = [
        ("a", 1, 0),
        ("b", 2, 100),
        ("a", 1, 200),
        ("b", 2, 400),
        ("a", 1, 400),
    ];
    for (host, port, delay) in expected {
        let (broker, before) = schedule.next().expect("schedule ended early");
        assert_eq!(broker.host, host);
        assert_eq!(broker.port, port);
        assert_eq!(before, ms(delay));
    }
}

#[test]
fn flat_delay_without_exponential_backoff() {
    let uri = parse(
        "failover:(tcp://a:1)?randomize=false&useExponentialBackOff=false&initialReconnectDelay=50",
    );
    let mut schedule = uri.schedule();
    assert_eq!(schedule.next().unwrap().1, ms(0));
    assert_eq!(schedule.next().unwrap().1, ms(50));
    assert_eq!(schedule.next().unwrap().1, ms(50));
}

#[test]
fn reset_restarts_delay_and_counters() {
    let uri = parse(
        "failover:(tcp://a:1)?randomize=false&initialReconnectDelay=100&maxReconnectDelay=400",
    );
    let mut schedule = uri.schedule();
    assert_eq!(schedule.next().unwrap().1, ms(0));
    assert_eq!(schedule.next().unwrap().1, ms(100));
    assert_eq!(schedule.next().unwrap().1, ms(200));

    schedule.reset();
    assert_eq!(schedule.next().unwrap().1, ms(0));
    assert_eq!(schedule.next().unwrap().1, ms(100));
}

#[test]
fn attempts_run_out() {
    let uri = parse("failover:(tcp://a:1)?randomize=false&maxReconnectAttempts=2");
    let mut schedule = uri.schedule();
    // the initial attempt plus two retries
    assert!(schedule.next().is_ok());
    assert!(schedule.next().is_ok());
    assert!(schedule.next().is_ok());
    match schedule.next() {
        Err(StompError::FailoverExhausted { attempts }) => assert_eq!(attempts, 2),
        other => panic!("expected exhaustion, got {:?}", other.map(|_| ())),
    }
    // exhaustion is sticky
    assert!(schedule.next().is_err());
}

#[test]
fn zero_max_attempts_means_no_retry() {
    let uri = parse("failover:(tcp://a:1)?randomize=false&maxReconnectAttempts=0");
    let mut schedule = uri.schedule();
    assert!(schedule.next().is_ok());
    assert!(matches!(
        schedule.next(),
        Err(StompError::FailoverExhausted { .. })
    ));
}

#[test]
fn startup_cap_applies_before_first_success() {
    let uri = parse(
        "failover:(tcp://a:1)?randomize=false&maxReconnectAttempts=-1&startupMaxReconnectAttempts=1",
    );
    let mut schedule = uri.schedule();
    assert!(schedule.next().is_ok());
    assert!(schedule.next().is_ok());
    assert!(matches!(
        schedule.next(),
        Err(StompError::FailoverExhausted { .. })
    ));

    // after a success the steady-state cap (unlimited) takes over
    let mut schedule = uri.schedule();
    assert!(schedule.next().is_ok());
    schedule.reset();
    for _ in 0..10 {
        assert!(schedule.next().is_ok());
    }
}

#[test]
fn randomized_cycles_cover_every_endpoint() {
    let uri = parse("failover:(tcp://a:1,tcp://b:2,tcp://c:3)?initialReconnectDelay=1");
    let mut schedule = Failover::with_rng(uri, StdRng::seed_from_u64(7));
    for _ in 0..4 {
        let mut cycle = HashSet::new();
        for _ in 0..3 {
            let (broker, _) = schedule.next().expect("schedule ended early");
            cycle.insert(broker.host);
        }
        // each full pass visits each endpoint exactly once, in some order
        assert_eq!(cycle.len(), 3);
    }
}

#[test]
fn first_delay_is_zero_even_with_large_initial_delay() {
    let uri = parse("failover:(tcp://a:1)?randomize=false&initialReconnectDelay=5000");
    let mut schedule = uri.schedule();
    assert_eq!(schedule.next().unwrap().1, ms(0));
    assert_eq!(schedule.next().unwrap().1, ms(5000));
}
