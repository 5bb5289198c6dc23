//! Integration tests for the pulse timers.
//!
//! Timers are pull-based, so every test drives them with synthetic
//! instants (`start + Duration`) instead of sleeping.

use std::time::{Duration, Instant};

use embermud_tick::{PulseConfig, PulseTimer};

// =========================================================================
// Helpers
// =========================================================================

fn fixed_5s() -> PulseConfig {
    PulseConfig::fixed(Duration::from_secs(5))
}

// =========================================================================
// PulseConfig
// =========================================================================

#[test]
fn test_validated_raises_tiny_period_to_minimum() {
    let cfg = PulseConfig::fixed(Duration::from_millis(1)).validated();
    assert_eq!(cfg.period, PulseConfig::MIN_PERIOD);
}

#[test]
fn test_validated_caps_sigma_at_quarter_period() {
    let cfg =
        PulseConfig::jittered(Duration::from_secs(4), Duration::from_secs(3)).validated();
    assert_eq!(cfg.jitter_sigma, Duration::from_secs(1));
}

#[test]
fn test_validated_keeps_sane_config_unchanged() {
    let cfg = PulseConfig::main_heartbeat();
    assert_eq!(cfg.validated(), cfg);
}

#[test]
fn test_sample_period_fixed_config_is_exact() {
    let cfg = fixed_5s();
    let mut rng = rand::rng();
    for _ in 0..32 {
        assert_eq!(cfg.sample_period(&mut rng), Duration::from_secs(5));
    }
}

#[test]
fn test_sample_period_jittered_stays_within_three_sigma() {
    let cfg = PulseConfig::fast_wander().validated();
    let lo = Duration::from_millis(3500);
    let hi = Duration::from_millis(6500);
    let mut rng = rand::rng();
    for _ in 0..1000 {
        let p = cfg.sample_period(&mut rng);
        assert!(p >= lo && p <= hi, "sampled {p:?} outside [{lo:?}, {hi:?}]");
    }
}

#[test]
fn test_sample_period_jittered_actually_varies() {
    let cfg = PulseConfig::fast_wander().validated();
    let mut rng = rand::rng();
    let first = cfg.sample_period(&mut rng);
    let varied = (0..100).any(|_| cfg.sample_period(&mut rng) != first);
    assert!(varied, "100 samples of a jittered pulse were all identical");
}

#[test]
fn test_standard_pulse_periods() {
    assert_eq!(PulseConfig::fast_wander().period, Duration::from_secs(5));
    assert_eq!(PulseConfig::main_heartbeat().period, Duration::from_secs(30));
    assert_eq!(PulseConfig::repop().period, Duration::from_secs(180));
    assert_eq!(PulseConfig::decay().period, Duration::from_secs(300));
    assert_eq!(PulseConfig::object_flush().period, Duration::from_secs(900));
    assert_eq!(
        PulseConfig::combat_round().period,
        Duration::from_millis(2000)
    );
    assert!(PulseConfig::repop().jitter_sigma.is_zero());
}

// =========================================================================
// PulseTimer
// =========================================================================

#[test]
fn test_due_not_before_first_period() {
    let start = Instant::now();
    let mut timer = PulseTimer::start(fixed_5s(), start);
    assert!(!timer.due(start));
    assert!(!timer.due(start + Duration::from_secs(4)));
    assert_eq!(timer.fired(), 0);
}

#[test]
fn test_due_fires_once_per_period() {
    let start = Instant::now();
    let mut timer = PulseTimer::start(fixed_5s(), start);
    assert!(timer.due(start + Duration::from_secs(5)));
    // Same instant again: already re-armed.
    assert!(!timer.due(start + Duration::from_secs(5)));
    assert!(timer.due(start + Duration::from_secs(10)));
    assert_eq!(timer.fired(), 2);
}

#[test]
fn test_due_late_poll_fires_exactly_once() {
    // The loop stalled past several deadlines; missed periods are not
    // replayed as a burst.
    let start = Instant::now();
    let mut timer = PulseTimer::start(fixed_5s(), start);
    let late = start + Duration::from_secs(60);
    assert!(timer.due(late));
    assert!(!timer.due(late));
    assert!(!timer.due(late + Duration::from_secs(4)));
    assert!(timer.due(late + Duration::from_secs(5)));
}

#[test]
fn test_due_rearms_from_poll_instant_not_deadline() {
    let start = Instant::now();
    let mut timer = PulseTimer::start(fixed_5s(), start);
    let poll = start + Duration::from_secs(7);
    assert!(timer.due(poll));
    assert_eq!(timer.next_due(), poll + Duration::from_secs(5));
}

#[test]
fn test_rearm_pushes_deadline_without_firing() {
    let start = Instant::now();
    let mut timer = PulseTimer::start(fixed_5s(), start);
    let now = start + Duration::from_secs(4);
    timer.rearm(now);
    assert!(!timer.due(start + Duration::from_secs(6)));
    assert!(timer.due(now + Duration::from_secs(5)));
    assert_eq!(timer.fired(), 1);
}

#[test]
fn test_jittered_timer_first_deadline_within_bounds() {
    let start = Instant::now();
    let timer = PulseTimer::start(PulseConfig::fast_wander(), start);
    let offset = timer.next_due() - start;
    assert!(offset >= Duration::from_millis(3500));
    assert!(offset <= Duration::from_millis(6500));
}
