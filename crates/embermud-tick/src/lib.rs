//! Jittered pulse timers for Embermud's world loop.
//!
//! The world task runs a single coarse loop and asks each timer whether
//! its pulse is due on every pass. Timers are pull-based: they never
//! spawn tasks or sleep on their own, they just compare deadlines
//! against the `Instant` the caller hands them. That keeps every timer
//! trivially testable with synthetic instants and keeps all mutation of
//! game state inside the one loop that owns it.
//!
//! Periods are re-sampled from a normal distribution on each firing, so
//! pulses drift apart instead of stacking on the same loop iteration.
//!
//! # Integration
//!
//! ```ignore
//! let mut wander = PulseTimer::start(PulseConfig::fast_wander(), Instant::now());
//! loop {
//!     let now = Instant::now();
//!     if wander.due(now) {
//!         world.wander_mobiles();
//!     }
//! }
//! ```

use std::time::{Duration, Instant};

use rand::Rng;
use rand_distr::{Distribution, Normal};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Period and jitter for one recurring pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseConfig {
    /// Mean time between firings.
    pub period: Duration,
    /// Standard deviation of the per-firing jitter. Zero means the
    /// pulse fires on a fixed cadence.
    pub jitter_sigma: Duration,
}

impl PulseConfig {
    /// Shortest period a config will validate to.
    pub const MIN_PERIOD: Duration = Duration::from_millis(10);

    /// A pulse with no jitter.
    pub fn fixed(period: Duration) -> Self {
        Self {
            period,
            jitter_sigma: Duration::ZERO,
        }
    }

    /// A pulse whose period is re-sampled around `period` each firing.
    pub fn jittered(period: Duration, jitter_sigma: Duration) -> Self {
        Self {
            period,
            jitter_sigma,
        }
    }

    /// Mobile wander impulse: every 5 s, sigma 0.5 s.
    pub fn fast_wander() -> Self {
        Self::jittered(Duration::from_secs(5), Duration::from_millis(500))
    }

    /// Main heartbeat (regeneration, periodic player saves): every 30 s,
    /// sigma 2 s.
    pub fn main_heartbeat() -> Self {
        Self::jittered(Duration::from_secs(30), Duration::from_secs(2))
    }

    /// Zone repopulation sweep: every 180 s.
    pub fn repop() -> Self {
        Self::fixed(Duration::from_secs(180))
    }

    /// Dropped-object decay sweep: every 300 s.
    pub fn decay() -> Self {
        Self::fixed(Duration::from_secs(300))
    }

    /// Object persistence flush: every 900 s.
    pub fn object_flush() -> Self {
        Self::fixed(Duration::from_secs(900))
    }

    /// Combat round cadence: every 2000 ms, no jitter.
    pub fn combat_round() -> Self {
        Self::fixed(Duration::from_millis(2000))
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`PulseTimer::start`]. Rules:
    /// - `period` raised to at least [`Self::MIN_PERIOD`].
    /// - `jitter_sigma` capped at `period / 4` so a sampled period can
    ///   never clamp to zero.
    pub fn validated(mut self) -> Self {
        if self.period < Self::MIN_PERIOD {
            warn!(
                period_ms = self.period.as_millis() as u64,
                min_ms = Self::MIN_PERIOD.as_millis() as u64,
                "pulse period below minimum — clamping"
            );
            self.period = Self::MIN_PERIOD;
        }
        let max_sigma = self.period / 4;
        if self.jitter_sigma > max_sigma {
            warn!(
                sigma_ms = self.jitter_sigma.as_millis() as u64,
                max_ms = max_sigma.as_millis() as u64,
                "pulse jitter exceeds period/4 — clamping"
            );
            self.jitter_sigma = max_sigma;
        }
        self
    }

    /// Draw the next period from `N(period, sigma)`, clamped to
    /// `period ± 3σ`.
    pub fn sample_period<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.jitter_sigma.is_zero() {
            return self.period;
        }
        let mean = self.period.as_secs_f64();
        let sigma = self.jitter_sigma.as_secs_f64();
        // Sigma is validated > 0 here, so Normal::new cannot fail.
        let sampled = match Normal::new(mean, sigma) {
            Ok(dist) => dist.sample(rng),
            Err(_) => mean,
        };
        Duration::from_secs_f64(sampled.clamp(mean - 3.0 * sigma, mean + 3.0 * sigma))
    }
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// A recurring deadline driven by the caller's clock.
///
/// One `PulseTimer` per pulse kind, all polled from the world loop.
#[derive(Debug, Clone)]
pub struct PulseTimer {
    config: PulseConfig,
    next_due: Instant,
    fired: u64,
}

impl PulseTimer {
    /// Create a timer whose first firing is one sampled period after `now`.
    pub fn start(config: PulseConfig, now: Instant) -> Self {
        let config = config.validated();
        let first = config.sample_period(&mut rand::rng());
        debug!(
            period_ms = config.period.as_millis() as u64,
            sigma_ms = config.jitter_sigma.as_millis() as u64,
            "pulse timer started"
        );
        Self {
            config,
            next_due: now + first,
            fired: 0,
        }
    }

    /// Returns `true` at most once per period.
    ///
    /// On firing, the deadline is re-armed from `now` with a freshly
    /// sampled period. A loop iteration that arrives long after the
    /// deadline still fires exactly once; missed periods are not
    /// replayed.
    pub fn due(&mut self, now: Instant) -> bool {
        if now < self.next_due {
            return false;
        }
        self.fired += 1;
        let next = self.config.sample_period(&mut rand::rng());
        self.next_due = now + next;
        trace!(
            fired = self.fired,
            next_ms = next.as_millis() as u64,
            "pulse fired"
        );
        true
    }

    /// Re-arm the deadline without firing.
    pub fn rearm(&mut self, now: Instant) {
        self.next_due = now + self.config.sample_period(&mut rand::rng());
    }

    /// When the timer will next report due.
    pub fn next_due(&self) -> Instant {
        self.next_due
    }

    /// How many times the timer has fired.
    pub fn fired(&self) -> u64 {
        self.fired
    }

    /// The validated config this timer runs on.
    pub fn config(&self) -> &PulseConfig {
        &self.config
    }
}
