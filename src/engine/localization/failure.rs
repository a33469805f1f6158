//! Registration failure tracking.
//!
//! Tracks consecutive low-confidence registrations to tell a momentary
//! occlusion apart from genuinely lost tracking. A single bad frame only
//! degrades the session; a streak beyond the configured limit triggers the
//! global relocalization fallback.

use serde::{Deserialize, Serialize};

/// Configuration for [`FailureTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailureTrackerConfig {
    /// Fitness score above which a registration is judged failed.
    /// Default: 0.5
    pub fitness_threshold: f64,

    /// Consecutive failures after which relocalization is triggered.
    /// Default: 5
    pub max_consecutive_failures: u32,
}

impl Default for FailureTrackerConfig {
    fn default() -> Self {
        Self {
            fitness_threshold: 0.5,
            max_consecutive_failures: 5,
        }
    }
}

/// Outcome of judging one registration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegistrationCheck {
    /// Whether this registration was judged failed.
    pub failed: bool,
    /// Whether the failure streak now exceeds the configured limit.
    pub should_relocalize: bool,
    /// Consecutive failures since the last success.
    pub consecutive_failures: u32,
}

/// Consecutive-failure counter with a fitness moving average for
/// diagnostics.
#[derive(Debug)]
pub struct FailureTracker {
    config: FailureTrackerConfig,
    consecutive: u32,
    fitness_ema: f64,
    has_samples: bool,
}

impl FailureTracker {
    /// Smoothing factor for the fitness moving average.
    const EMA_ALPHA: f64 = 0.3;

    /// Create a new tracker.
    pub fn new(config: FailureTrackerConfig) -> Self {
        Self {
            config,
            consecutive: 0,
            fitness_ema: 0.0,
            has_samples: false,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &FailureTrackerConfig {
        &self.config
    }

    /// Judge a finished registration.
    ///
    /// A registration fails when the matcher did not converge or its fitness
    /// score exceeds the threshold. Success resets the streak to zero.
    pub fn check(&mut self, fitness: f64, converged: bool) -> RegistrationCheck {
        self.update_ema(fitness);

        let failed = !converged || fitness > self.config.fitness_threshold;
        if failed {
            self.consecutive = self.consecutive.saturating_add(1);
        } else {
            self.consecutive = 0;
        }

        RegistrationCheck {
            failed,
            should_relocalize: self.consecutive > self.config.max_consecutive_failures,
            consecutive_failures: self.consecutive,
        }
    }

    /// Consecutive failures since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive
    }

    /// Moving average of recent fitness scores.
    pub fn fitness_average(&self) -> f64 {
        self.fitness_ema
    }

    /// Reset the streak, e.g. after a successful relocalization.
    pub fn reset(&mut self) {
        self.consecutive = 0;
        self.fitness_ema = 0.0;
        self.has_samples = false;
    }

    fn update_ema(&mut self, fitness: f64) {
        // The sentinel would swamp the average; track it as "very bad".
        let sample = fitness.min(1e3);
        if self.has_samples {
            self.fitness_ema = Self::EMA_ALPHA * sample + (1.0 - Self::EMA_ALPHA) * self.fitness_ema;
        } else {
            self.fitness_ema = sample;
            self.has_samples = true;
        }
    }
}

impl Default for FailureTracker {
    fn default() -> Self {
        Self::new(FailureTrackerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_keeps_streak_zero() {
        let mut tracker = FailureTracker::default();
        for _ in 0..10 {
            let check = tracker.check(0.1, true);
            assert!(!check.failed);
            assert!(!check.should_relocalize);
        }
        assert_eq!(tracker.consecutive_failures(), 0);
    }

    #[test]
    fn test_streak_triggers_relocalization() {
        let config = FailureTrackerConfig {
            fitness_threshold: 0.5,
            max_consecutive_failures: 3,
        };
        let mut tracker = FailureTracker::new(config);

        for i in 1..=3 {
            let check = tracker.check(2.0, true);
            assert!(check.failed);
            assert!(!check.should_relocalize, "triggered early at {}", i);
        }
        let check = tracker.check(2.0, true);
        assert!(check.should_relocalize);
        assert_eq!(check.consecutive_failures, 4);
    }

    #[test]
    fn test_non_convergence_counts_as_failure() {
        let mut tracker = FailureTracker::default();
        let check = tracker.check(0.0, false);
        assert!(check.failed);
        assert_eq!(check.consecutive_failures, 1);
    }

    #[test]
    fn test_success_resets_streak() {
        let mut tracker = FailureTracker::default();
        tracker.check(2.0, true);
        tracker.check(2.0, true);
        assert_eq!(tracker.consecutive_failures(), 2);

        let check = tracker.check(0.1, true);
        assert!(!check.failed);
        assert_eq!(tracker.consecutive_failures(), 0);
    }

    #[test]
    fn test_sentinel_fitness_is_failure() {
        let mut tracker = FailureTracker::default();
        let check = tracker.check(f64::MAX, true);
        assert!(check.failed);
        assert!(tracker.fitness_average() <= 1e3);
    }
}
