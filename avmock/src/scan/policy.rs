//! Scan decision policies.
//!
//! The mock never looks at file content. A policy only decides how long a "scan" takes and what
//! it concludes, which lets tests force either verdict and skip the wait entirely.

use std::time::Duration;

use rand::prelude::RngExt;
use rand::rng;

use crate::config::ScanConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Clean,
    Infected,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Clean => "clean",
            Verdict::Infected => "infected",
        }
    }
}

pub trait ScanPolicy: Send + Sync {
    /// How long the simulated scan should take
    fn scan_delay(&self) -> Duration;

    /// The verdict for one scan. Must be independent of any earlier call.
    fn verdict(&self) -> Verdict;
}

/// Randomised policy used by the running service.
#[derive(Debug, Clone)]
pub struct RandomScanPolicy {
    infection_probability: f64,
    min_delay: Duration,
    max_delay: Duration,
}

impl RandomScanPolicy {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            infection_probability: config.infection_probability.clamp(0.0, 1.0),
            min_delay: config.min_delay.min(config.max_delay),
            max_delay: config.max_delay.max(config.min_delay),
        }
    }
}

impl ScanPolicy for RandomScanPolicy {
    fn scan_delay(&self) -> Duration {
        if self.min_delay == self.max_delay {
            return self.min_delay;
        }
        let secs = rng().random_range(self.min_delay.as_secs_f64()..=self.max_delay.as_secs_f64());
        Duration::from_secs_f64(secs)
    }

    fn verdict(&self) -> Verdict {
        if rng().random_bool(self.infection_probability) {
            Verdict::Infected
        } else {
            Verdict::Clean
        }
    }
}

/// Deterministic policy: always the same delay and verdict.
#[derive(Debug, Clone)]
pub struct FixedScanPolicy {
    pub delay: Duration,
    pub verdict: Verdict,
}

impl FixedScanPolicy {
    pub fn clean() -> Self {
        Self {
            delay: Duration::ZERO,
            verdict: Verdict::Clean,
        }
    }

    pub fn infected() -> Self {
        Self {
            delay: Duration::ZERO,
            verdict: Verdict::Infected,
        }
    }
}

impl ScanPolicy for FixedScanPolicy {
    fn scan_delay(&self) -> Duration {
        self.delay
    }

    fn verdict(&self) -> Verdict {
        self.verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(probability: f64, min_ms: u64, max_ms: u64) -> RandomScanPolicy {
        RandomScanPolicy::new(&ScanConfig {
            infection_probability: probability,
            min_delay: Duration::from_millis(min_ms),
            max_delay: Duration::from_millis(max_ms),
        })
    }

    #[test]
    fn test_delay_stays_within_bounds() {
        let policy = policy(0.01, 500, 2000);
        for _ in 0..1000 {
            let delay = policy.scan_delay();
            assert!(delay >= Duration::from_millis(500), "delay {delay:?} below range");
            assert!(delay <= Duration::from_millis(2000), "delay {delay:?} above range");
        }
    }

    #[test]
    fn test_zero_width_range_is_exact() {
        assert_eq!(policy(0.01, 0, 0).scan_delay(), Duration::ZERO);
        assert_eq!(policy(0.01, 750, 750).scan_delay(), Duration::from_millis(750));
    }

    #[test]
    fn test_probability_extremes() {
        let never = policy(0.0, 0, 0);
        let always = policy(1.0, 0, 0);
        for _ in 0..100 {
            assert_eq!(never.verdict(), Verdict::Clean);
            assert_eq!(always.verdict(), Verdict::Infected);
        }
    }

    #[test]
    fn test_default_rate_produces_both_verdicts() {
        // With p = 0.01 the chance of seeing no infection in 20k draws is ~2e-87
        let policy = policy(0.01, 0, 0);
        let infected = (0..20_000).filter(|_| policy.verdict() == Verdict::Infected).count();

        assert!(infected > 0, "expected at least one infected verdict");
        assert!(infected < 20_000, "expected at least one clean verdict");
        // Loose bounds around the expected 200
        assert!((100..=320).contains(&infected), "infection count {infected} far from 1%");
    }

    #[test]
    fn test_fixed_policy() {
        assert_eq!(FixedScanPolicy::clean().verdict(), Verdict::Clean);
        assert_eq!(FixedScanPolicy::infected().verdict(), Verdict::Infected);
        assert_eq!(FixedScanPolicy::infected().scan_delay(), Duration::ZERO);
    }
}
