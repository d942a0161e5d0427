use std::str::FromStr;
use std::time::Duration;

use rand::Rng;

use crate::errors::Error;

/// Strategy for adding randomness to the retry delay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JitterStrategy {
    /// Always wait exactly `delay`.
    None,
    /// Uniform in `[0, delay)`.
    Full,
    /// Uniform in `[delay / 2, delay * 3 / 2)`.
    Decorrelated,
}

/// Fixed-count, fixed-delay retry budget for calls made above the
/// authenticated client.
#[derive(Clone, Debug)]
pub struct RetryPlan {
    pub max_attempts: u8,
    pub delay: Duration,
    pub jitter: JitterStrategy,
}

impl RetryPlan {
    pub fn new(max_attempts: u8, delay: Duration, jitter: JitterStrategy) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            jitter,
        }
    }

    pub fn default_plan() -> Self {
        Self::new(3, Duration::from_millis(1_000), JitterStrategy::None)
    }

    /// Single attempt, never waits.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, JitterStrategy::None)
    }

    pub fn delay_for_attempt(&self, _attempt: u8, rng: &mut impl Rng) -> Duration {
        if self.delay.is_zero() {
            return Duration::ZERO;
        }
        match self.jitter {
            JitterStrategy::None => self.delay,
            JitterStrategy::Full => self.delay.mul_f64(rng.gen_range(0.0..1.0)),
            JitterStrategy::Decorrelated => self.delay.mul_f64(rng.gen_range(0.5..1.5)),
        }
    }
}

impl Default for RetryPlan {
    fn default() -> Self {
        Self::default_plan()
    }
}

impl FromStr for JitterStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(JitterStrategy::None),
            "full" => Ok(JitterStrategy::Full),
            "decorrelated" => Ok(JitterStrategy::Decorrelated),
            other => Err(Error::Config(format!(
                "Unknown jitter strategy '{}'; expected 'none', 'full' or 'decorrelated'",
                other
            ))),
        }
    }
}
