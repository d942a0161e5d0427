use std::str::FromStr;
use std::time::Duration;

use crate::errors::Error;

/// Controls what the periodic sweep may remove from the in-flight map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Only settled entries are swept. Memory is bounded by refusing to
    /// register more than `max_entries` pending calls; overflow calls run
    /// without deduplication.
    SettledOnly { max_entries: usize },
    /// Entries older than `ttl` are swept whether or not they settled. A slow
    /// call evicted this way stops deduplicating, so an identical call issued
    /// afterwards reaches the network a second time.
    AgeSweep { ttl: Duration },
}

impl EvictionPolicy {
    pub fn settled_only(max_entries: usize) -> Self {
        EvictionPolicy::SettledOnly { max_entries }
    }

    pub fn age_sweep(ttl: Duration) -> Self {
        EvictionPolicy::AgeSweep { ttl }
    }

    pub(crate) fn capacity(&self) -> Option<usize> {
        match self {
            EvictionPolicy::SettledOnly { max_entries } => Some(*max_entries),
            EvictionPolicy::AgeSweep { .. } => None,
        }
    }

    pub(crate) fn should_evict(&self, age: Duration, settled: bool) -> bool {
        match self {
            EvictionPolicy::SettledOnly { .. } => settled,
            EvictionPolicy::AgeSweep { ttl } => settled || age > *ttl,
        }
    }
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        EvictionPolicy::SettledOnly { max_entries: 1_024 }
    }
}

/// Parses the policy name only; limits come from the rest of the config.
impl FromStr for EvictionPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "settled" | "settled_only" => Ok(EvictionPolicy::default()),
            "age" | "age_sweep" => Ok(EvictionPolicy::AgeSweep {
                ttl: Duration::from_millis(1_000),
            }),
            other => Err(Error::Config(format!(
                "Unknown eviction policy '{}'; expected 'settled' or 'age'",
                other
            ))),
        }
    }
}
