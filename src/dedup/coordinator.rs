use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::request_key::RequestKey;

use super::{CallRole, DedupOutcome, EvictionPolicy};

type SharedCall<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

struct InFlightCall<T, E> {
    generation: u64,
    outcome: SharedCall<T, E>,
    created_at: Instant,
    settled: Arc<AtomicBool>,
}

type CallMap<T, E> = Mutex<HashMap<RequestKey, InFlightCall<T, E>>>;

/// Collapses concurrent calls with the same [`RequestKey`] into one execution.
///
/// Every caller attached to an in-flight call observes the same `Ok` or the
/// same `Err`. The underlying call runs on its own task, so it settles (and
/// leaves the map) even if every waiter goes away.
pub struct RequestCoordinator<T, E> {
    entries: Arc<CallMap<T, E>>,
    policy: EvictionPolicy,
    next_generation: AtomicU64,
}

impl<T, E> RequestCoordinator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            policy,
            next_generation: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Runs `perform` unless a call for `key` is already in flight, in which
    /// case the caller waits for that call's outcome instead.
    ///
    /// `perform` is invoked while the map is locked and must only construct
    /// the future; it must not call back into the coordinator.
    pub async fn execute<F, Fut>(&self, key: RequestKey, perform: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let start = Instant::now();
        let (role, outcome) = self.attach_or_start(&key, perform);
        let result = outcome.await;
        DedupOutcome {
            role,
            success: result.is_ok(),
            waited: start.elapsed(),
        }
        .log(&key);
        result
    }

    fn attach_or_start<F, Fut>(&self, key: &RequestKey, perform: F) -> (CallRole, SharedCall<T, E>)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let mut entries = lock(&self.entries);
        if let Some(existing) = entries.get(key) {
            return (CallRole::Follower, existing.outcome.clone());
        }

        if let Some(capacity) = self.policy.capacity()
            && entries.len() >= capacity
        {
            drop(entries);
            warn!(key = %key, capacity, "dedup.capacity");
            let outcome = perform().boxed().shared();
            tokio::spawn(outcome.clone());
            return (CallRole::Bypass, outcome);
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let settled = Arc::new(AtomicBool::new(false));
        let call = perform();
        let map = Arc::downgrade(&self.entries);
        let owned_key = key.clone();
        let settled_flag = Arc::clone(&settled);
        let outcome = async move {
            let result = call.await;
            settled_flag.store(true, Ordering::Release);
            if let Some(map) = map.upgrade() {
                let mut entries = lock(&map);
                // The sweep may already have replaced this entry with a newer call.
                if entries
                    .get(&owned_key)
                    .is_some_and(|entry| entry.generation == generation)
                {
                    entries.remove(&owned_key);
                }
            }
            result
        }
        .boxed()
        .shared();

        entries.insert(
            key.clone(),
            InFlightCall {
                generation,
                outcome: outcome.clone(),
                created_at: Instant::now(),
                settled,
            },
        );
        drop(entries);

        tokio::spawn(outcome.clone());
        (CallRole::Leader, outcome)
    }

    /// Applies the eviction policy once; returns how many entries were removed.
    pub fn sweep(&self) -> usize {
        sweep_map(&self.entries, self.policy, Instant::now())
    }

    /// Starts the periodic sweep. The task ends once the coordinator is dropped.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let map = Arc::downgrade(&self.entries);
        let policy = self.policy;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(map) = map.upgrade() else {
                    break;
                };
                sweep_map(&map, policy, Instant::now());
            }
        })
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_in_flight(&self, key: &RequestKey) -> bool {
        lock(&self.entries).contains_key(key)
    }
}

impl<T, E> Default for RequestCoordinator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(EvictionPolicy::default())
    }
}

fn sweep_map<T, E>(map: &CallMap<T, E>, policy: EvictionPolicy, now: Instant) -> usize {
    let mut entries = lock(map);
    let before = entries.len();
    entries.retain(|key, call| {
        let age = now.saturating_duration_since(call.created_at);
        let settled = call.settled.load(Ordering::Acquire);
        let evict = policy.should_evict(age, settled);
        if evict && !settled {
            warn!(
                key = %key,
                age_ms = age.as_millis() as u64,
                "dedup.evicted_pending"
            );
        }
        !evict
    });
    let evicted = before - entries.len();
    if evicted > 0 {
        debug!(evicted, remaining = entries.len(), "dedup.sweep");
    }
    evicted
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
