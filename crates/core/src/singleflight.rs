//! Duplicate-call suppression.
//!
//! When many requests miss the permission cache for the same user at once,
//! [`SingleFlight`] lets the first one load from storage while the rest wait
//! for its result instead of issuing identical queries.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

/// Collapses concurrent calls that share a key into one execution.
///
/// Only successful results are shared. If the leading call fails or is
/// dropped, waiters re-race and one of them runs the work itself, so an
/// error is never handed to a caller that did not produce it.
pub struct SingleFlight<K, V> {
    calls: Mutex<HashMap<K, broadcast::Sender<V>>>,
}

enum Role<V> {
    Leader,
    Follower(broadcast::Receiver<V>),
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    fn calls(&self) -> MutexGuard<'_, HashMap<K, broadcast::Sender<V>>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `work` for `key` unless an identical call is already in flight,
    /// in which case wait for and return that call's result.
    pub async fn run<F, Fut, E>(&self, key: K, work: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let mut work = Some(work);
        loop {
            let role = {
                let mut calls = self.calls();
                match calls.get(&key) {
                    Some(sender) => Role::Follower(sender.subscribe()),
                    None => {
                        let (sender, _) = broadcast::channel(1);
                        calls.insert(key.clone(), sender);
                        Role::Leader
                    }
                }
            };

            match role {
                Role::Follower(mut receiver) => match receiver.recv().await {
                    Ok(value) => return Ok(value),
                    // Leader failed or was cancelled: try again.
                    Err(_) => continue,
                },
                Role::Leader => {
                    let mut guard = LeaderGuard {
                        flight: self,
                        key: Some(key.clone()),
                    };
                    // A leader is elected at most once per call, so `work`
                    // is always still present here.
                    let Some(work) = work.take() else {
                        guard.finish();
                        continue;
                    };
                    let result = work().await;
                    let sender = guard.finish();
                    if let (Ok(value), Some(sender)) = (&result, sender) {
                        // No receivers is fine.
                        let _ = sender.send(value.clone());
                    }
                    return result;
                }
            }
        }
    }

    /// Number of keys currently in flight.
    pub fn in_flight(&self) -> usize {
        self.calls().len()
    }
}

/// Removes the leader's entry even when its future is dropped mid-flight,
/// which wakes followers with a closed channel.
struct LeaderGuard<'a, K: Eq + Hash + Clone, V: Clone> {
    flight: &'a SingleFlight<K, V>,
    key: Option<K>,
}

impl<K: Eq + Hash + Clone, V: Clone> LeaderGuard<'_, K, V> {
    fn finish(&mut self) -> Option<broadcast::Sender<V>> {
        let key = self.key.take()?;
        self.flight.calls().remove(&key)
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Drop for LeaderGuard<'_, K, V> {
    fn drop(&mut self) {
        self.finish();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
