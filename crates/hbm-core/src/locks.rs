//! Per-key exclusive locks with bounded waiting.
//!
//! A [`LockRegistry`] hands out one `tokio` mutex per key. Guards are
//! owned, so they live exactly as long as the action holding them and are
//! released on every exit path when dropped. Acquisition is bounded by the
//! registry timeout and fails with [`EngineError::Busy`] on expiry.
//!
//! Keys of unrelated entities never share a mutex, so an action on one
//! space never waits on an action on another.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::EngineError;

/// Registry size above which idle slots are dropped on the next acquire.
const PRUNE_THRESHOLD: usize = 1024;

/// Exclusive access to one key, released on drop.
#[derive(Debug)]
pub struct KeyGuard<K> {
    _guard: OwnedMutexGuard<()>,
    _key: PhantomData<K>,
}

/// One mutex per key, created on first use.
#[derive(Debug)]
pub struct LockRegistry<K> {
    resource: &'static str,
    timeout: Duration,
    slots: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> LockRegistry<K>
where
    K: Copy + Eq + Hash + Ord + Display,
{
    /// Create a registry for the named resource kind.
    pub fn new(resource: &'static str, timeout: Duration) -> Self {
        Self {
            resource,
            timeout,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the lock for `key`, waiting at most the registry timeout.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Busy`] if the lock is still held when the
    /// timeout expires.
    pub async fn acquire(&self, key: K) -> Result<KeyGuard<K>, EngineError> {
        let slot = self.slot(key).await;
        match tokio::time::timeout(self.timeout, slot.lock_owned()).await {
            Ok(guard) => Ok(KeyGuard {
                _guard: guard,
                _key: PhantomData,
            }),
            Err(elapsed) => {
                let waited_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(
                    resource = self.resource,
                    key = %key,
                    waited_ms,
                    "lock acquisition timed out: {elapsed}"
                );
                Err(EngineError::Busy {
                    resource: self.resource,
                    key: key.to_string(),
                    waited_ms,
                })
            }
        }
    }

    /// Acquire every key in ascending order.
    ///
    /// Taking a [`BTreeSet`] fixes both deduplication and ordering, so two
    /// actions locking overlapping sets can never deadlock. On failure the
    /// guards already taken are released before returning.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Busy`] if any lock times out.
    pub async fn acquire_all(&self, keys: &BTreeSet<K>) -> Result<Vec<KeyGuard<K>>, EngineError> {
        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.acquire(*key).await?);
        }
        Ok(guards)
    }

    async fn slot(&self, key: K) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock().await;
        if slots.len() > PRUNE_THRESHOLD {
            // A slot referenced only by the map is neither held nor awaited.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        }
        Arc::clone(slots.entry(key).or_default())
    }
}
