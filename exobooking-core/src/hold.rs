use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::StoreError;
use crate::model::SlotKey;

type Holds = DashMap<SlotKey, Arc<Mutex<()>>>;

/// In-process table of exclusive holds, one per slot key.
///
/// An entry exists only while someone owns or waits on it, so the table is bounded by the
/// number of in-flight units of work rather than by the keys ever asked for.
#[derive(Debug, Clone, Default)]
pub struct HoldTable {
    holds: Arc<Holds>,
}

impl HoldTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits at most `wait` for the hold on `key`.
    pub async fn acquire(&self, key: SlotKey, wait: Duration) -> Result<KeyHold, StoreError> {
        let mutex = self.holds.entry(key).or_default().value().clone();

        match tokio::time::timeout(wait, mutex.lock_owned()).await {
            Ok(guard) => Ok(KeyHold {
                key,
                holds: self.holds.clone(),
                guard: Some(guard),
            }),
            Err(_) => {
                release_if_idle(&self.holds, key);
                Err(StoreError::LockTimeout(wait.as_millis() as u64))
            }
        }
    }

    /// Keys currently owned or waited on.
    pub fn len(&self) -> usize {
        self.holds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holds.is_empty()
    }
}

/// Owned hold on one key. Released on drop.
#[derive(Debug)]
pub struct KeyHold {
    key: SlotKey,
    holds: Arc<Holds>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyHold {
    pub fn key(&self) -> SlotKey {
        self.key
    }
}

impl Drop for KeyHold {
    fn drop(&mut self) {
        drop(self.guard.take());
        release_if_idle(&self.holds, self.key);
    }
}

// Only the table's own reference left means nobody owns or waits on the key.
// `remove_if` runs under the shard lock, so a concurrent `acquire` either cloned
// the mutex first (count > 1) or inserts a fresh one afterwards.
fn release_if_idle(holds: &Holds, key: SlotKey) {
    holds.remove_if(&key, |_, mutex| Arc::strong_count(mutex) == 1);
}
