//! Per-key in-process mutex, used to serialize the User→SessionIds index
//! read-modify-write. An optimisation only — the index itself must still
//! self-heal if another replica races it.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct KeyLock {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the mutex for `key`, creating it on first use. The returned
    /// guard must be held for the duration of the read-modify-write.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let entry = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        entry.lock_owned().await
    }
}
