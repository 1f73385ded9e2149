use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per region, so overlapping runs never export or upload
/// the same region at the same time.
#[derive(Default)]
pub struct RegionLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RegionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `region` is free and hold it until the guard is dropped.
    pub async fn lock(&self, region: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(region.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    pub async fn is_locked(&self, region: &str) -> bool {
        match self.locks.lock().await.get(region) {
            Some(lock) => lock.try_lock().is_err(),
            None => false,
        }
    }
}
