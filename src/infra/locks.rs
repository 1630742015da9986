use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::app::error::{FollowError, FollowResult};

type PairKey = (Uuid, Uuid);
type Slots = Arc<Mutex<HashMap<PairKey, Arc<AsyncMutex<()>>>>>;

/// Registry of one async mutex per (follower, followed) pair. Entries live
/// only while someone holds or waits on them.
#[derive(Clone, Default)]
pub struct PairLocks {
    slots: Slots,
}

pub struct PairGuard {
    key: PairKey,
    guard: Option<OwnedMutexGuard<()>>,
    slots: Slots,
}

impl PairLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(
        &self,
        follower_id: Uuid,
        followed_id: Uuid,
        wait: Duration,
    ) -> FollowResult<PairGuard> {
        let key = (follower_id, followed_id);
        let slot = self.slot(key);

        match tokio::time::timeout(wait, slot.clone().lock_owned()).await {
            Ok(guard) => Ok(PairGuard {
                key,
                guard: Some(guard),
                slots: self.slots.clone(),
            }),
            Err(_) => {
                self.abandon(key, slot);
                tracing::warn!(%follower_id, %followed_id, "timed out waiting for relationship lock");
                Err(FollowError::conflict("relationship is being modified, retry"))
            }
        }
    }

    fn slot(&self, key: PairKey) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(|err| err.into_inner());
        slots.entry(key).or_default().clone()
    }

    /// Gives up a waiter's claim. The holder may already be gone, so the slot
    /// is released only after our own reference is dropped.
    fn abandon(&self, key: PairKey, slot: Arc<AsyncMutex<()>>) {
        drop(slot);
        release_slot(&self.slots, key);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|err| err.into_inner()).len()
    }
}

impl Drop for PairGuard {
    fn drop(&mut self) {
        self.guard.take();
        release_slot(&self.slots, self.key);
    }
}

// The map's own reference is the last one once nobody holds or waits.
fn release_slot(slots: &Slots, key: PairKey) {
    let mut slots = slots.lock().unwrap_or_else(|err| err.into_inner());
    if slots.get(&key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
        slots.remove(&key);
    }
}
