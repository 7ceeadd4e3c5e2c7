use std::collections::HashMap;
use std::sync::Arc;

use ailvi_core::UserId;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>;

/// One async mutex per user, created on first use and dropped when the last
/// holder or waiter lets go.
///
/// A guard is held for the whole processing of one inbound message, so
/// reads and writes of a session never interleave. Waiters are served in
/// FIFO order.
#[derive(Default)]
pub struct SessionLocks {
    locks: LockMap,
}

/// Holds a user's session lock. Dropping it releases the lock and removes
/// the map entry when nobody else is waiting.
pub struct SessionGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a LockMap,
    user_id: UserId,
}

impl SessionLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, user_id: &UserId) -> SessionGuard<'_> {
        let lock = Arc::clone(self.locks.lock().entry(user_id.clone()).or_default());
        let guard = lock.lock_owned().await;
        SessionGuard { guard: Some(guard), locks: &self.locks, user_id: user_id.clone() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        // The owned guard keeps its own reference to the mutex.
        drop(self.guard.take());
        let mut map = self.locks.lock();
        if map.get(&self.user_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            map.remove(&self.user_id);
        }
    }
}
