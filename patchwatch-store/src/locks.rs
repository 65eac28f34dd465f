use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::id::ServerId;

/// One mutex per server id, handed out on demand.
///
/// Holders keep the returned `Arc` alive while they lock it; slots nobody
/// holds any more are dropped on the next lookup.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<ServerId, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock guarding `id`. Callers lock it for the whole
    /// read-modify-write sequence.
    pub fn slot(&self, id: &ServerId) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock();
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        Arc::clone(slots.entry(id.clone()).or_default())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().len()
    }
}
