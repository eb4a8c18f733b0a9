use crate::domain::member::MemberId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per member.
///
/// Every balance mutation holds its member's guard for the whole
/// read-compute-commit cycle, so check-then-act on a wallet cannot interleave.
#[derive(Default, Clone)]
pub struct MemberLocks {
    slots: Arc<Mutex<HashMap<MemberId, Arc<AsyncMutex<()>>>>>,
}

/// Guards held for the duration of an operation. Dropping releases them.
pub struct MemberGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl MemberLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: MemberId) -> Arc<AsyncMutex<()>> {
        // Poisoning only happens if a holder panicked while inserting; the map is
        // still consistent then.
        let mut slots = self
            .slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.entry(id).or_default().clone()
    }

    pub async fn lock(&self, id: MemberId) -> MemberGuard {
        self.lock_all(&[id]).await
    }

    /// Locks several members in ascending id order to avoid deadlocks between
    /// operations that touch the same pair.
    pub async fn lock_all(&self, ids: &[MemberId]) -> MemberGuard {
        let mut ordered = ids.to_vec();
        ordered.sort();
        ordered.dedup();
        let mut guards = Vec::with_capacity(ordered.len());
        for id in ordered {
            guards.push(self.slot(id).lock_owned().await);
        }
        MemberGuard { _guards: guards }
    }
}
