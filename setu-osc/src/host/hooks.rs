//! Change-hook bookkeeping for host object implementors

use super::{ChangeHook, HookId, HostError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-property lists of installed change hooks
#[derive(Default)]
pub struct HookSet {
    next_id: AtomicU64,
    hooks: Mutex<HashMap<String, Vec<(HookId, ChangeHook)>>>,
}

impl HookSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, property: &str, hook: ChangeHook) -> HookId {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.hooks
            .lock()
            .entry(property.to_string())
            .or_default()
            .push((id, hook));
        id
    }

    pub fn remove(&self, property: &str, id: HookId) -> Result<(), HostError> {
        let mut hooks = self.hooks.lock();
        let list = hooks.get_mut(property).ok_or(HostError::HookNotFound)?;
        let before = list.len();
        list.retain(|(hook_id, _)| *hook_id != id);
        if list.len() == before {
            return Err(HostError::HookNotFound);
        }
        if list.is_empty() {
            hooks.remove(property);
        }
        Ok(())
    }

    /// Invoke every hook installed for `property`
    ///
    /// Hooks run after the internal lock is released, so a hook may add or
    /// remove hooks on the same set.
    pub fn fire(&self, property: &str) {
        let snapshot: Vec<ChangeHook> = match self.hooks.lock().get(property) {
            Some(list) => list.iter().map(|(_, hook)| ChangeHook::clone(hook)).collect(),
            None => return,
        };
        for hook in snapshot {
            hook();
        }
    }

    /// Number of hooks installed for `property`
    pub fn count(&self, property: &str) -> usize {
        self.hooks.lock().get(property).map_or(0, Vec::len)
    }

    /// Number of hooks installed across all properties
    pub fn total(&self) -> usize {
        self.hooks.lock().values().map(Vec::len).sum()
    }

    pub fn clear(&self) {
        self.hooks.lock().clear();
    }
}
