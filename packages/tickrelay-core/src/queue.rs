use crate::task::{TaskHandle, TaskKey};
use crate::wrapper::{TaskWrapper, TickTime};
use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;
use std::collections::VecDeque;

const STALE_SLACK: usize = 16;

new_key_type! {
    pub(crate) struct WrapperId;
}

/// Subscribed tasks of one phase, in rotation order.
///
/// Wrappers live in a slot map and the order deque only holds keys. Removing a
/// wrapper therefore never disturbs an ongoing rotation: its key goes stale and
/// is discarded when the rotation reaches it.
#[derive(Default)]
pub(crate) struct PhaseQueue {
    wrappers: SlotMap<WrapperId, TaskWrapper>,
    order: VecDeque<WrapperId>,
    index: FxHashMap<TaskKey, WrapperId>,
}

impl PhaseQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the task is already subscribed.
    pub(crate) fn admit(&mut self, task: &TaskHandle, now: Option<TickTime>) -> bool {
        let key = TaskKey::of(task);
        if self.index.contains_key(&key) {
            return false;
        }
        let id = self.wrappers.insert(TaskWrapper::new(task, now));
        self.index.insert(key, id);
        self.order.push_back(id);
        true
    }

    pub(crate) fn remove_task(&mut self, task: &TaskHandle) -> bool {
        let Some(id) = self.index.get(&TaskKey::of(task)).copied() else {
            return false;
        };
        self.evict(id);
        if self.order.len() > 2 * self.wrappers.len() + STALE_SLACK {
            self.compact();
        }
        true
    }

    /// Drops the wrapper. Its key may linger in the order deque until visited.
    pub(crate) fn evict(&mut self, id: WrapperId) -> bool {
        match self.wrappers.remove(id) {
            Some(wrapper) => {
                self.index.remove(&wrapper.key());
                true
            }
            None => false,
        }
    }

    pub(crate) fn contains_task(&self, task: &TaskHandle) -> bool {
        self.index.contains_key(&TaskKey::of(task))
    }

    pub(crate) fn contains(&self, id: WrapperId) -> bool {
        self.wrappers.contains_key(id)
    }

    pub(crate) fn get(&self, id: WrapperId) -> Option<&TaskWrapper> {
        self.wrappers.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: WrapperId) -> Option<&mut TaskWrapper> {
        self.wrappers.get_mut(id)
    }

    pub(crate) fn pop_front(&mut self) -> Option<WrapperId> {
        self.order.pop_front()
    }

    /// Returns a wrapper to the head, so the next pump starts with it.
    pub(crate) fn push_front(&mut self, id: WrapperId) {
        if self.contains(id) {
            self.order.push_front(id);
        }
    }

    /// Puts a visited wrapper at the back. Returns `false` if it was removed meanwhile.
    pub(crate) fn requeue(&mut self, id: WrapperId) -> bool {
        if self.contains(id) {
            self.order.push_back(id);
            true
        } else {
            false
        }
    }

    /// Live keys in current order.
    pub(crate) fn snapshot(&self) -> SmallVec<[WrapperId; 16]> {
        self.order
            .iter()
            .copied()
            .filter(|&id| self.contains(id))
            .collect()
    }

    /// Forgets stale keys left behind by removals.
    pub(crate) fn compact(&mut self) {
        let wrappers = &self.wrappers;
        self.order.retain(|&id| wrappers.contains_key(id));
    }

    pub(crate) fn len(&self) -> usize {
        self.wrappers.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.wrappers.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.wrappers.clear();
        self.order.clear();
        self.index.clear();
    }
}
