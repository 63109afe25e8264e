//! Strict least-recently-used eviction: a `Mutex`-guarded order list plus a
//! membership set, victimizing from the LRU end.

use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;

use crate::buffer::replacer::Replacer;
use crate::common::config::FrameId;

struct State {
    /// LRU at the front, MRU at the back.
    order: VecDeque<FrameId>,
    present: HashSet<FrameId>,
}

pub struct LruReplacer {
    inner: Mutex<State>,
}

impl LruReplacer {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(State {
                order: VecDeque::new(),
                present: HashSet::new(),
            }),
        }
    }
}

impl Default for LruReplacer {
    fn default() -> Self {
        Self::new()
    }
}

impl Replacer for LruReplacer {
    fn victim(&self) -> Option<FrameId> {
        let mut state = self.inner.lock();
        let frame = state.order.pop_front()?;
        state.present.remove(&frame);
        Some(frame)
    }

    fn pin(&self, frame_id: FrameId) {
        let mut state = self.inner.lock();
        if state.present.remove(&frame_id) {
            state.order.retain(|&f| f != frame_id);
        }
    }

    fn unpin(&self, frame_id: FrameId) {
        let mut state = self.inner.lock();
        if state.present.insert(frame_id) {
            state.order.push_back(frame_id);
        } else {
            // Re-accessed while already evictable: bump it back to MRU.
            state.order.retain(|&f| f != frame_id);
            state.order.push_back(frame_id);
        }
    }

    fn size(&self) -> usize {
        self.inner.lock().present.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn victimizes_in_lru_order() {
        let replacer = LruReplacer::new();
        replacer.unpin(1);
        replacer.unpin(2);
        replacer.unpin(3);
        assert_eq!(replacer.size(), 3);
        assert_eq!(replacer.victim(), Some(1));
        assert_eq!(replacer.victim(), Some(2));
        assert_eq!(replacer.victim(), Some(3));
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn pin_removes_a_frame_from_eviction_candidacy() {
        let replacer = LruReplacer::new();
        replacer.unpin(1);
        replacer.unpin(2);
        replacer.pin(1);
        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.victim(), Some(2));
    }

    #[test]
    fn reaccess_moves_frame_to_the_back() {
        let replacer = LruReplacer::new();
        replacer.unpin(1);
        replacer.unpin(2);
        replacer.unpin(1);
        assert_eq!(replacer.victim(), Some(2));
        assert_eq!(replacer.victim(), Some(1));
    }
}
