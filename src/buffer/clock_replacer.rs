//! Second-chance (CLOCK) eviction: a ring of evictable frames, each with a
//! reference bit, and a hand that sweeps the ring clearing bits until it
//! finds one already clear.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::buffer::replacer::Replacer;
use crate::common::config::FrameId;

struct State {
    ring: Vec<FrameId>,
    reference: HashMap<FrameId, bool>,
    hand: usize,
}

pub struct ClockReplacer {
    inner: Mutex<State>,
}

impl ClockReplacer {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(State {
                ring: Vec::new(),
                reference: HashMap::new(),
                hand: 0,
            }),
        }
    }
}

impl Default for ClockReplacer {
    fn default() -> Self {
        Self::new()
    }
}

impl Replacer for ClockReplacer {
    fn victim(&self) -> Option<FrameId> {
        let mut state = self.inner.lock();
        if state.ring.is_empty() {
            return None;
        }
        loop {
            if state.hand >= state.ring.len() {
                state.hand = 0;
            }
            let frame = state.ring[state.hand];
            let bit = state
                .reference
                .get_mut(&frame)
                .expect("ring/reference map out of sync");
            if *bit {
                *bit = false;
                state.hand = (state.hand + 1) % state.ring.len();
            } else {
                state.ring.remove(state.hand);
                state.reference.remove(&frame);
                if !state.ring.is_empty() {
                    state.hand %= state.ring.len();
                } else {
                    state.hand = 0;
                }
                return Some(frame);
            }
        }
    }

    fn pin(&self, frame_id: FrameId) {
        let mut state = self.inner.lock();
        if let Some(pos) = state.ring.iter().position(|&f| f == frame_id) {
            state.ring.remove(pos);
            state.reference.remove(&frame_id);
            if !state.ring.is_empty() {
                state.hand %= state.ring.len();
            } else {
                state.hand = 0;
            }
        }
    }

    fn unpin(&self, frame_id: FrameId) {
        let mut state = self.inner.lock();
        if state.reference.contains_key(&frame_id) {
            // Already evictable and referenced again: give it a second
            // chance on the next sweep.
            state.reference.insert(frame_id, true);
        } else {
            state.reference.insert(frame_id, false);
            state.ring.push(frame_id);
        }
    }

    fn size(&self) -> usize {
        self.inner.lock().ring.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gives_a_second_chance_before_evicting() {
        let replacer = ClockReplacer::new();
        replacer.unpin(1);
        replacer.unpin(2);
        // Re-reference frame 1: its bit is set again, so the first sweep
        // should skip it and evict frame 2 first.
        replacer.unpin(1);
        assert_eq!(replacer.victim(), Some(2));
        assert_eq!(replacer.victim(), Some(1));
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn pin_removes_a_frame_from_the_ring() {
        let replacer = ClockReplacer::new();
        replacer.unpin(1);
        replacer.unpin(2);
        replacer.pin(1);
        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.victim(), Some(2));
    }
}
