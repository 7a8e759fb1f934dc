//! Page replacement policies.
//!
//! A policy picks the victim frame when a page fault finds no free frame.
//! FIFO evicts the frame that has held its page the longest; LRU evicts the
//! frame whose page was touched least recently. Ties break toward the lowest
//! frame index, which a strict `<` scan over the pool gives for free.

use crate::config::PolicyKind;

use super::Frame;

/// Victim selection strategy consulted once per page fault.
pub trait ReplacementPolicy: Send + Sync {
    /// Returns the index of the frame to evict.
    ///
    /// Only called when every frame is occupied; the pool is never empty.
    fn select_victim(&self, frames: &[Frame]) -> usize;
}

/// Evicts the frame with the smallest `allocated_tick`.
pub struct FifoPolicy;

impl ReplacementPolicy for FifoPolicy {
    fn select_victim(&self, frames: &[Frame]) -> usize {
        oldest_by(frames, |frame| frame.allocated_tick)
    }
}

/// Evicts the frame with the smallest `last_accessed_tick`.
pub struct LruPolicy;

impl ReplacementPolicy for LruPolicy {
    fn select_victim(&self, frames: &[Frame]) -> usize {
        oldest_by(frames, |frame| frame.last_accessed_tick)
    }
}

/// Builds the policy object named by the configuration.
pub fn from_kind(kind: PolicyKind) -> Box<dyn ReplacementPolicy> {
    match kind {
        PolicyKind::Fifo => Box::new(FifoPolicy),
        PolicyKind::Lru => Box::new(LruPolicy),
    }
}

fn oldest_by(frames: &[Frame], key: impl Fn(&Frame) -> u64) -> usize {
    let mut victim = 0;
    let mut min_tick = u64::MAX;
    for (index, frame) in frames.iter().enumerate() {
        if key(frame) < min_tick {
            min_tick = key(frame);
            victim = index;
        }
    }
    victim
}
