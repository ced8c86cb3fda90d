//! Page replacement policies for the buffer pool.

use std::collections::{BTreeMap, HashMap};

use super::frame::FrameId;

/// Page replacement policy.
///
/// A replacer only sees frames whose pages nobody has pinned. The pool
/// reports every transition:
///
/// - `unpin(frame)` when a frame's pin count drops to 0
/// - `pin(frame)` when an unpinned frame is pinned again, or when the pool
///   drops its page without going through `evict`
///
/// A frame is never reported twice in a row in the same direction.
pub trait Replacer: Send + Sync {
    /// Makes a frame an eviction candidate.
    fn unpin(&mut self, frame_id: FrameId);

    /// Withdraws a frame from the candidates.
    fn pin(&mut self, frame_id: FrameId);

    /// Picks a victim and withdraws it, or `None` if there are no candidates.
    fn evict(&mut self) -> Option<FrameId>;

    /// Number of eviction candidates.
    fn size(&self) -> usize;
}

/// Least-recently-unpinned replacement.
///
/// Each unpin stamps the frame with an increasing counter; the victim is the
/// candidate with the oldest stamp. All operations are `O(log n)`.
pub struct LruReplacer {
    by_stamp: BTreeMap<u64, FrameId>,
    stamps: HashMap<FrameId, u64>,
    clock: u64,
}

impl LruReplacer {
    /// Creates an empty replacer sized for `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            by_stamp: BTreeMap::new(),
            stamps: HashMap::with_capacity(capacity),
            clock: 0,
        }
    }
}

impl Replacer for LruReplacer {
    fn unpin(&mut self, frame_id: FrameId) {
        let stamp = self.clock;
        self.clock += 1;
        let previous = self.stamps.insert(frame_id, stamp);
        debug_assert!(previous.is_none(), "frame {:?} unpinned twice", frame_id);
        if let Some(previous) = previous {
            self.by_stamp.remove(&previous);
        }
        self.by_stamp.insert(stamp, frame_id);
    }

    fn pin(&mut self, frame_id: FrameId) {
        let stamp = self.stamps.remove(&frame_id);
        debug_assert!(stamp.is_some(), "frame {:?} pinned but not a candidate", frame_id);
        if let Some(stamp) = stamp {
            self.by_stamp.remove(&stamp);
        }
    }

    fn evict(&mut self) -> Option<FrameId> {
        let (_, frame_id) = self.by_stamp.pop_first()?;
        self.stamps.remove(&frame_id);
        Some(frame_id)
    }

    fn size(&self) -> usize {
        self.by_stamp.len()
    }
}
