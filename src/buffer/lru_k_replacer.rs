use std::collections::HashMap;

use parking_lot::Mutex;

use crate::common::{FrameId, Timestamp};

const NIL: usize = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Queue {
    /// Frames with fewer than K recorded accesses
    History,
    /// Frames with at least K recorded accesses
    Cache,
}

/// One tracked frame, linked into either the history or the cache queue.
#[derive(Debug)]
struct Node {
    frame_id: FrameId,
    access_count: Timestamp,
    evictable: bool,
    queue: Queue,
    prev: usize,
    next: usize,
}

#[derive(Debug, Clone, Copy)]
struct QueueEnds {
    head: usize,
    tail: usize,
}

impl QueueEnds {
    fn empty() -> Self {
        Self {
            head: NIL,
            tail: NIL,
        }
    }
}

/// Node arena plus the two intrusive queues threaded through it. Arena
/// indices stand in for list pointers, so nodes move between queues by
/// relinking rather than reallocating.
struct ReplacerState {
    nodes: Vec<Node>,
    free: Vec<usize>,
    index: HashMap<FrameId, usize>,
    history: QueueEnds,
    cache: QueueEnds,
    num_evictable: usize,
}

impl ReplacerState {
    fn alloc(&mut self, node: Node) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn ends_mut(&mut self, queue: Queue) -> &mut QueueEnds {
        match queue {
            Queue::History => &mut self.history,
            Queue::Cache => &mut self.cache,
        }
    }

    fn push_front(&mut self, queue: Queue, idx: usize) {
        let head = match queue {
            Queue::History => self.history.head,
            Queue::Cache => self.cache.head,
        };
        {
            let node = &mut self.nodes[idx];
            node.queue = queue;
            node.prev = NIL;
            node.next = head;
        }
        if head != NIL {
            self.nodes[head].prev = idx;
        }
        let ends = self.ends_mut(queue);
        ends.head = idx;
        if ends.tail == NIL {
            ends.tail = idx;
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next, queue) = {
            let node = &self.nodes[idx];
            (node.prev, node.next, node.queue)
        };
        if prev != NIL {
            self.nodes[prev].next = next;
        } else {
            self.ends_mut(queue).head = next;
        }
        if next != NIL {
            self.nodes[next].prev = prev;
        } else {
            self.ends_mut(queue).tail = prev;
        }
        let node = &mut self.nodes[idx];
        node.prev = NIL;
        node.next = NIL;
    }

    /// Drops a node entirely: queue link, frame index, and arena slot.
    fn discard(&mut self, idx: usize) {
        self.unlink(idx);
        let frame_id = self.nodes[idx].frame_id;
        self.index.remove(&frame_id);
        self.free.push(idx);
    }

    /// Walks a queue from its tail (the coldest end) and returns the first
    /// evictable node.
    fn coldest_evictable(&self, queue: Queue) -> Option<usize> {
        let mut cursor = match queue {
            Queue::History => self.history.tail,
            Queue::Cache => self.cache.tail,
        };
        while cursor != NIL {
            let node = &self.nodes[cursor];
            if node.evictable {
                return Some(cursor);
            }
            cursor = node.prev;
        }
        None
    }
}

/// LruKReplacer selects eviction victims by backward K-distance: the time
/// since a frame's K-th most recent access, with fewer than K accesses
/// counting as infinite distance.
///
/// Frames under K accesses sit in the history queue ordered by first
/// access; frames at or over K sit in the cache queue ordered by most
/// recent access. The victim is the tail-most evictable frame of the
/// history queue, falling back to the cache queue, which realizes
/// "largest K-distance, FIFO among the infinite-distance frames".
pub struct LruKReplacer {
    /// Maximum number of frames the replacer tracks
    num_frames: usize,
    /// K value for the LRU-K algorithm
    k: usize,
    state: Mutex<ReplacerState>,
}

impl LruKReplacer {
    /// Creates a replacer tracking frames `0..num_frames`.
    pub fn new(num_frames: usize, k: usize) -> Self {
        assert!(k > 0, "k must be positive");
        Self {
            num_frames,
            k,
            state: Mutex::new(ReplacerState {
                nodes: Vec::with_capacity(num_frames),
                free: Vec::new(),
                index: HashMap::with_capacity(num_frames),
                history: QueueEnds::empty(),
                cache: QueueEnds::empty(),
                num_evictable: 0,
            }),
        }
    }

    fn check_frame(&self, frame_id: FrameId) {
        assert!(
            frame_id.as_usize() < self.num_frames,
            "frame id out of range: {}",
            frame_id
        );
    }

    /// Accounts one access to the frame at the current logical tick.
    ///
    /// Panics if `frame_id` is out of range.
    pub fn record_access(&self, frame_id: FrameId) {
        self.check_frame(frame_id);
        let mut state = self.state.lock();

        let idx = match state.index.get(&frame_id).copied() {
            Some(idx) => idx,
            None => {
                let idx = state.alloc(Node {
                    frame_id,
                    access_count: 0,
                    evictable: false,
                    queue: Queue::History,
                    prev: NIL,
                    next: NIL,
                });
                state.index.insert(frame_id, idx);
                state.push_front(Queue::History, idx);
                idx
            }
        };

        state.nodes[idx].access_count += 1;
        let count = state.nodes[idx].access_count as usize;
        if count >= self.k {
            // K-th access promotes out of the history queue; later accesses
            // refresh the cache position.
            state.unlink(idx);
            state.push_front(Queue::Cache, idx);
        }
    }

    /// Toggles whether the frame is an eviction candidate, adjusting the
    /// replacer's size. Unknown frames are ignored.
    ///
    /// Panics if `frame_id` is out of range.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        self.check_frame(frame_id);
        let mut state = self.state.lock();

        if let Some(&idx) = state.index.get(&frame_id) {
            if state.nodes[idx].evictable != evictable {
                state.nodes[idx].evictable = evictable;
                if evictable {
                    state.num_evictable += 1;
                } else {
                    state.num_evictable -= 1;
                }
            }
        }
    }

    /// Removes and returns the frame with the largest backward K-distance,
    /// erasing its access history. Returns None if nothing is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();
        if state.num_evictable == 0 {
            return None;
        }

        let victim = state
            .coldest_evictable(Queue::History)
            .or_else(|| state.coldest_evictable(Queue::Cache))?;

        let frame_id = state.nodes[victim].frame_id;
        state.discard(victim);
        state.num_evictable -= 1;
        Some(frame_id)
    }

    /// Forcibly drops a frame's access history. Untracked frames are
    /// ignored.
    ///
    /// Panics if `frame_id` is out of range or the frame is tracked but not
    /// evictable.
    pub fn remove(&self, frame_id: FrameId) {
        self.check_frame(frame_id);
        let mut state = self.state.lock();

        if let Some(&idx) = state.index.get(&frame_id) {
            if !state.nodes[idx].evictable {
                panic!("cannot remove non-evictable frame {}", frame_id);
            }
            state.discard(idx);
            state.num_evictable -= 1;
        }
    }

    /// Returns the number of evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().num_evictable
    }

    /// Returns the K value of this replacer.
    pub fn k(&self) -> usize {
        self.k
    }
}
