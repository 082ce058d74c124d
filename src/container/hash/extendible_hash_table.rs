use std::hash::{BuildHasher, Hash};

use parking_lot::Mutex;

use crate::common::hash::DefaultHashBuilder;

/// A bounded bucket of key/value pairs with its own local depth.
#[derive(Debug)]
struct Bucket<K, V> {
    local_depth: usize,
    items: Vec<(K, V)>,
}

impl<K: Eq, V> Bucket<K, V> {
    fn new(local_depth: usize, capacity: usize) -> Self {
        Self {
            local_depth,
            items: Vec::with_capacity(capacity),
        }
    }

    fn find(&self, key: &K) -> Option<&V> {
        self.items.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn remove(&mut self, key: &K) -> bool {
        match self.items.iter().position(|(k, _)| k == key) {
            Some(pos) => {
                self.items.remove(pos);
                true
            }
            None => false,
        }
    }
}

/// Mutable table state, guarded by the table latch.
///
/// Buckets live in an arena and the directory stores arena indices, so the
/// 2^(global_depth - local_depth) directory slots that share a bucket all
/// hold the same index. A split overwrites the old arena slot with one of
/// the two successor buckets and pushes the other, so the arena never holds
/// orphans.
#[derive(Debug)]
struct TableState<K, V> {
    global_depth: usize,
    num_buckets: usize,
    dir: Vec<usize>,
    buckets: Vec<Bucket<K, V>>,
}

/// ExtendibleHashTable is an in-memory associative index that grows by
/// doubling its directory and splitting overfull buckets.
///
/// Every directory slot holds a bucket whose local depth is at most the
/// table's global depth; the low `local_depth` bits of a slot's index
/// identify its bucket. The buffer pool uses this table as its page table
/// (page id to frame id), with short critical sections, so a single mutex
/// over the whole table is sufficient.
pub struct ExtendibleHashTable<K, V, S = DefaultHashBuilder> {
    bucket_size: usize,
    hash_builder: S,
    state: Mutex<TableState<K, V>>,
}

impl<K, V> ExtendibleHashTable<K, V, DefaultHashBuilder>
where
    K: Hash + Eq,
    V: Clone,
{
    /// Creates a table with a single empty bucket and global depth 0.
    pub fn new(bucket_size: usize) -> Self {
        Self::with_hasher(bucket_size, DefaultHashBuilder::default())
    }
}

impl<K, V, S> ExtendibleHashTable<K, V, S>
where
    K: Hash + Eq,
    V: Clone,
    S: BuildHasher,
{
    /// Creates a table that hashes keys with the given hash builder.
    pub fn with_hasher(bucket_size: usize, hash_builder: S) -> Self {
        assert!(bucket_size > 0, "bucket_size must be positive");
        Self {
            bucket_size,
            hash_builder,
            state: Mutex::new(TableState {
                global_depth: 0,
                num_buckets: 1,
                dir: vec![0],
                buckets: vec![Bucket::new(0, bucket_size)],
            }),
        }
    }

    fn dir_index(&self, key: &K, global_depth: usize) -> usize {
        let mask = (1usize << global_depth) - 1;
        (self.hash_builder.hash_one(key) as usize) & mask
    }

    /// Returns the value stored under `key`, if any.
    pub fn find(&self, key: &K) -> Option<V> {
        let state = self.state.lock();
        let index = self.dir_index(key, state.global_depth);
        state.buckets[state.dir[index]].find(key).cloned()
    }

    /// Removes `key` from the table. Returns whether a removal occurred.
    pub fn remove(&self, key: &K) -> bool {
        let mut state = self.state.lock();
        let index = self.dir_index(key, state.global_depth);
        let bucket = state.dir[index];
        state.buckets[bucket].remove(key)
    }

    /// Inserts or overwrites the value under `key`, splitting buckets (and
    /// doubling the directory) until the target bucket has room.
    ///
    /// Each round of the loop grows either the global depth or the split
    /// bucket's local depth, so insertion terminates unless more than
    /// `bucket_size` distinct keys share an entire hash suffix.
    pub fn insert(&self, key: K, value: V) {
        let mut state = self.state.lock();
        loop {
            let index = self.dir_index(&key, state.global_depth);
            let target = state.dir[index];

            let bucket = &mut state.buckets[target];
            if let Some(slot) = bucket.items.iter_mut().find(|(k, _)| *k == key) {
                slot.1 = value;
                return;
            }
            if bucket.items.len() < self.bucket_size {
                bucket.items.push((key, value));
                return;
            }

            // The bucket is full: double the directory if the bucket already
            // uses every global bit. The upper half aliases the lower half,
            // slot i + old_len sharing slot i's bucket.
            if state.buckets[target].local_depth == state.global_depth {
                state.global_depth += 1;
                let old_len = state.dir.len();
                for i in 0..old_len {
                    let alias = state.dir[i];
                    state.dir.push(alias);
                }
            }

            // Split: one bucket becomes two, distinguished by the new depth
            // bit. The old arena slot is reused for the zero-bit half.
            let new_depth = state.buckets[target].local_depth + 1;
            let spilled = std::mem::take(&mut state.buckets[target].items);
            state.buckets[target] = Bucket::new(new_depth, self.bucket_size);
            let sibling = state.buckets.len();
            state.buckets.push(Bucket::new(new_depth, self.bucket_size));
            state.num_buckets += 1;

            let bit = 1usize << (new_depth - 1);
            for i in 0..state.dir.len() {
                if state.dir[i] == target && (i & bit) != 0 {
                    state.dir[i] = sibling;
                }
            }

            // Rehash the spilled entries. Each lands in one of the two
            // successors, so no fresh bucket can overflow here.
            for (k, v) in spilled {
                let slot = self.dir_index(&k, state.global_depth);
                let dest = state.dir[slot];
                state.buckets[dest].items.push((k, v));
            }
        }
    }

    /// Returns the number of global bits consulted when indexing the
    /// directory.
    pub fn global_depth(&self) -> usize {
        self.state.lock().global_depth
    }

    /// Returns the local depth of the bucket reachable through the given
    /// directory slot.
    pub fn local_depth(&self, dir_index: usize) -> usize {
        let state = self.state.lock();
        state.buckets[state.dir[dir_index]].local_depth
    }

    /// Returns the number of live buckets.
    pub fn num_buckets(&self) -> usize {
        self.state.lock().num_buckets
    }
}
