use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{
    FrameId, PageId, Result, SiltError, DEFAULT_BUCKET_SIZE, INVALID_PAGE_ID, PAGE_SIZE,
};
use crate::container::hash::ExtendibleHashTable;
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{Frame, LruKReplacer, ReadPageGuard, WritePageGuard};

/// State mutated only under the pool latch.
struct PoolState {
    /// Frames that cache no page
    free_list: VecDeque<FrameId>,
    /// Monotonic page id allocator
    next_page_id: u32,
}

/// BufferPoolManager caches disk pages in a fixed set of in-memory frames.
///
/// Frames are found through the page table (an extendible hash table from
/// page id to frame id); victims come from the free list first and the
/// LRU-K replacer second. A single coarse latch serializes every public
/// operation, including the disk I/O done on its behalf, so operations on
/// the same page id are linearized and a concurrent fetch of one id costs
/// exactly one disk read. The page-table and replacer locks only ever nest
/// inside the pool latch.
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool
    pool_size: usize,
    /// The frame array; indices are frame ids
    frames: Vec<Arc<Frame>>,
    /// Page table: maps resident page ids to frame ids
    page_table: ExtendibleHashTable<PageId, FrameId>,
    /// LRU-K replacer for eviction decisions
    replacer: LruKReplacer,
    /// Disk scheduler for page I/O
    disk_scheduler: DiskScheduler,
    /// The pool latch
    latch: Mutex<PoolState>,
}

impl BufferPoolManager {
    /// Creates a pool of `pool_size` frames over the given disk manager,
    /// using LRU-K replacement with the given `replacer_k`.
    pub fn new(pool_size: usize, replacer_k: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);
        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(Frame::new(frame_id)));
            free_list.push_back(frame_id);
        }

        let next_page_id = disk_manager.num_pages();

        Self {
            pool_size,
            frames,
            page_table: ExtendibleHashTable::new(DEFAULT_BUCKET_SIZE),
            replacer: LruKReplacer::new(pool_size, replacer_k),
            disk_scheduler: DiskScheduler::new(disk_manager),
            latch: Mutex::new(PoolState {
                free_list,
                next_page_id,
            }),
        }
    }

    /// Allocates a fresh page and pins it into a frame (pin count 1).
    /// The page image starts zeroed. Returns `Ok(None)` iff every frame is
    /// currently pinned.
    pub fn new_page(&self) -> Result<Option<PageId>> {
        let mut state = self.latch.lock();

        if self.all_pinned() {
            return Ok(None);
        }
        let frame_id = match self.acquire_frame(&mut state)? {
            Some(frame_id) => frame_id,
            None => return Ok(None),
        };

        let page_id = PageId::new(state.next_page_id);
        state.next_page_id += 1;

        let frame = &self.frames[frame_id.as_usize()];
        frame.set_page_id(page_id);
        frame.pin();

        self.replacer.record_access(frame_id);
        self.replacer.set_evictable(frame_id, false);
        self.page_table.insert(page_id, frame_id);

        Ok(Some(page_id))
    }

    /// Returns the pinned frame caching `page_id`, reading it from disk on
    /// a miss. Increments the pin count on a hit. Returns `Ok(None)` iff
    /// the page is absent and every frame is pinned.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Option<Arc<Frame>>> {
        if page_id == INVALID_PAGE_ID {
            return Err(SiltError::InvalidPageId(page_id));
        }

        let mut state = self.latch.lock();

        if let Some(frame_id) = self.page_table.find(&page_id) {
            let frame = &self.frames[frame_id.as_usize()];
            frame.pin();
            self.replacer.record_access(frame_id);
            self.replacer.set_evictable(frame_id, false);
            return Ok(Some(Arc::clone(frame)));
        }

        if self.all_pinned() {
            return Ok(None);
        }
        let frame_id = match self.acquire_frame(&mut state)? {
            Some(frame_id) => frame_id,
            None => return Ok(None),
        };

        let frame = &self.frames[frame_id.as_usize()];
        let mut image = [0u8; PAGE_SIZE];
        if let Err(e) = self.disk_scheduler.schedule_read_sync(page_id, &mut image) {
            state.free_list.push_back(frame_id);
            return Err(e);
        }

        frame.load(&image);
        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.pin();

        self.replacer.record_access(frame_id);
        self.replacer.set_evictable(frame_id, false);
        self.page_table.insert(page_id, frame_id);

        Ok(Some(Arc::clone(frame)))
    }

    /// Releases one pin on `page_id`, optionally marking it dirty.
    ///
    /// Returns false without modifying anything when the page is absent or
    /// its pin count is already zero. The dirty flag is only ever set here;
    /// another pinner may still be writing, so a clean unpin never clears
    /// it. A pin count reaching zero makes the frame evictable.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let _state = self.latch.lock();

        let frame_id = match self.page_table.find(&page_id) {
            Some(frame_id) => frame_id,
            None => return false,
        };
        let frame = &self.frames[frame_id.as_usize()];
        if frame.pin_count() == 0 {
            return false;
        }

        if is_dirty {
            frame.set_dirty(true);
        }
        if frame.unpin() == Some(0) {
            self.replacer.set_evictable(frame_id, true);
        }
        true
    }

    /// Writes `page_id` back to disk regardless of its dirty flag and
    /// clears the flag. Returns `Ok(false)` for `INVALID_PAGE_ID` or a
    /// non-resident page.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if page_id == INVALID_PAGE_ID {
            return Ok(false);
        }

        let _state = self.latch.lock();

        let frame_id = match self.page_table.find(&page_id) {
            Some(frame_id) => frame_id,
            None => return Ok(false),
        };
        let frame = &self.frames[frame_id.as_usize()];
        self.write_back(frame, page_id)?;
        Ok(true)
    }

    /// Writes every resident page back to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let _state = self.latch.lock();

        for frame in &self.frames {
            let page_id = frame.page_id();
            if page_id == INVALID_PAGE_ID {
                continue;
            }
            self.write_back(frame, page_id)?;
        }
        Ok(())
    }

    /// Drops `page_id` from the pool and deallocates it on disk.
    ///
    /// Returns `Ok(true)` when the page is absent or successfully deleted,
    /// `Ok(false)` when it is resident but pinned.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut state = self.latch.lock();

        let frame_id = match self.page_table.find(&page_id) {
            Some(frame_id) => frame_id,
            None => return Ok(true),
        };
        let frame = &self.frames[frame_id.as_usize()];
        if frame.pin_count() > 0 {
            return Ok(false);
        }

        self.page_table.remove(&page_id);
        self.replacer.remove(frame_id);
        frame.reset();
        state.free_list.push_back(frame_id);

        self.disk_scheduler.disk_manager().deallocate_page(page_id)?;
        Ok(true)
    }

    /// Fetches a page for shared access through an RAII guard that unpins
    /// on drop.
    pub fn read_page(&self, page_id: PageId) -> Result<Option<ReadPageGuard<'_>>> {
        let frame = match self.fetch_page(page_id)? {
            Some(frame) => frame,
            None => return Ok(None),
        };
        Ok(Some(ReadPageGuard::new(self, page_id, frame)))
    }

    /// Fetches a page for exclusive access through an RAII guard that
    /// unpins on drop, marking the page dirty iff it was written through
    /// the guard.
    pub fn write_page(&self, page_id: PageId) -> Result<Option<WritePageGuard<'_>>> {
        let frame = match self.fetch_page(page_id)? {
            Some(frame) => frame,
            None => return Ok(None),
        };
        Ok(Some(WritePageGuard::new(self, page_id, frame)))
    }

    /// Returns the pin count of a resident page, or None if absent.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let _state = self.latch.lock();
        self.page_table
            .find(&page_id)
            .map(|frame_id| self.frames[frame_id.as_usize()].pin_count())
    }

    /// Returns the pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Returns the number of frames caching no page.
    pub fn free_frame_count(&self) -> usize {
        self.latch.lock().free_list.len()
    }

    fn all_pinned(&self) -> bool {
        self.frames.iter().all(|frame| frame.pin_count() > 0)
    }

    /// Procures an empty frame: free list first, then the replacer. A dirty
    /// victim is written back before its frame is recycled; a write-back
    /// failure re-registers the victim with the replacer so the page is not
    /// lost.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<Option<FrameId>> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(Some(frame_id));
        }

        let frame_id = match self.replacer.evict() {
            Some(frame_id) => frame_id,
            None => return Ok(None),
        };
        let frame = &self.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();

        if frame.is_dirty() {
            let mut image = [0u8; PAGE_SIZE];
            frame.snapshot(&mut image);
            if let Err(e) = self.disk_scheduler.schedule_write_sync(old_page_id, &image) {
                self.replacer.record_access(frame_id);
                self.replacer.set_evictable(frame_id, true);
                return Err(e);
            }
        }

        self.page_table.remove(&old_page_id);
        frame.reset();
        Ok(Some(frame_id))
    }

    fn write_back(&self, frame: &Frame, page_id: PageId) -> Result<()> {
        let mut image = [0u8; PAGE_SIZE];
        frame.snapshot(&mut image);
        self.disk_scheduler.schedule_write_sync(page_id, &image)?;
        frame.set_dirty(false);
        Ok(())
    }
}
