use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::RwLock;

use crate::common::{FrameId, PageId, INVALID_PAGE_ID, PAGE_SIZE};

/// Frame is a reusable slot in the buffer pool that caches exactly one page
/// at a time.
///
/// The pool latch serializes every metadata mutation; the data buffer has
/// its own read/write lock so that pin holders can coordinate access to the
/// page image without involving the pool.
pub struct Frame {
    /// Index of this frame in the pool (fixed for the frame's lifetime)
    frame_id: FrameId,
    /// The page currently cached here (INVALID_PAGE_ID if none)
    page_id: RwLock<PageId>,
    /// Number of outstanding users of the cached page
    pin_count: AtomicU32,
    /// Whether the in-memory image has diverged from disk
    is_dirty: AtomicBool,
    /// The page image
    pub(crate) data: RwLock<Box<[u8; PAGE_SIZE]>>,
}

impl Frame {
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page_id: RwLock::new(INVALID_PAGE_ID),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
            data: RwLock::new(Box::new([0u8; PAGE_SIZE])),
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn page_id(&self) -> PageId {
        *self.page_id.read()
    }

    pub fn set_page_id(&self, page_id: PageId) {
        *self.page_id.write() = page_id;
    }

    /// Whether this frame currently caches a page.
    pub fn is_resident(&self) -> bool {
        self.page_id() != INVALID_PAGE_ID
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Increments the pin count and returns the new value.
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrements the pin count and returns the new value, or None if the
    /// count was already zero.
    pub fn unpin(&self) -> Option<u32> {
        loop {
            let current = self.pin_count.load(Ordering::Acquire);
            if current == 0 {
                return None;
            }
            if self
                .pin_count
                .compare_exchange(current, current - 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Some(current - 1);
            }
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.is_dirty.store(dirty, Ordering::Release);
    }

    /// Returns a read guard over the page image.
    pub fn read_data(&self) -> parking_lot::RwLockReadGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.data.read()
    }

    /// Returns a write guard over the page image. The caller is responsible
    /// for marking the frame dirty.
    pub fn write_data(&self) -> parking_lot::RwLockWriteGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.data.write()
    }

    /// Overwrites the page image from a disk-sized buffer.
    pub fn load(&self, image: &[u8]) {
        assert_eq!(image.len(), PAGE_SIZE);
        self.data.write().copy_from_slice(image);
    }

    /// Copies the page image into a disk-sized buffer.
    pub fn snapshot(&self, out: &mut [u8]) {
        assert_eq!(out.len(), PAGE_SIZE);
        out.copy_from_slice(&**self.data.read());
    }

    /// Clears metadata and zeroes the page image, returning the frame to
    /// its freshly-constructed state.
    pub fn reset(&self) {
        *self.page_id.write() = INVALID_PAGE_ID;
        self.pin_count.store(0, Ordering::Release);
        self.is_dirty.store(false, Ordering::Release);
        self.data.write().fill(0);
    }
}
