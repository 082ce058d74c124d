use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, PAGE_SIZE};

use super::{BufferPoolManager, Frame};

type DataReadGuard = RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>>;
type DataWriteGuard = RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>>;

/// RAII guard for shared access to a pinned page. Dropping the guard
/// releases the pin.
pub struct ReadPageGuard<'a> {
    bpm: &'a BufferPoolManager,
    page_id: PageId,
    /// Keeps the frame alive for as long as the data guard borrows it
    frame: Arc<Frame>,
    data: Option<DataReadGuard>,
}

impl<'a> ReadPageGuard<'a> {
    pub(crate) fn new(bpm: &'a BufferPoolManager, page_id: PageId, frame: Arc<Frame>) -> Self {
        let data = frame.data.read();
        // SAFETY: the guard borrows the frame's data lock. The frame is kept
        // alive by the Arc stored alongside, and the data guard is dropped
        // before that Arc in Drop, so the 'static lifetime never outlives
        // the lock it refers to.
        let data: DataReadGuard = unsafe { std::mem::transmute(data) };
        Self {
            bpm,
            page_id,
            frame,
            data: Some(data),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the page image.
    pub fn data(&self) -> &[u8] {
        &self.data.as_ref().unwrap()[..]
    }

    /// Returns the pin count of the underlying frame.
    pub fn pin_count(&self) -> u32 {
        self.frame.pin_count()
    }
}

impl Deref for ReadPageGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for ReadPageGuard<'_> {
    fn drop(&mut self) {
        // Release the data lock before unpinning.
        self.data.take();
        self.bpm.unpin_page(self.page_id, false);
    }
}

/// RAII guard for exclusive access to a pinned page. Dropping the guard
/// releases the pin and marks the page dirty iff it was written through
/// `data_mut`.
pub struct WritePageGuard<'a> {
    bpm: &'a BufferPoolManager,
    page_id: PageId,
    frame: Arc<Frame>,
    data: Option<DataWriteGuard>,
    dirtied: bool,
}

impl<'a> WritePageGuard<'a> {
    pub(crate) fn new(bpm: &'a BufferPoolManager, page_id: PageId, frame: Arc<Frame>) -> Self {
        let data = frame.data.write();
        // SAFETY: as for ReadPageGuard; the frame Arc outlives the guard.
        let data: DataWriteGuard = unsafe { std::mem::transmute(data) };
        Self {
            bpm,
            page_id,
            frame,
            data: Some(data),
            dirtied: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data.as_ref().unwrap()[..]
    }

    /// Returns the page image mutably, marking the page dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.dirtied = true;
        &mut self.data.as_mut().unwrap()[..]
    }

    pub fn pin_count(&self) -> u32 {
        self.frame.pin_count()
    }
}

impl Deref for WritePageGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for WritePageGuard<'_> {
    fn drop(&mut self) {
        self.data.take();
        self.bpm.unpin_page(self.page_id, self.dirtied);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::disk::DiskManager;
    use tempfile::NamedTempFile;

    fn create_bpm(pool_size: usize) -> (BufferPoolManager, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let bpm = BufferPoolManager::new(pool_size, 2, dm);
        (bpm, temp_file)
    }

    #[test]
    fn test_guard_drop_unpins() {
        let (bpm, _temp) = create_bpm(4);
        let page_id = bpm.new_page().unwrap().unwrap();
        bpm.unpin_page(page_id, false);

        {
            let guard = bpm.read_page(page_id).unwrap().unwrap();
            assert_eq!(guard.page_id(), page_id);
            assert_eq!(bpm.get_pin_count(page_id), Some(1));
        }
        assert_eq!(bpm.get_pin_count(page_id), Some(0));
    }

    #[test]
    fn test_write_guard_marks_dirty_only_when_written() {
        let (bpm, _temp) = create_bpm(4);
        let page_id = bpm.new_page().unwrap().unwrap();
        bpm.unpin_page(page_id, false);

        {
            // No write: the page stays clean.
            let guard = bpm.write_page(page_id).unwrap().unwrap();
            assert_eq!(guard.data()[0], 0);
        }
        {
            let frame = bpm.fetch_page(page_id).unwrap().unwrap();
            assert!(!frame.is_dirty());
            bpm.unpin_page(page_id, false);
        }

        {
            let mut guard = bpm.write_page(page_id).unwrap().unwrap();
            guard.data_mut()[0] = 1;
        }
        let frame = bpm.fetch_page(page_id).unwrap().unwrap();
        assert!(frame.is_dirty());
        bpm.unpin_page(page_id, false);
    }
}
