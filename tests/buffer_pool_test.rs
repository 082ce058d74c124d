//! Integration tests for the buffer pool manager

use std::sync::Arc;
use std::thread;

use silt::buffer::BufferPoolManager;
use silt::common::PAGE_SIZE;
use silt::storage::disk::DiskManager;
use tempfile::NamedTempFile;

fn create_bpm(pool_size: usize, k: usize) -> (Arc<BufferPoolManager>, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    let bpm = Arc::new(BufferPoolManager::new(pool_size, k, dm));
    (bpm, temp_file)
}

#[test]
fn test_buffer_pool_basic_read_write() {
    let (bpm, _temp) = create_bpm(10, 2);

    let page_id = bpm.new_page().unwrap().unwrap();
    {
        let mut guard = bpm.write_page(page_id).unwrap().unwrap();
        guard.data_mut()[0] = 0xDE;
        guard.data_mut()[1] = 0xAD;
        guard.data_mut()[2] = 0xBE;
        guard.data_mut()[3] = 0xEF;
    }
    bpm.unpin_page(page_id, false);

    {
        let guard = bpm.read_page(page_id).unwrap().unwrap();
        assert_eq!(&guard.data()[0..4], &[0xDE, 0xAD, 0xBE, 0xEF]);
    }
}

#[test]
fn test_buffer_pool_evicts_oldest_single_access() {
    // Pool of three with K=2: three pages each touched once, then a fourth
    // allocation evicts the first-touched page.
    let (bpm, _temp) = create_bpm(3, 2);

    let p0 = bpm.new_page().unwrap().unwrap();
    let p1 = bpm.new_page().unwrap().unwrap();
    let p2 = bpm.new_page().unwrap().unwrap();
    for p in [p0, p1, p2] {
        assert!(bpm.unpin_page(p, false));
    }

    let p3 = bpm.new_page().unwrap().unwrap();

    assert_eq!(bpm.get_pin_count(p0), None);
    assert_eq!(bpm.get_pin_count(p1), Some(0));
    assert_eq!(bpm.get_pin_count(p2), Some(0));
    assert_eq!(bpm.get_pin_count(p3), Some(1));
}

#[test]
fn test_buffer_pool_lru_k_tie_break() {
    // Access sequence A,B,C,D,A,B: A and B graduate to two accesses, C and
    // D keep infinite k-distance. The next eviction takes C, the earliest
    // accessed of the two.
    let (bpm, _temp) = create_bpm(4, 2);

    let a = bpm.new_page().unwrap().unwrap();
    let b = bpm.new_page().unwrap().unwrap();
    let c = bpm.new_page().unwrap().unwrap();
    let d = bpm.new_page().unwrap().unwrap();
    for p in [a, b, c, d] {
        bpm.unpin_page(p, false);
    }

    for p in [a, b] {
        bpm.fetch_page(p).unwrap().unwrap();
        bpm.unpin_page(p, false);
    }

    let _e = bpm.new_page().unwrap().unwrap();

    assert_eq!(bpm.get_pin_count(c), None);
    assert_eq!(bpm.get_pin_count(d), Some(0));
    assert_eq!(bpm.get_pin_count(a), Some(0));
    assert_eq!(bpm.get_pin_count(b), Some(0));
}

#[test]
fn test_buffer_pool_dirty_page_survives_eviction() {
    let (bpm, _temp) = create_bpm(3, 2);

    let page_id = bpm.new_page().unwrap().unwrap();
    {
        let mut guard = bpm.write_page(page_id).unwrap().unwrap();
        guard.data_mut().fill(0xAB);
    }
    bpm.unpin_page(page_id, false);

    // Force the dirty page out. Each churn page is touched twice so it
    // outranks the dirty page, whose second access is the oldest.
    for _ in 0..3 {
        let p = bpm.new_page().unwrap().unwrap();
        {
            let mut guard = bpm.write_page(p).unwrap().unwrap();
            guard.data_mut()[0] = 1;
        }
        bpm.unpin_page(p, false);
    }
    assert_eq!(bpm.get_pin_count(page_id), None);

    let guard = bpm.read_page(page_id).unwrap().unwrap();
    assert!(guard.data().iter().all(|&b| b == 0xAB));
}

#[test]
fn test_buffer_pool_unpin_underflow() {
    let (bpm, _temp) = create_bpm(4, 2);

    let page_id = bpm.new_page().unwrap().unwrap();
    assert!(bpm.unpin_page(page_id, false));

    // Pin count is already zero: the call reports failure and changes
    // nothing.
    assert!(!bpm.unpin_page(page_id, true));
    assert_eq!(bpm.get_pin_count(page_id), Some(0));

    let frame = bpm.fetch_page(page_id).unwrap().unwrap();
    assert!(!frame.is_dirty());
    bpm.unpin_page(page_id, false);
}

#[test]
fn test_buffer_pool_delete_pinned_refusal() {
    let (bpm, _temp) = create_bpm(4, 2);

    let page_id = bpm.new_page().unwrap().unwrap();
    bpm.unpin_page(page_id, false);

    bpm.fetch_page(page_id).unwrap().unwrap();
    assert!(!bpm.delete_page(page_id).unwrap());

    bpm.unpin_page(page_id, false);
    assert!(bpm.delete_page(page_id).unwrap());
    assert_eq!(bpm.get_pin_count(page_id), None);
}

#[test]
fn test_buffer_pool_all_pinned_fails() {
    let (bpm, _temp) = create_bpm(2, 2);

    let _p0 = bpm.new_page().unwrap().unwrap();
    let _p1 = bpm.new_page().unwrap().unwrap();

    assert!(bpm.new_page().unwrap().is_none());
    assert!(bpm
        .fetch_page(silt::PageId::new(1000))
        .unwrap()
        .is_none());
}

#[test]
fn test_buffer_pool_flush_then_reopen() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let page_id;
    let payload = b"buffer pool persistence";
    {
        let dm = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(10, 2, dm));

        page_id = bpm.new_page().unwrap().unwrap();
        {
            let mut guard = bpm.write_page(page_id).unwrap().unwrap();
            guard.data_mut()[..payload.len()].copy_from_slice(payload);
        }
        bpm.unpin_page(page_id, false);
        bpm.flush_all_pages().unwrap();
    }

    let dm = Arc::new(DiskManager::new(&path).unwrap());
    let bpm = Arc::new(BufferPoolManager::new(10, 2, dm));
    let guard = bpm.read_page(page_id).unwrap().unwrap();
    assert_eq!(&guard.data()[..payload.len()], payload);
}

#[test]
fn test_buffer_pool_allocator_resumes_after_reopen() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let first;
    {
        let dm = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = BufferPoolManager::new(4, 2, dm);
        first = bpm.new_page().unwrap().unwrap();
        bpm.unpin_page(first, false);
        bpm.flush_all_pages().unwrap();
    }

    let dm = Arc::new(DiskManager::new(&path).unwrap());
    let bpm = BufferPoolManager::new(4, 2, dm);
    let next = bpm.new_page().unwrap().unwrap();
    assert!(next > first, "fresh ids must not collide with existing pages");
}

#[test]
fn test_buffer_pool_single_read_for_concurrent_fetches() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    let bpm = Arc::new(BufferPoolManager::new(2, 2, Arc::clone(&dm)));

    let page_id = bpm.new_page().unwrap().unwrap();
    {
        let mut guard = bpm.write_page(page_id).unwrap().unwrap();
        guard.data_mut()[0] = 9;
    }
    bpm.unpin_page(page_id, false);

    // Promote a churn page past the target in the cache queue, then
    // allocate once more so the target is the eviction victim.
    let churn = bpm.new_page().unwrap().unwrap();
    bpm.fetch_page(churn).unwrap().unwrap();
    bpm.unpin_page(churn, false);
    bpm.unpin_page(churn, false);
    let churn2 = bpm.new_page().unwrap().unwrap();
    bpm.unpin_page(churn2, false);
    assert_eq!(bpm.get_pin_count(page_id), None);

    let reads_before = dm.get_num_reads();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let bpm = Arc::clone(&bpm);
            thread::spawn(move || {
                let frame = bpm.fetch_page(page_id).unwrap().unwrap();
                assert_eq!(frame.read_data()[0], 9);
                bpm.unpin_page(page_id, false);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(dm.get_num_reads(), reads_before + 1);
}

#[test]
fn test_buffer_pool_concurrent_traffic() {
    let (bpm, _temp) = create_bpm(8, 2);

    // Seed a working set larger than the pool.
    let pages: Vec<_> = (0..16)
        .map(|i| {
            let p = bpm.new_page().unwrap().unwrap();
            {
                let mut guard = bpm.write_page(p).unwrap().unwrap();
                guard.data_mut()[0] = i as u8;
            }
            bpm.unpin_page(p, false);
            p
        })
        .collect();

    let pages = Arc::new(pages);
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let bpm = Arc::clone(&bpm);
            let pages = Arc::clone(&pages);
            thread::spawn(move || {
                for round in 0..50 {
                    let idx = (t * 7 + round * 3) % pages.len();
                    let page_id = pages[idx];
                    if let Some(guard) = bpm.read_page(page_id).unwrap() {
                        assert_eq!(guard.data()[0], idx as u8);
                        assert!(guard.data().len() == PAGE_SIZE);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}
