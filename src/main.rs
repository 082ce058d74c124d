use std::sync::Arc;

use silt::buffer::BufferPoolManager;
use silt::common::INVALID_PAGE_ID;
use silt::index::{BTreeInternalPage, IntegerComparator};
use silt::storage::disk::DiskManager;

fn main() {
    println!("Silt - embedded storage-engine core");
    println!("===================================\n");

    let db_path = "demo.db";
    let disk_manager = Arc::new(DiskManager::new(db_path).expect("failed to create disk manager"));
    println!("Created disk manager for: {}", db_path);

    let bpm = Arc::new(BufferPoolManager::new(10, 2, disk_manager));
    println!("Created buffer pool with 10 frames (LRU-2)\n");

    // Allocate two leaf-level pages and a root that points at them.
    let left_id = bpm.new_page().expect("allocation failed").expect("pool full");
    let right_id = bpm.new_page().expect("allocation failed").expect("pool full");
    let root_id = bpm.new_page().expect("allocation failed").expect("pool full");
    println!("Allocated pages: root={}, left={}, right={}", root_id, left_id, right_id);

    {
        let mut guard = bpm
            .write_page(root_id)
            .expect("fetch failed")
            .expect("pool full");
        let mut root = BTreeInternalPage::new(guard.data_mut(), 4);
        root.init(root_id, INVALID_PAGE_ID, 8);
        root.populate_new_root(left_id, &25u32.to_le_bytes(), right_id);

        let cmp = IntegerComparator;
        println!(
            "Root lookup: key 7 -> {}, key 30 -> {}",
            root.lookup(&7u32.to_le_bytes(), &cmp),
            root.lookup(&30u32.to_le_bytes(), &cmp),
        );
    }

    for page_id in [left_id, right_id, root_id] {
        bpm.unpin_page(page_id, false);
    }
    bpm.flush_all_pages().expect("flush failed");
    println!("\nFlushed all pages");

    let guard = bpm.read_page(root_id).expect("fetch failed").expect("pool full");
    println!("Root page byte 0 after reload: {}", guard.data()[0]);
    drop(guard);

    println!("Free frames remaining: {}", bpm.free_frame_count());
}
