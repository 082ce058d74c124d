//! Silt - the storage-engine core of an embedded relational database
//!
//! This crate provides the memory and index substrate that query operators
//! sit on: a buffer pool that caches fixed-size disk pages, the LRU-K
//! policy that picks eviction victims, the extendible hash directory that
//! locates cached frames, and the B+-tree internal-node page format used by
//! secondary indexes.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): page-granular disk I/O
//!   - `DiskManager`: reads and writes pages against the database file
//!   - `DiskScheduler`: background worker thread that serializes page I/O
//!
//! - **Buffer Pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: pins pages into frames, evicting as needed
//!   - `LruKReplacer`: LRU-K replacement policy over evictable frames
//!   - `Frame`: per-frame metadata and the cached page image
//!   - `ReadPageGuard`/`WritePageGuard`: RAII pins over page data
//!
//! - **Containers** (`container`): in-memory indexes
//!   - `ExtendibleHashTable`: directory-doubling hash table, also the
//!     buffer pool's page table
//!
//! - **Index** (`index`): on-page B+-tree structures
//!   - `BTreeInternalPage`: slotted internal-node layout with
//!     comparator-driven lookup and sibling redistribution
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use silt::buffer::BufferPoolManager;
//! use silt::storage::disk::DiskManager;
//!
//! // Create a disk manager for a database file
//! let disk_manager = Arc::new(DiskManager::new("test.db").unwrap());
//!
//! // Create a buffer pool with 100 frames and LRU-2 replacement
//! let bpm = Arc::new(BufferPoolManager::new(100, 2, disk_manager));
//!
//! // Allocate a new page (returned pinned)
//! let page_id = bpm.new_page().unwrap().unwrap();
//!
//! // Write data to the page through an RAII guard
//! {
//!     let mut guard = bpm.write_page(page_id).unwrap().unwrap();
//!     guard.data_mut()[0] = 42;
//! }
//!
//! // Release the creation pin and persist the page
//! bpm.unpin_page(page_id, false);
//! bpm.flush_page(page_id).unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod container;
pub mod index;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{FrameId, PageId, Result, SiltError};
