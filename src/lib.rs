//! # segalloc - A Segregated Free-List Memory Allocator
//!
//! This crate implements a general-purpose `malloc`-style allocator over a
//! single, contiguous, growable heap. Free memory is tracked explicitly with
//! boundary tags and segregated free lists; no host allocator is involved in
//! the bookkeeping.
//!
//! ## Overview
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌─────┬─────────┬─────────────┬──────────────┬─────────────┬───┐
//!   │ pad │ prologue│  block A    │   block B    │   block C   │ S │
//!   │     │ (alloc) │  (alloc)    │   (free)     │   (alloc)   │   │
//!   └─────┴─────────┴─────────────┴──────────────┴─────────────┴───┘
//!                                                                ▲
//!                                        zero-size sentinel ─────┘
//!
//!   Each block carries the same tag at both ends:
//!
//!   ┌────────┬──────────────────────────────┬────────┐
//!   │ size|a │           payload            │ size|a │
//!   └────────┴──────────────────────────────┴────────┘
//!    header   ▲ pointer returned to user      footer
//! ```
//!
//! The footer lets a block find its physical predecessor, so freeing merges
//! with both neighbours in constant time.
//!
//! Free blocks are kept in [`NUM_CLASSES`] doubly linked lists, one per
//! power-of-two size class, each sorted by size:
//!
//! ```text
//!   class 0  [32, 64)     ─► 40 ─► 48 ─► 56
//!   class 1  [64, 128)    ─► 72 ─► 120
//!   class 2  [128, 256)   ─► (empty)
//!   ...
//!   class 12 [128K, ∞)    ─► 262144
//! ```
//!
//! An allocation searches its own class and then every larger one, takes the
//! first block that fits, and splits off the rest when it is big enough to
//! be a block of its own. When nothing fits the heap grows by at least
//! [`CHUNK_SIZE`] bytes.
//!
//! ## Crate Structure
//!
//! ```text
//!   segalloc
//!   ├── align       - align! macro
//!   ├── block       - boundary tags and block handles (internal)
//!   ├── size_class  - size to free-list class (internal)
//!   ├── free_list   - segregated, size-ordered free lists (internal)
//!   ├── split       - carving allocations out of free blocks (internal)
//!   ├── coalesce    - merging freed blocks with neighbours (internal)
//!   ├── extend      - heap growth
//!   ├── provider    - HeapProvider, Sbrk, Arena
//!   ├── allocator   - SegregatedAllocator
//!   ├── check       - heap walk and consistency checker
//!   └── error       - HeapError, Corruption
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use segalloc::{Arena, SegregatedAllocator};
//!
//! let mut allocator = SegregatedAllocator::new(Arena::new(1 << 16));
//! allocator.init().unwrap();
//!
//! let ptr = allocator.allocate(100);
//! assert!(!ptr.is_null());
//!
//! unsafe {
//!     ptr.write_bytes(0xAB, 100);
//!
//!     let bigger = allocator.resize(ptr, 400);
//!     assert_eq!(*bigger.add(99), 0xAB);
//!
//!     allocator.free(bigger);
//! }
//!
//! let stats = allocator.check_heap().unwrap();
//! assert_eq!(stats.allocated_blocks, 0);
//! ```
//!
//! ## Heap Providers
//!
//! Memory comes from a [`HeapProvider`], which must grow one contiguous
//! range:
//!
//! - [`Sbrk`] moves the program break with `sbrk(2)` (unix only).
//! - [`Arena`] hands out a fixed-capacity buffer the same way.
//!
//! ## Features
//!
//! - `debug`: run [`SegregatedAllocator::check_heap`] after every allocate
//!   and free, panicking on the first inconsistency.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no synchronization; the allocator is neither
//!   `Send` nor `Sync`
//! - **No shrinking**: memory is never handed back to the provider
//! - **Unchecked sizes**: size arithmetic does not guard against overflow
//! - **Copying resize**: `resize` always moves the allocation
//!
//! ## Safety
//!
//! Allocation is safe. Freeing and resizing take raw pointers and are
//! `unsafe`: passing a pointer this allocator did not hand out, or freeing
//! twice, corrupts the heap.

pub mod align;
mod allocator;
mod block;
mod check;
mod coalesce;
mod error;
mod extend;
mod free_list;
mod provider;
mod size_class;
mod split;
#[cfg(test)]
mod testing;

/// Alignment of every payload and every block size.
pub const ALIGNMENT: usize = 8;

pub use allocator::SegregatedAllocator;
pub use block::{MIN_BLOCK_SIZE, OVERHEAD, WORD};
pub use check::{BlockInfo, HeapStats, HeapWalk};
pub use error::{Corruption, HeapError, Result};
pub use extend::CHUNK_SIZE;
#[cfg(unix)]
pub use provider::Sbrk;
pub use provider::{Arena, HeapProvider};
pub use size_class::NUM_CLASSES;
