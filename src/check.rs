//! Heap walking and consistency checking.

use core::marker::PhantomData;

use crate::ALIGNMENT;
use crate::allocator::SegregatedAllocator;
use crate::block::{Block, MIN_BLOCK_SIZE, OVERHEAD, Tag};
use crate::error::{Corruption, HeapError, Result};
use crate::free_list::{next_free, prev_free};
use crate::provider::HeapProvider;
use crate::size_class::{NUM_CLASSES, class_of};

/// One block seen by a heap walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  /// Payload address.
  pub addr: usize,
  /// Whole block, header and footer included.
  pub size: usize,
  pub allocated: bool,
}

impl BlockInfo {
  pub fn payload_size(&self) -> usize {
    self.size - OVERHEAD
  }
}

/// Summary of a heap that passed [`SegregatedAllocator::check_heap`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
  pub heap_size: usize,
  pub allocated_blocks: usize,
  pub allocated_bytes: usize,
  pub free_blocks: usize,
  pub free_bytes: usize,
  pub largest_free: usize,
}

/// Iterator over the blocks between the prologue and the sentinel, in
/// address order.
pub struct HeapWalk<'a> {
  next: Option<Block>,
  _heap: PhantomData<&'a ()>,
}

impl Iterator for HeapWalk<'_> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<BlockInfo> {
    let block = self.next?;
    let size = block.size();
    if size == 0 {
      self.next = None;
      return None;
    }

    self.next = Some(block.next());
    Some(BlockInfo {
      addr: block.addr(),
      size,
      allocated: block.is_allocated(),
    })
  }
}

fn corrupt(
  block: Block,
  kind: Corruption,
) -> HeapError {
  HeapError::Corrupt {
    addr: block.addr(),
    kind,
  }
}

impl<P: HeapProvider> SegregatedAllocator<P> {
  /// Walks the heap. Empty before [`init`](SegregatedAllocator::init).
  pub fn blocks(&self) -> HeapWalk<'_> {
    HeapWalk {
      next: self.heap.as_ref().map(|heap| heap.prologue.next()),
      _heap: PhantomData,
    }
  }

  /// Verifies every block and every free-list entry.
  ///
  /// Block tags are bounds checked before they are followed, so a damaged
  /// heap is reported rather than walked off the end of.
  pub fn check_heap(&self) -> Result<HeapStats> {
    let heap = self.heap.as_ref().ok_or(HeapError::Uninitialized)?;
    let start = heap.start.as_ptr() as usize;
    let end = heap.end.as_ptr() as usize;

    let prologue = heap.prologue;
    if prologue.header() != Tag::new(OVERHEAD, true) || prologue.footer() != prologue.header() {
      return Err(corrupt(prologue, Corruption::BadPrologue));
    }

    let mut stats = HeapStats {
      heap_size: heap.size(),
      ..HeapStats::default()
    };

    let mut block = prologue.next();
    let mut prev_was_free = false;
    loop {
      let addr = block.addr();
      if addr > end {
        return Err(corrupt(block, Corruption::OutOfBounds));
      }

      let size = block.size();
      if size == 0 {
        if addr != end || !block.is_allocated() {
          return Err(corrupt(block, Corruption::BadSentinel));
        }
        break;
      }

      if addr % ALIGNMENT != 0 {
        return Err(corrupt(block, Corruption::Misaligned));
      }
      if size % ALIGNMENT != 0 || size < MIN_BLOCK_SIZE {
        return Err(corrupt(block, Corruption::BadSize(size)));
      }
      if size > end - addr {
        return Err(corrupt(block, Corruption::OutOfBounds));
      }
      if block.header() != block.footer() {
        return Err(corrupt(block, Corruption::TagMismatch));
      }

      if block.is_allocated() {
        stats.allocated_blocks += 1;
        stats.allocated_bytes += size;
        prev_was_free = false;
      } else {
        if prev_was_free {
          return Err(corrupt(block, Corruption::Uncoalesced));
        }
        stats.free_blocks += 1;
        stats.free_bytes += size;
        stats.largest_free = stats.largest_free.max(size);
        prev_was_free = true;
      }

      block = block.next();
    }

    let mut listed = 0;
    for class in 0..NUM_CLASSES {
      let mut prev: Option<Block> = None;
      let mut cursor = self.lists.head(class);

      while let Some(entry) = cursor {
        let addr = entry.addr();
        if addr <= start || addr >= end {
          return Err(corrupt(entry, Corruption::OutOfBounds));
        }
        if addr % ALIGNMENT != 0 {
          return Err(corrupt(entry, Corruption::Misaligned));
        }
        if entry.is_allocated() {
          return Err(corrupt(entry, Corruption::ListedAllocated));
        }
        if class_of(entry.size()) != class {
          return Err(corrupt(entry, Corruption::WrongClass(class)));
        }
        if prev_free(entry) != prev {
          return Err(corrupt(entry, Corruption::BrokenLink));
        }
        if prev.is_some_and(|prev| prev.size() > entry.size()) {
          return Err(corrupt(entry, Corruption::Unsorted));
        }

        listed += 1;
        if listed > stats.free_blocks {
          break;
        }
        prev = cursor;
        cursor = next_free(entry);
      }
    }

    if listed != stats.free_blocks {
      return Err(corrupt(
        prologue,
        Corruption::ListCount {
          listed,
          walked: stats.free_blocks,
        },
      ));
    }

    Ok(stats)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::block::PROLOGUE_REGION;
  use crate::extend::CHUNK_SIZE;
  use crate::provider::Arena;

  fn allocator() -> SegregatedAllocator<Arena> {
    let mut allocator = SegregatedAllocator::new(Arena::new(1 << 18));
    allocator.init().unwrap();
    allocator
  }

  #[test]
  fn test_uninitialized() {
    let allocator = SegregatedAllocator::new(Arena::new(64));
    assert_eq!(allocator.check_heap(), Err(HeapError::Uninitialized));
    assert_eq!(allocator.blocks().count(), 0);
  }

  #[test]
  fn test_walk_and_stats() {
    let mut allocator = allocator();
    let a = allocator.allocate(40);
    let b = allocator.allocate(100);
    let _c = allocator.allocate(8);
    unsafe { allocator.free(b) };

    let blocks: Vec<BlockInfo> = allocator.blocks().collect();
    assert_eq!(blocks.len(), 4);
    assert_eq!(blocks[0].addr, a as usize);
    assert_eq!(blocks[0].size, 56);
    assert_eq!(blocks[0].payload_size(), 40);
    assert!(!blocks[1].allocated);
    assert!(blocks[3].size > 0 && !blocks[3].allocated);

    let stats = allocator.check_heap().unwrap();
    assert_eq!(stats.heap_size, PROLOGUE_REGION + CHUNK_SIZE);
    assert_eq!(stats.allocated_blocks, 2);
    assert_eq!(stats.free_blocks, 2);
    assert_eq!(stats.allocated_bytes + stats.free_bytes, CHUNK_SIZE);
    assert_eq!(stats.largest_free, blocks[3].size);
  }

  #[test]
  fn test_detects_tag_mismatch() {
    let mut allocator = allocator();
    let ptr = allocator.allocate(64);

    let block = unsafe { Block::from_payload(core::ptr::NonNull::new(ptr).unwrap()) };
    let footer = unsafe { ptr.add(block.size() - OVERHEAD).cast::<usize>() };
    unsafe { footer.write(Tag::new(block.size(), false).bits()) };

    assert_eq!(
      allocator.check_heap(),
      Err(HeapError::Corrupt {
        addr: ptr as usize,
        kind: Corruption::TagMismatch,
      })
    );
  }

  #[test]
  fn test_detects_uncoalesced_neighbours() {
    let mut allocator = allocator();
    let a = allocator.allocate(64);
    let b = allocator.allocate(64);
    let _c = allocator.allocate(64);
    unsafe { allocator.free(a) };

    // Mark b free behind the allocator's back.
    let block = unsafe { Block::from_payload(core::ptr::NonNull::new(b).unwrap()) };
    block.write_tags(block.size(), false);

    assert_eq!(
      allocator.check_heap(),
      Err(HeapError::Corrupt {
        addr: b as usize,
        kind: Corruption::Uncoalesced,
      })
    );
  }

  #[test]
  fn test_detects_unlisted_free_block() {
    let mut allocator = allocator();
    let a = allocator.allocate(64);
    let _b = allocator.allocate(64);

    let block = unsafe { Block::from_payload(core::ptr::NonNull::new(a).unwrap()) };
    block.write_tags(block.size(), false);

    assert!(matches!(
      allocator.check_heap(),
      Err(HeapError::Corrupt {
        kind: Corruption::ListCount { listed: 1, walked: 2 },
        ..
      })
    ));
  }

  #[test]
  fn test_detects_listed_allocated_block() {
    let mut allocator = allocator();
    let a = allocator.allocate(64);
    let _b = allocator.allocate(64);
    unsafe { allocator.free(a) };

    let block = unsafe { Block::from_payload(core::ptr::NonNull::new(a).unwrap()) };
    block.write_tags(block.size(), true);

    assert_eq!(
      allocator.check_heap(),
      Err(HeapError::Corrupt {
        addr: a as usize,
        kind: Corruption::ListedAllocated,
      })
    );
  }
}
