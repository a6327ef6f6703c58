use core::ptr::{self, NonNull};

use crate::align;
use crate::block::{Block, MIN_BLOCK_SIZE, OVERHEAD, PROLOGUE_REGION, lay_prologue};
use crate::coalesce::coalesce;
use crate::error::Result;
use crate::extend::CHUNK_SIZE;
use crate::free_list::FreeLists;
use crate::provider::HeapProvider;
use crate::split::use_block;

/// Bounds of the managed region.
pub(crate) struct Heap {
  pub start: NonNull<u8>,
  pub prologue: Block,
  /// One past the sentinel header.
  pub end: NonNull<u8>,
}

impl Heap {
  pub fn size(&self) -> usize {
    self.end.as_ptr() as usize - self.start.as_ptr() as usize
  }
}

/// Segregated free-list allocator over a heap obtained from `P`.
///
/// Single threaded: every operation takes `&mut self` and the allocator is
/// neither `Send` nor `Sync`.
pub struct SegregatedAllocator<P: HeapProvider> {
  pub(crate) provider: P,
  pub(crate) lists: FreeLists,
  pub(crate) heap: Option<Heap>,
}

/// Block size needed to serve a request of `size` payload bytes.
const fn block_size_for(size: usize) -> usize {
  let size = align!(size) + OVERHEAD;
  if size < MIN_BLOCK_SIZE { MIN_BLOCK_SIZE } else { size }
}

impl<P: HeapProvider> SegregatedAllocator<P> {
  /// An allocator that has not claimed any memory yet. Call [`init`] first.
  ///
  /// [`init`]: SegregatedAllocator::init
  pub const fn new(provider: P) -> Self {
    Self {
      provider,
      lists: FreeLists::new(),
      heap: None,
    }
  }

  /// Lays out the prologue and sentinel and claims the first chunk.
  ///
  /// Calling it again starts a fresh heap after the current one; blocks of
  /// the previous heap must no longer be used.
  pub fn init(&mut self) -> Result<()> {
    self.lists.clear();
    self.heap = None;

    let start = self.provider.grow(PROLOGUE_REGION)?;
    debug_assert_eq!(start.as_ptr() as usize % crate::ALIGNMENT, 0);

    let prologue = unsafe { lay_prologue(start) };
    self.heap = Some(Heap {
      start,
      prologue,
      end: unsafe { NonNull::new_unchecked(start.as_ptr().add(PROLOGUE_REGION)) },
    });

    self.extend_heap(CHUNK_SIZE)?;
    log::debug!("heap initialized at {:p}", start);
    Ok(())
  }

  pub fn is_initialized(&self) -> bool {
    self.heap.is_some()
  }

  pub fn provider(&self) -> &P {
    &self.provider
  }

  /// Bytes claimed from the provider, prologue and sentinel included.
  pub fn heap_size(&self) -> usize {
    self.heap.as_ref().map_or(0, Heap::size)
  }

  /// Returns an 8-byte aligned pointer to at least `size` usable bytes, or
  /// null when `size` is zero or the provider cannot supply more memory.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    if size == 0 {
      return ptr::null_mut();
    }

    let block_size = block_size_for(size);

    let block = match self.lists.find_fit(block_size) {
      Some(block) => block,
      None => match self.extend_heap(block_size.max(CHUNK_SIZE)) {
        Ok(block) => block,
        Err(err) => {
          log::warn!("allocation of {} bytes failed: {}", size, err);
          return ptr::null_mut();
        }
      },
    };

    let block = use_block(&mut self.lists, block, block_size);
    log::trace!("allocate({}) -> {:#x} ({} byte block)", size, block.addr(), block.size());
    self.debug_check("allocate");
    block.as_ptr()
  }

  /// Like [`allocate`], with the first `size` bytes zeroed.
  ///
  /// [`allocate`]: SegregatedAllocator::allocate
  pub fn allocate_zeroed(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    let ptr = self.allocate(size);
    if !ptr.is_null() {
      unsafe { ptr::write_bytes(ptr, 0, size) };
    }
    ptr
  }

  /// Returns the block at `ptr` to the heap. Null is ignored.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a live pointer returned by this allocator.
  pub unsafe fn free(
    &mut self,
    ptr: *mut u8,
  ) {
    let Some(payload) = NonNull::new(ptr) else {
      return;
    };

    let block = unsafe { Block::from_payload(payload) };
    log::trace!("free({:#x}) ({} byte block)", block.addr(), block.size());
    block.write_tags(block.size(), false);
    coalesce(&mut self.lists, block);
    self.debug_check("free");
  }

  /// Moves the allocation at `ptr` into a fresh block of `size` bytes.
  ///
  /// A null `ptr` allocates; a zero `size` frees and returns null. Otherwise
  /// the first `min(size, old usable size)` bytes are copied over and the
  /// old block is freed. If no new block can be had, null is returned and
  /// `ptr` stays valid.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a live pointer returned by this allocator.
  pub unsafe fn resize(
    &mut self,
    ptr: *mut u8,
    size: usize,
  ) -> *mut u8 {
    if ptr.is_null() {
      return self.allocate(size);
    }
    if size == 0 {
      unsafe { self.free(ptr) };
      return ptr::null_mut();
    }

    let new = self.allocate(size);
    if new.is_null() {
      return new;
    }

    unsafe {
      let copy = self.usable_size(ptr).min(size);
      ptr::copy_nonoverlapping(ptr, new, copy);
      self.free(ptr);
    }
    new
  }

  /// Usable bytes behind `ptr`, which may exceed what was requested.
  ///
  /// # Safety
  ///
  /// `ptr` must be a live, non-null pointer returned by this allocator.
  pub unsafe fn usable_size(
    &self,
    ptr: *mut u8,
  ) -> usize {
    match NonNull::new(ptr) {
      Some(payload) => unsafe { Block::from_payload(payload) }.payload_size(),
      None => 0,
    }
  }

  #[cfg(feature = "debug")]
  fn debug_check(
    &self,
    operation: &str,
  ) {
    if let Err(err) = self.check_heap() {
      log::error!("heap check after {} failed: {}", operation, err);
      panic!("heap check after {operation} failed: {err}");
    }
  }

  #[cfg(not(feature = "debug"))]
  #[inline(always)]
  fn debug_check(
    &self,
    _operation: &str,
  ) {
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::block::WORD;
  use crate::provider::Arena;

  fn allocator() -> SegregatedAllocator<Arena> {
    let mut allocator = SegregatedAllocator::new(Arena::new(1 << 20));
    allocator.init().unwrap();
    allocator
  }

  #[test]
  fn test_block_size_for() {
    assert_eq!(block_size_for(1), MIN_BLOCK_SIZE);
    assert_eq!(block_size_for(2 * WORD), MIN_BLOCK_SIZE);
    assert_eq!(block_size_for(100), 104 + OVERHEAD);
    assert_eq!(block_size_for(4096), 4096 + OVERHEAD);
  }

  #[test]
  fn test_init() {
    let allocator = allocator();

    assert!(allocator.is_initialized());
    assert_eq!(allocator.heap_size(), PROLOGUE_REGION + CHUNK_SIZE);

    let stats = allocator.check_heap().unwrap();
    assert_eq!(stats.free_blocks, 1);
    assert_eq!(stats.free_bytes, CHUNK_SIZE);
    assert_eq!(stats.allocated_blocks, 0);
  }

  #[test]
  fn test_init_fails_without_room() {
    let mut allocator = SegregatedAllocator::new(Arena::new(16));
    assert!(allocator.init().is_err());
    assert!(!allocator.is_initialized());

    let mut allocator = SegregatedAllocator::new(Arena::new(PROLOGUE_REGION + 64));
    assert!(allocator.init().is_err());
  }

  #[test]
  fn test_allocate_before_init_is_null() {
    let mut allocator = SegregatedAllocator::new(Arena::new(1 << 16));
    assert!(allocator.allocate(16).is_null());
  }

  #[test]
  fn test_allocate_zero_is_null() {
    let mut allocator = allocator();
    let before = allocator.heap_size();

    assert!(allocator.allocate(0).is_null());
    assert_eq!(allocator.heap_size(), before);
    assert_eq!(allocator.check_heap().unwrap().allocated_blocks, 0);
  }

  #[test]
  fn test_allocate_is_aligned_and_sized() {
    let mut allocator = allocator();

    for size in [1, 7, 8, 9, 24, 100, 1000, 5000] {
      let ptr = allocator.allocate(size);
      assert!(!ptr.is_null());
      assert_eq!(ptr as usize % crate::ALIGNMENT, 0);
      assert!(unsafe { allocator.usable_size(ptr) } >= size);
    }
    allocator.check_heap().unwrap();
  }

  #[test]
  fn test_free_then_allocate_reuses_address() {
    let mut allocator = allocator();

    let first = allocator.allocate(72);
    unsafe { allocator.free(first) };
    let second = allocator.allocate(72);

    assert_eq!(first, second);
  }

  #[test]
  fn test_freed_space_is_reused() {
    let mut allocator = allocator();

    let first = allocator.allocate(100);
    let _second = allocator.allocate(200);
    let first_end = first as usize + unsafe { allocator.usable_size(first) };
    unsafe { allocator.free(first) };

    let heap_size = allocator.heap_size();
    let third = allocator.allocate(50);

    assert!(third as usize >= first as usize && (third as usize) < first_end);
    assert_eq!(allocator.heap_size(), heap_size);
  }

  #[test]
  fn test_free_null_is_noop() {
    let mut allocator = allocator();
    let before = allocator.check_heap().unwrap();

    unsafe { allocator.free(ptr::null_mut()) };

    assert_eq!(allocator.check_heap().unwrap(), before);
  }

  #[test]
  fn test_large_allocation_grows_heap() {
    let mut allocator = allocator();

    let ptr = allocator.allocate(3 * CHUNK_SIZE);

    assert!(!ptr.is_null());
    assert!(allocator.heap_size() >= PROLOGUE_REGION + 3 * CHUNK_SIZE);
    allocator.check_heap().unwrap();
  }

  #[test]
  fn test_exhaustion_returns_null() {
    let mut allocator = SegregatedAllocator::new(Arena::new(PROLOGUE_REGION + CHUNK_SIZE));
    allocator.init().unwrap();

    let ptr = allocator.allocate(CHUNK_SIZE);
    assert!(ptr.is_null());

    let fits = allocator.allocate(CHUNK_SIZE - OVERHEAD);
    assert!(!fits.is_null());
    assert!(allocator.allocate(1).is_null());
    allocator.check_heap().unwrap();
  }

  #[test]
  fn test_allocate_zeroed() {
    let mut allocator = allocator();

    let dirty = allocator.allocate(64);
    unsafe {
      ptr::write_bytes(dirty, 0xAB, 64);
      allocator.free(dirty);
    }

    let clean = allocator.allocate_zeroed(64);
    assert_eq!(clean, dirty);
    let bytes = unsafe { core::slice::from_raw_parts(clean, 64) };
    assert!(bytes.iter().all(|&b| b == 0));
  }

  #[test]
  fn test_resize_preserves_prefix() {
    let mut allocator = allocator();

    unsafe {
      let ptr = allocator.allocate(32);
      for i in 0..32 {
        ptr.add(i).write(i as u8);
      }

      let grown = allocator.resize(ptr, 200);
      assert!(!grown.is_null());
      for i in 0..32 {
        assert_eq!(grown.add(i).read(), i as u8);
      }

      let shrunk = allocator.resize(grown, 10);
      for i in 0..10 {
        assert_eq!(shrunk.add(i).read(), i as u8);
      }
      assert_eq!(allocator.check_heap().unwrap().allocated_blocks, 1);
    }
  }

  #[test]
  fn test_resize_null_and_zero() {
    let mut allocator = allocator();

    unsafe {
      let ptr = allocator.resize(ptr::null_mut(), 48);
      assert!(!ptr.is_null());
      assert!(allocator.usable_size(ptr) >= 48);

      assert!(allocator.resize(ptr, 0).is_null());
      let stats = allocator.check_heap().unwrap();
      assert_eq!(stats.allocated_blocks, 0);
      assert_eq!(stats.free_blocks, 1);

      assert!(allocator.resize(ptr::null_mut(), 0).is_null());
    }
  }

  #[test]
  fn test_failed_resize_keeps_old_block() {
    let mut allocator = SegregatedAllocator::new(Arena::new(PROLOGUE_REGION + CHUNK_SIZE));
    allocator.init().unwrap();

    unsafe {
      let ptr = allocator.allocate(16);
      ptr.write(0x5A);

      assert!(allocator.resize(ptr, 2 * CHUNK_SIZE).is_null());
      assert_eq!(ptr.read(), 0x5A);
      assert_eq!(allocator.check_heap().unwrap().allocated_blocks, 1);
    }
  }
}
