use core::ptr::NonNull;

use crate::align;
use crate::allocator::SegregatedAllocator;
use crate::block::{Block, Tag};
use crate::coalesce::coalesce;
use crate::error::{HeapError, Result};
use crate::provider::HeapProvider;

/// Minimum number of bytes requested from the provider when the heap grows.
pub const CHUNK_SIZE: usize = 1 << 12;

impl<P: HeapProvider> SegregatedAllocator<P> {
  /// Grows the heap by `bytes` (rounded up to the alignment unit) and returns
  /// the free block covering the new space, merged with a trailing free
  /// block if there was one.
  ///
  /// ```text
  ///   before:  ... │ last │ S │
  ///   after:   ... │ last │ new free block          │ S │
  ///                        ▲ old sentinel word is now its header
  /// ```
  ///
  /// Nothing is modified when the provider fails.
  pub(crate) fn extend_heap(
    &mut self,
    bytes: usize,
  ) -> Result<Block> {
    let heap = self.heap.as_mut().ok_or(HeapError::Uninitialized)?;
    let size = align!(bytes);

    let region = self.provider.grow(size)?;
    if region != heap.end {
      return Err(HeapError::Discontiguous);
    }

    // The new region starts right after the old sentinel header, so it is
    // already the payload address of the block that replaces the sentinel.
    let block = unsafe { Block::from_payload(region) };
    block.write_tags(size, false);
    block.next().write_header(Tag::SENTINEL);

    heap.end = unsafe { NonNull::new_unchecked(region.as_ptr().add(size)) };
    log::debug!("heap grown by {} bytes, now {} bytes", size, heap.size());

    Ok(coalesce(&mut self.lists, block))
  }
}
