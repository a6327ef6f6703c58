//! Segregated, size-ordered free lists.
//!
//! The lists are intrusive: a free block's first payload word holds the
//! previous entry and its second word the next one.
//!
//! ```text
//!   heads[c] ─► ┌──────┐ next ┌──────┐ next ┌──────┐
//!               │  48  │ ───► │  56  │ ───► │  56  │ ───► null
//!      null ◄── └──────┘ ◄─── └──────┘ ◄─── └──────┘
//!               prev          prev          prev
//! ```
//!
//! Nothing outside this module reads or writes link words.

use core::ptr::{self, NonNull};

use crate::block::Block;
use crate::size_class::{NUM_CLASSES, class_of};

fn link_addr(
  block: Block,
  index: usize,
) -> *mut *mut u8 {
  unsafe { block.as_ptr().cast::<*mut u8>().add(index) }
}

fn read_link(
  block: Block,
  index: usize,
) -> Option<Block> {
  let raw = unsafe { link_addr(block, index).read() };
  NonNull::new(raw).map(|payload| unsafe { Block::from_payload(payload) })
}

fn write_link(
  block: Block,
  index: usize,
  link: Option<Block>,
) {
  let raw = link.map_or(ptr::null_mut(), Block::as_ptr);
  unsafe { link_addr(block, index).write(raw) }
}

const PREV: usize = 0;
const NEXT: usize = 1;

/// Previous entry in `block`'s list.
pub fn prev_free(block: Block) -> Option<Block> {
  read_link(block, PREV)
}

/// Next entry in `block`'s list.
pub fn next_free(block: Block) -> Option<Block> {
  read_link(block, NEXT)
}

/// One bucket head per size class.
pub struct FreeLists {
  heads: [Option<Block>; NUM_CLASSES],
}

impl FreeLists {
  pub const fn new() -> Self {
    Self {
      heads: [None; NUM_CLASSES],
    }
  }

  pub fn clear(&mut self) {
    self.heads = [None; NUM_CLASSES];
  }

  /// Splices `block` in front of the first entry of its class that is at
  /// least as large, keeping the bucket sorted by size.
  pub fn insert(
    &mut self,
    block: Block,
  ) {
    let size = block.size();
    let class = class_of(size);

    let mut prev = None;
    let mut next = self.heads[class];
    while let Some(entry) = next {
      if size <= entry.size() {
        break;
      }
      prev = next;
      next = next_free(entry);
    }

    write_link(block, PREV, prev);
    write_link(block, NEXT, next);

    match prev {
      Some(prev) => write_link(prev, NEXT, Some(block)),
      None => self.heads[class] = Some(block),
    }
    if let Some(next) = next {
      write_link(next, PREV, Some(block));
    }
  }

  /// Unlinks `block`. It must currently be in one of these lists, with the
  /// header it had when it was inserted.
  pub fn remove(
    &mut self,
    block: Block,
  ) {
    let prev = prev_free(block);
    let next = next_free(block);

    match prev {
      Some(prev) => write_link(prev, NEXT, next),
      None => self.heads[class_of(block.size())] = next,
    }
    if let Some(next) = next {
      write_link(next, PREV, prev);
    }
  }

  /// First block of at least `size` bytes, searching from `size`'s own class
  /// upwards. Within a bucket this is the smallest block that fits.
  pub fn find_fit(
    &self,
    size: usize,
  ) -> Option<Block> {
    self.heads[class_of(size)..]
      .iter()
      .find_map(|head| Self::walk(*head).find(|block| block.size() >= size))
  }

  /// First entry of a bucket.
  pub fn head(
    &self,
    class: usize,
  ) -> Option<Block> {
    self.heads[class]
  }

  /// Entries of one bucket, in list order.
  #[cfg(test)]
  pub fn iter(
    &self,
    class: usize,
  ) -> impl Iterator<Item = Block> {
    Self::walk(self.heads[class])
  }

  #[cfg(test)]
  pub fn is_empty(&self) -> bool {
    self.heads.iter().all(Option::is_none)
  }

  fn walk(head: Option<Block>) -> impl Iterator<Item = Block> {
    core::iter::successors(head, |block| next_free(*block))
  }
}

impl Default for FreeLists {
  fn default() -> Self {
    Self::new()
  }
}
