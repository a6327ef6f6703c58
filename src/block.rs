//! Boundary-tag layout of a single block.
//!
//! ```text
//!   header              payload                          footer
//!   ┌────────┬──────────────────────────────────────────┬────────┐
//!   │ size|a │  user data  (free: prev link, next link) │ size|a │
//!   └────────┴──────────────────────────────────────────┴────────┘
//!            ▲                                                   ▲
//!            └── Block handle points here                        └── next block's payload - WORD
//! ```
//!
//! This is the only module that reads or writes tag words.

use core::{mem, ptr::NonNull};

use crate::{ALIGNMENT, align};

/// Size of a header, footer, or free-list link.
pub const WORD: usize = mem::size_of::<usize>();

/// Header plus footer.
pub const OVERHEAD: usize = 2 * WORD;

/// Smallest block that can sit in a free list: header, footer and two links.
pub const MIN_BLOCK_SIZE: usize = align!(OVERHEAD + 2 * WORD);

const ALLOCATED: usize = 0x1;
const SIZE_MASK: usize = !(ALIGNMENT - 1);

/// A packed `size | allocated` boundary tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag(usize);

impl Tag {
  /// Tag of the zero-size block that terminates the heap.
  pub const SENTINEL: Tag = Tag::new(0, true);

  pub const fn new(
    size: usize,
    allocated: bool,
  ) -> Self {
    debug_assert!(size % ALIGNMENT == 0);
    Self(size | allocated as usize)
  }

  pub const fn size(self) -> usize {
    self.0 & SIZE_MASK
  }

  pub const fn is_allocated(self) -> bool {
    self.0 & ALLOCATED != 0
  }

  pub const fn bits(self) -> usize {
    self.0
  }
}

/// Handle to a block, identified by its payload address.
///
/// Creating a handle is the unsafe step: the caller vouches that the address
/// is the payload of a block inside a heap whose tags are consistent (or are
/// about to be written through this handle). Once created, every accessor
/// only follows tags that the heap invariants guarantee to be in bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
  payload: NonNull<u8>,
}

impl Block {
  /// # Safety
  ///
  /// `payload` must be the payload address of a block in a live heap
  /// managed by this crate, with a readable header word before it.
  pub const unsafe fn from_payload(payload: NonNull<u8>) -> Self {
    Self { payload }
  }

  pub const fn as_ptr(self) -> *mut u8 {
    self.payload.as_ptr()
  }

  pub fn addr(self) -> usize {
    self.payload.as_ptr() as usize
  }

  fn word_at(
    self,
    offset: isize,
  ) -> *mut usize {
    // Every offset used here stays within the block or its direct neighbour's tag.
    unsafe { self.payload.as_ptr().offset(offset).cast::<usize>() }
  }

  fn header_addr(self) -> *mut usize {
    self.word_at(-(WORD as isize))
  }

  fn footer_addr(
    self,
    size: usize,
  ) -> *mut usize {
    self.word_at(size as isize - OVERHEAD as isize)
  }

  pub fn header(self) -> Tag {
    Tag(unsafe { self.header_addr().read() })
  }

  /// Footer as located by the size stored in the header.
  pub fn footer(self) -> Tag {
    Tag(unsafe { self.footer_addr(self.size()).read() })
  }

  pub fn size(self) -> usize {
    self.header().size()
  }

  pub fn is_allocated(self) -> bool {
    self.header().is_allocated()
  }

  /// Bytes the application may use.
  pub fn payload_size(self) -> usize {
    self.size().saturating_sub(OVERHEAD)
  }

  /// Writes the header, then the footer at the position implied by `size`.
  pub fn write_tags(
    self,
    size: usize,
    allocated: bool,
  ) {
    let tag = Tag::new(size, allocated);
    unsafe {
      self.header_addr().write(tag.bits());
      self.footer_addr(size).write(tag.bits());
    }
  }

  /// Writes the header only. Used for the sentinel, which has no footer.
  pub fn write_header(
    self,
    tag: Tag,
  ) {
    unsafe { self.header_addr().write(tag.bits()) }
  }

  /// Physically following block. For the last real block this is the sentinel.
  pub fn next(self) -> Block {
    let payload = unsafe { NonNull::new_unchecked(self.payload.as_ptr().add(self.size())) };
    Block { payload }
  }

  /// Tag found in the word just before this block's header.
  pub fn prev_footer(self) -> Tag {
    Tag(unsafe { self.word_at(-(OVERHEAD as isize)).read() })
  }

  /// Physically preceding block. The prologue stops this walk at the heap start.
  pub fn prev(self) -> Block {
    let payload = unsafe { NonNull::new_unchecked(self.payload.as_ptr().sub(self.prev_footer().size())) };
    Block { payload }
  }
}

/// Bytes needed for the padding word, the prologue and the first sentinel.
pub const PROLOGUE_REGION: usize = 4 * WORD;

/// Lays out the fixed start of a heap in a fresh `PROLOGUE_REGION` region:
///
/// ```text
///   ┌─────────┬────────────┬────────────┬──────────┐
///   │ padding │ 2W | alloc │ 2W | alloc │ 0 | alloc│
///   └─────────┴────────────┴────────────┴──────────┘
///               prologue hdr  prologue ftr  sentinel
/// ```
///
/// Returns the prologue block.
///
/// # Safety
///
/// `region` must be writable for `PROLOGUE_REGION` bytes and word aligned.
pub unsafe fn lay_prologue(region: NonNull<u8>) -> Block {
  unsafe {
    region.as_ptr().cast::<usize>().write(0);
    let prologue = Block::from_payload(NonNull::new_unchecked(region.as_ptr().add(OVERHEAD)));
    prologue.write_tags(OVERHEAD, true);
    prologue.next().write_header(Tag::SENTINEL);
    prologue
  }
}
