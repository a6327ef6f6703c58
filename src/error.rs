use thiserror::Error;

/// Errors surfaced by heap growth and by the consistency checker.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
  #[error("heap provider could not grow by {requested} bytes")]
  OutOfMemory { requested: usize },
  #[error("heap provider returned a region that does not follow the heap end")]
  Discontiguous,
  #[error("allocator has not been initialized")]
  Uninitialized,
  #[error("heap corrupted at {addr:#x}: {kind}")]
  Corrupt { addr: usize, kind: Corruption },
}

/// What the checker found wrong with a block or a free-list entry.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Corruption {
  #[error("prologue tags are damaged")]
  BadPrologue,
  #[error("payload is not aligned")]
  Misaligned,
  #[error("size {0} is not a valid block size")]
  BadSize(usize),
  #[error("header and footer disagree")]
  TagMismatch,
  #[error("block runs past the end of the heap")]
  OutOfBounds,
  #[error("sentinel is not at the end of the heap")]
  BadSentinel,
  #[error("adjacent free blocks were not coalesced")]
  Uncoalesced,
  #[error("allocated block found in a free list")]
  ListedAllocated,
  #[error("block is in the free list of class {0}")]
  WrongClass(usize),
  #[error("free list is not sorted by size")]
  Unsorted,
  #[error("free list back link is broken")]
  BrokenLink,
  #[error("{listed} blocks listed but {walked} free blocks in the heap")]
  ListCount { listed: usize, walked: usize },
}

pub type Result<T> = core::result::Result<T, HeapError>;
