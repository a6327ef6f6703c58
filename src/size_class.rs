//! Size classes for the segregated free lists.
//!
//! Class boundaries double: class 0 holds blocks of `MIN_BLOCK_SIZE` up to
//! twice that, class 1 the next power of two, and so on. Everything from
//! `MIN_BLOCK_SIZE << (NUM_CLASSES - 1)` upwards shares the last class.

use crate::block::MIN_BLOCK_SIZE;

/// Number of free-list buckets.
pub const NUM_CLASSES: usize = 13;

const MIN_SHIFT: u32 = MIN_BLOCK_SIZE.ilog2();

/// Bucket index for a block (or request) of `size` bytes.
#[inline]
pub const fn class_of(size: usize) -> usize {
  if size < MIN_BLOCK_SIZE {
    return 0;
  }
  let class = (size.ilog2() - MIN_SHIFT) as usize;
  if class >= NUM_CLASSES { NUM_CLASSES - 1 } else { class }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_small_sizes_share_first_class() {
    assert_eq!(class_of(0), 0);
    assert_eq!(class_of(8), 0);
    assert_eq!(class_of(MIN_BLOCK_SIZE), 0);
    assert_eq!(class_of(2 * MIN_BLOCK_SIZE - 8), 0);
  }

  #[test]
  fn test_boundaries_double() {
    for class in 1..NUM_CLASSES {
      let floor = MIN_BLOCK_SIZE << class;
      assert_eq!(class_of(floor), class);
      assert_eq!(class_of(floor - 8), class - 1);
    }
  }

  #[test]
  fn test_saturates() {
    assert_eq!(class_of(MIN_BLOCK_SIZE << 20), NUM_CLASSES - 1);
    assert_eq!(class_of(usize::MAX & !7), NUM_CLASSES - 1);
  }

  #[test]
  fn test_monotonic() {
    let mut last = 0;
    for size in (MIN_BLOCK_SIZE..1 << 20).step_by(8) {
      let class = class_of(size);
      assert!(class >= last);
      last = class;
    }
  }
}
