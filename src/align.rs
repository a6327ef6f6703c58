/// Rounds a byte count up to the allocator's alignment unit ([`ALIGNMENT`]).
///
/// Every block size and every payload address handed out by the allocator is
/// a multiple of this unit, which keeps the low three bits of a size free for
/// the allocation flag.
///
/// # Examples
///
/// ```rust
/// use segalloc::align;
///
/// assert_eq!(align!(1), 8);
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(16), 16);
/// ```
///
/// [`ALIGNMENT`]: crate::ALIGNMENT
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::ALIGNMENT - 1) & !($crate::ALIGNMENT - 1)
  };
}

#[cfg(test)]
mod tests {
  use crate::ALIGNMENT;

  #[test]
  fn test_align() {
    let mut alignments = Vec::new();

    for i in 0..10 {
      let sizes = (ALIGNMENT * i + 1)..=(ALIGNMENT * (i + 1));

      let expected_alignment = ALIGNMENT * (i + 1);

      alignments.push((sizes, expected_alignment));
    }

    for (sizes, expected) in alignments {
      for size in sizes {
        assert_eq!(expected, align!(size));
      }
    }
  }

  #[test]
  fn test_align_zero() {
    assert_eq!(align!(0), 0);
  }
}
