//! Hand-laid heaps for unit tests of the layout, split and coalesce layers.

use core::ptr::NonNull;

use crate::block::{Block, OVERHEAD, PROLOGUE_REGION, Tag, WORD, lay_prologue};
use crate::free_list::FreeLists;
use crate::provider::Unit;

pub struct Scratch {
  _memory: Box<[Unit]>,
  prologue: Block,
  blocks: Vec<Block>,
}

impl Scratch {
  /// Builds `padding | prologue | blocks... | sentinel` from `(size, allocated)` pairs.
  pub fn new(layout: &[(usize, bool)]) -> Self {
    let total = PROLOGUE_REGION + layout.iter().map(|(size, _)| size).sum::<usize>();
    let mut memory = vec![Unit::default(); total / size_of::<Unit>() + 1].into_boxed_slice();
    let region = NonNull::new(memory.as_mut_ptr().cast::<u8>()).unwrap();

    let prologue = unsafe { lay_prologue(region) };
    let mut blocks = Vec::new();
    let mut block = prologue.next();
    for &(size, allocated) in layout {
      block.write_tags(size, allocated);
      blocks.push(block);
      block = block.next();
      block.write_header(Tag::SENTINEL);
    }

    assert_eq!(prologue.size(), OVERHEAD);
    assert_eq!(block.addr(), region.as_ptr() as usize + total);
    assert_eq!(block.addr() % WORD, 0);

    Self {
      _memory: memory,
      prologue,
      blocks,
    }
  }

  pub fn prologue(&self) -> Block {
    self.prologue
  }

  pub fn blocks(&self) -> Vec<Block> {
    self.blocks.clone()
  }

  /// Free lists holding every free block of the layout.
  pub fn lists(&self) -> FreeLists {
    let mut lists = FreeLists::new();
    for block in self.blocks.iter().filter(|block| !block.is_allocated()) {
      lists.insert(*block);
    }
    lists
  }
}
