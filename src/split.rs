use crate::block::{Block, MIN_BLOCK_SIZE};
use crate::free_list::FreeLists;

/// Takes the free `block` out of `lists` and allocates its first `size` bytes.
///
/// `size` already includes header, footer and alignment. When the rest is
/// large enough to be a block of its own it goes back into `lists` as a free
/// block; otherwise the whole block is handed out and the slack stays inside
/// it (less than `MIN_BLOCK_SIZE` bytes).
pub fn use_block(
  lists: &mut FreeLists,
  block: Block,
  size: usize,
) -> Block {
  let block_size = block.size();
  debug_assert!(!block.is_allocated());
  debug_assert!(block_size >= size);

  lists.remove(block);

  let remainder = block_size - size;
  if remainder >= MIN_BLOCK_SIZE {
    block.write_tags(size, true);

    let rest = block.next();
    rest.write_tags(remainder, false);
    lists.insert(rest);

    log::trace!("split {:#x}: {} allocated, {} back to free lists", block.addr(), size, remainder);
  } else {
    block.write_tags(block_size, true);
  }

  block
}
