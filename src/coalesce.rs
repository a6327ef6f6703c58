use crate::block::Block;
use crate::free_list::FreeLists;

/// Merges the just-freed `block` with whichever physical neighbours are free
/// and puts the result into `lists`.
///
/// `block` must already carry free tags and must not be in `lists`. Free
/// neighbours are unlinked before any tag is rewritten, since unlinking reads
/// their sizes and link words.
///
/// ```text
///   before:  │ prev (free) │ block │ next (free) │
///   after:   │             merged                │
///            ▲ header                     footer ▲
/// ```
pub fn coalesce(
  lists: &mut FreeLists,
  block: Block,
) -> Block {
  let prev = block.prev();
  let next = block.next();

  let mut start = block;
  let mut size = block.size();

  if !prev.is_allocated() {
    size += prev.size();
    lists.remove(prev);
    start = prev;
  }

  if !next.is_allocated() {
    size += next.size();
    lists.remove(next);
  }

  if size != block.size() {
    log::trace!("coalesce {:#x}: {} -> {} bytes", start.addr(), block.size(), size);
  }

  start.write_tags(size, false);
  lists.insert(start);
  start
}
