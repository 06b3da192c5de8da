//! First-fit search over the block chain.
//!
//! Released blocks stay linked in the chain and are only distinguished by
//! [`Block::free`], so the free list is the chain itself rather than a
//! separate structure:
//!
//! ```text
//!   Chain head
//!       |
//!       v
//!  +-------+      +------+      +-------+      +------+
//!  | Block | ---> | Free | ---> | Block | ---> | Free | ---> null
//!  +-------+      +------+      +-------+      +------+
//! ```
//!
//! The walk visits blocks in creation order and keeps hold of the last
//! block it stepped over. On a miss that last block is the chain tail, so
//! the caller can link a fresh block after it without a second walk.

use crate::block::{Block, Link};

/// Outcome of one walk over the chain.
pub(crate) struct Scan {
    /// First free block large enough for the request, if any.
    pub hit: Link,
    /// Last block visited before stopping. On a miss this is the chain
    /// tail; `None` when the chain is empty.
    pub last: Link,
}

/// Walks the chain starting at `head` looking for a free block of at least
/// `size` bytes.
///
/// This is a first-fit search: the earliest free block in chain order that
/// is large enough wins, even when a later block would waste less space.
/// Worst case it touches every block ever created.
///
/// **SAFETY**: `head` and every `next` link reachable from it must point at
/// live block headers owned by the calling heap.
pub(crate) unsafe fn find_free_block(head: Link, size: usize) -> Scan {
    let mut last = None;
    let mut current = head;

    while let Some(block) = current {
        let meta = unsafe { block.as_ref() };

        if meta.free && meta.size >= size {
            return Scan {
                hit: Some(block),
                last,
            };
        }

        last = Some(block);
        current = meta.next;
    }

    Scan { hit: None, last }
}
