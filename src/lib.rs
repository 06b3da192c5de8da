//! # brkalloc - a free-list allocator on top of the program break
//!
//! This crate implements `allocate` / `release` from scratch on the one
//! primitive the operating system gives us for a contiguous heap: growing
//! the process's data segment. It is an educational allocator, the point
//! is that every byte of bookkeeping is visible.
//!
//! ## Overview
//!
//! Every allocation carves a block out of the segment. A block is a small
//! header followed by the caller's payload, and all blocks ever created
//! form one singly linked chain:
//!
//! ```text
//!                          THE MANAGED SEGMENT
//!
//!   first
//!     |
//!     v
//!  +--------+----------+   +--------+----------+   +--------+----------+
//!  | Header | Payload  |-->| Header | Payload  |-->| Header | Payload  |
//!  +--------+----------+   +--------+----------+   +--------+----------+
//!                                                                      ^
//!                                                                      |
//!                                                               program break
//! ```
//!
//! `allocate` walks the chain looking for a released block that is large
//! enough (first-fit) and only extends the segment on a miss. `release`
//! steps backward from the payload pointer to the header and flips the
//! free flag, nothing is ever handed back to the operating system.
//!
//! ## Crate structure
//!
//! ```text
//!   brkalloc
//!   ├── block     - block header, integrity tags, metadata snapshots
//!   ├── freelist  - first-fit scan over the chain
//!   ├── kernel    - the platform break primitive (sbrk / VirtualAlloc)
//!   ├── utils     - word alignment arithmetic
//!   └── heap      - the public Heap facade
//! ```
//!
//! ## Quick start
//!
//! ```rust
//! use brkalloc::Heap;
//!
//! let mut heap = Heap::new();
//!
//! unsafe {
//!     let addr = heap.allocate(size_of::<u64>()).unwrap();
//!     let value = addr.cast::<u64>();
//!
//!     value.write(42);
//!     assert_eq!(42, value.read());
//!
//!     heap.release(addr.as_ptr());
//! }
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no locking anywhere, and the break pointer
//!   is process-wide. Concurrent calls are undefined behavior, callers
//!   that need more must serialize externally.
//! - **No splitting**: a reused block keeps its full size even when the
//!   request is smaller, the excess is wasted until the block is released
//!   again.
//! - **No coalescing**: neighbouring free blocks are never merged, so
//!   workloads with many small holes degrade over time.
//! - **Monotonic growth**: released memory is reused but never returned
//!   to the operating system; the segment only ever grows.
//! - **O(n) allocation**: the scan visits every block ever created in the
//!   worst case.
//!
//! ## Diagnostics
//!
//! The crate logs its decisions through the [`log`] facade and exposes the
//! chain through [`Heap::blocks`], an iterator of [`BlockView`] snapshots
//! that render as one debugging line per block.
//!
//! ## Safety
//!
//! Handing out raw memory is inherently unsafe: `allocate` returns
//! uninitialized bytes and `release` trusts that the pointer it gets back
//! is one it produced. The raw pointer arithmetic between payloads and
//! headers lives in the block module behind the safe snapshot API;
//! everything a caller can do without `unsafe` is inspect.

mod block;
mod freelist;
mod heap;
mod kernel;
mod utils;

pub use block::{BlockTag, BlockView};
pub use heap::{Blocks, Heap};
