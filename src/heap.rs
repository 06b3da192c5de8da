use std::{marker::PhantomData, ptr::NonNull};

use log::debug;

use crate::{
    block::{BLOCK_HEADER_SIZE, Block, BlockTag, BlockView, Link},
    freelist, kernel,
    utils::align,
};

/// A heap carved out of the process's data segment.
///
/// The heap owns a singly linked chain of [`Block`] headers, each followed
/// in memory by its payload. Allocation first tries to reuse a released
/// block (first-fit, no splitting) and only grows the data segment when
/// nothing on the chain fits. Released blocks stay in the chain forever,
/// the segment never shrinks:
///
/// ```text
///   first
///     |
///     v
/// +--------+---------+    +--------+---------+    +--------+---------+
/// | Header | Payload | -> | Header | Payload | -> | Header | Payload |
/// +--------+---------+    +--------+---------+    +--------+---------+
///   in use                  free, reusable          in use
/// ```
///
/// Every heap is an independent object, several can coexist in one
/// process. The chain pointers make `Heap` neither `Send` nor `Sync`,
/// which matches the contract of the underlying break primitive: no
/// locking happens anywhere, concurrent use is undefined and has to be
/// prevented by the embedder.
pub struct Heap {
    /// Head of the block chain. `None` until the first allocation.
    first: Link,
}

impl Heap {
    /// Creates a heap with an empty chain. No memory is requested until
    /// the first [`allocate`](Heap::allocate) call.
    pub fn new() -> Self {
        Self { first: None }
    }

    /// Allocates at least `size` bytes and returns a pointer to the start
    /// of the payload, aligned to the machine word boundary.
    ///
    /// A request of 0 bytes returns `None` by convention, as does a denied
    /// segment growth; in both cases the chain is left untouched. The
    /// payload of a successful allocation is disjoint from every other
    /// in-use payload, but a reused block may be larger than requested
    /// since blocks are never split.
    ///
    /// **SAFETY**: the returned memory is uninitialized, and the caller
    /// must not access it beyond the rounded-up size or after releasing it.
    pub unsafe fn allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            return None;
        }

        let aligned = align(size)?;

        // First call ever: the new block becomes the chain head.
        let Some(head) = self.first else {
            let block = unsafe { self.request_block(aligned, None) }?;
            self.first = Some(block);

            return Some(unsafe { Block::payload(block) });
        };

        let scan = unsafe { freelist::find_free_block(Some(head), aligned) };

        match scan.hit {
            Some(mut hit) => {
                let meta = unsafe { hit.as_mut() };
                meta.free = false;
                meta.tag = BlockTag::Recycled;

                debug!(
                    "allocate({size}): reusing the {} byte block at {:p}",
                    meta.size,
                    hit.as_ptr()
                );

                Some(unsafe { Block::payload(hit) })
            }
            // Nothing on the chain fits, grow the segment and append
            // after the tail reported by the scan.
            None => {
                let block = unsafe { self.request_block(aligned, scan.last) }?;

                Some(unsafe { Block::payload(block) })
            }
        }
    }

    /// Returns the block owning `ptr` to the free list.
    ///
    /// A null pointer is a no-op. The memory is not zeroed, not merged
    /// with its neighbours and never handed back to the operating system,
    /// the block just becomes eligible for reuse.
    ///
    /// Releasing a block twice, or a pointer this heap never returned, is
    /// caller misuse and fails a hard assertion: past that point the chain
    /// would corrupt invisibly, so there is nothing to recover.
    ///
    /// **SAFETY**: `ptr` must be null or a pointer previously returned by
    /// [`allocate`](Heap::allocate) on this heap.
    pub unsafe fn release(&mut self, ptr: *mut u8) {
        let Some(payload) = NonNull::new(ptr) else {
            return;
        };

        let mut block = unsafe { Block::from_payload(payload) };
        let meta = unsafe { block.as_mut() };

        assert!(!meta.free, "release of a block that is already free");
        assert!(
            matches!(meta.tag, BlockTag::Carved | BlockTag::Recycled),
            "release of a block with an unrecognized tag"
        );

        meta.free = true;
        meta.tag = BlockTag::Released;

        debug!(
            "release: {} byte block at {:p} back on the free list",
            meta.size,
            block.as_ptr()
        );
    }

    /// Renders the metadata of the block owning `ptr` for debugging, e.g.
    ///
    /// ```text
    /// address=0x55e3c1a2e000 { size=16, free=false, tag=Carved, next=0x0 }
    /// ```
    ///
    /// **SAFETY**: `ptr` must be a pointer previously returned by
    /// [`allocate`](Heap::allocate) on this heap.
    pub unsafe fn describe(&self, ptr: NonNull<u8>) -> String {
        let block = unsafe { Block::from_payload(ptr) };

        unsafe { BlockView::read(block) }.to_string()
    }

    /// Iterates over the chain in creation order, yielding a metadata
    /// snapshot per block. Free and in-use blocks both show up, which
    /// makes this the crate's window into fragmentation.
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks {
            current: self.first,
            _heap: PhantomData,
        }
    }

    /// Carves a brand new block out of the data segment and links it
    /// after `last`, the current chain tail. With `last == None` the
    /// block is left unlinked for the caller to install as the head.
    ///
    /// On a denied growth nothing is linked, the chain stays consistent.
    unsafe fn request_block(&mut self, size: usize, last: Link) -> Option<NonNull<Block>> {
        let total = BLOCK_HEADER_SIZE.checked_add(size)?;
        let addr = unsafe { kernel::extend(total) }?;
        let block = addr.cast::<Block>();

        unsafe {
            block.as_ptr().write(Block {
                size,
                next: None,
                free: false,
                tag: BlockTag::Carved,
            });

            if let Some(mut last) = last {
                last.as_mut().next = Some(block);
            }
        }

        debug!(
            "allocate: carved a new {size} byte block at {:p}",
            block.as_ptr()
        );

        Some(block)
    }
}

/// Iterator over [`BlockView`] snapshots of a heap's chain.
pub struct Blocks<'a> {
    current: Link,
    _heap: PhantomData<&'a Heap>,
}

impl Iterator for Blocks<'_> {
    type Item = BlockView;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.current?;

        // The heap is immutably borrowed for our whole lifetime, so every
        // chain pointer stays valid while we walk it.
        let view = unsafe { BlockView::read(block) };
        self.current = unsafe { block.as_ref() }.next;

        Some(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    // The break is process-global while the test harness is threaded, so
    // every test touching the segment takes this lock first. A poisoned
    // lock is fine to reuse: the panicking test owns its own heap.
    static HEAP_TESTS: Mutex<()> = Mutex::new(());

    fn serial() -> MutexGuard<'static, ()> {
        HEAP_TESTS.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[test]
    fn basic_alloc() {
        let _guard = serial();
        let mut heap = Heap::new();

        unsafe {
            let addr = heap.allocate(size_of::<u64>()).unwrap();
            let value = addr.cast::<u64>();

            value.write(23);
            assert_eq!(23, value.read());
        }
    }

    #[test]
    fn allocate_zero_returns_none() {
        let _guard = serial();
        let mut heap = Heap::new();

        unsafe {
            assert!(heap.allocate(0).is_none());
        }

        assert_eq!(0, heap.blocks().count());
    }

    #[test]
    fn allocate_huge_fails_cleanly() {
        let _guard = serial();
        let mut heap = Heap::new();

        unsafe {
            assert!(heap.allocate(usize::MAX).is_none());
        }

        assert_eq!(0, heap.blocks().count());
    }

    #[test]
    fn payloads_are_word_aligned() {
        let _guard = serial();
        let mut heap = Heap::new();

        unsafe {
            for size in 1..=33 {
                let addr = heap.allocate(size).unwrap();
                assert_eq!(0, addr.as_ptr() as usize % align_of::<usize>());
            }
        }
    }

    #[test]
    fn sizes_round_up_to_the_boundary() {
        let _guard = serial();
        let mut heap = Heap::new();

        // On a 64 bit target: 1 -> 8, 8 -> 8, 9 -> 16.
        unsafe {
            heap.allocate(1).unwrap();
            heap.allocate(size_of::<usize>()).unwrap();
            heap.allocate(size_of::<usize>() + 1).unwrap();
        }

        let sizes: Vec<usize> = heap.blocks().map(|view| view.size).collect();
        let word = size_of::<usize>();

        assert_eq!(vec![word, word, 2 * word], sizes);
    }

    #[test]
    fn space_for_released_block_is_reused() {
        let _guard = serial();
        let mut heap = Heap::new();

        unsafe {
            let first = heap.allocate(16).unwrap();
            let _second = heap.allocate(12).unwrap();

            heap.release(first.as_ptr());

            // First fit: the released head block is the earliest free
            // block large enough for 8 bytes.
            let third = heap.allocate(8).unwrap();
            assert_eq!(first, third);
        }

        let head = heap.blocks().next().unwrap();
        assert!(!head.free);
        assert_eq!(BlockTag::Recycled, head.tag);
        // Reuse never splits, the block keeps its full 16 bytes.
        assert_eq!(16, head.size);
    }

    #[test]
    fn too_small_free_blocks_are_passed_over() {
        let _guard = serial();
        let mut heap = Heap::new();

        unsafe {
            let small = heap.allocate(8).unwrap();
            heap.allocate(8).unwrap();
            heap.release(small.as_ptr());

            // 24 bytes fit nowhere, so the request grows the chain.
            heap.allocate(24).unwrap();
        }

        let views: Vec<BlockView> = heap.blocks().collect();

        assert_eq!(3, views.len());
        assert!(views[0].free);
        assert_eq!(24, views[2].size);
        assert_eq!(BlockTag::Carved, views[2].tag);
    }

    #[test]
    fn neighbouring_payloads_stay_disjoint() {
        let _guard = serial();
        let mut heap = Heap::new();

        unsafe {
            let first = heap.allocate(size_of::<u64>()).unwrap().cast::<u64>();
            first.write(3);

            let count = 6;
            let second = heap.allocate(count * size_of::<u16>()).unwrap().cast::<u16>();

            for i in 0..count {
                second.add(i).write((i + 1) as u16);
            }

            assert_eq!(3, first.read());

            for i in 0..count {
                assert_eq!((i + 1) as u16, second.add(i).read());
            }
        }
    }

    #[test]
    fn release_null_is_a_noop() {
        let _guard = serial();
        let mut heap = Heap::new();

        unsafe {
            heap.allocate(8).unwrap();
            heap.release(ptr::null_mut());
        }

        let views: Vec<BlockView> = heap.blocks().collect();

        assert_eq!(1, views.len());
        assert!(!views[0].free);
    }

    #[test]
    #[should_panic(expected = "already free")]
    fn double_release_is_fatal() {
        let _guard = serial();
        let mut heap = Heap::new();

        unsafe {
            let addr = heap.allocate(8).unwrap();

            heap.release(addr.as_ptr());
            heap.release(addr.as_ptr());
        }
    }

    #[test]
    fn released_blocks_are_tagged() {
        let _guard = serial();
        let mut heap = Heap::new();

        unsafe {
            let addr = heap.allocate(8).unwrap();
            heap.release(addr.as_ptr());
        }

        let view = heap.blocks().next().unwrap();

        assert!(view.free);
        assert_eq!(BlockTag::Released, view.tag);
    }

    #[test]
    fn describe_reports_the_metadata() {
        let _guard = serial();
        let mut heap = Heap::new();

        unsafe {
            let addr = heap.allocate(16).unwrap();
            let line = heap.describe(addr);

            assert!(line.contains("size=16"));
            assert!(line.contains("free=false"));
            assert!(line.contains("tag=Carved"));
        }
    }
}
