use std::{fmt, mem, ptr::NonNull};

use crate::utils::ALIGNMENT;

/// Header size of a block in bytes. This is the fixed backward offset
/// between a payload pointer handed to the caller and the [`Block`] that
/// owns it.
pub(crate) const BLOCK_HEADER_SIZE: usize = mem::size_of::<Block>();

// The payload starts right after the header, so payload alignment depends
// on the header size staying a multiple of the word boundary.
const _: () = assert!(BLOCK_HEADER_SIZE % ALIGNMENT == 0);

/// Nullable forward reference to another block in the chain.
pub(crate) type Link = Option<NonNull<Block>>;

/// This is the structure of a block. The fields of the block are its
/// metadata, the payload is placed right after this header:
///
/// ```text
/// +---------------------+ <------+
/// |        size         |        |
/// +---------------------+        |
/// |        next         |        | -> Header
/// +---------------------+        |
/// |    free     tag     |        |
/// +---------------------+ <------+
/// |       Payload       |        |
/// |         ...         |        | -> Caller-visible bytes
/// |         ...         |        |
/// +---------------------+ <------+
///          ^
///          |
///   The pointer returned by the allocator points at the payload,
///   never at the header.
/// ```
///
/// Blocks live inside the data segment itself, carved out of the memory
/// returned by [`crate::kernel::extend`]. The heap owns every block for the
/// lifetime of the process; callers only ever borrow payload pointers.
#[repr(C)]
pub(crate) struct Block {
    /// Usable payload size in bytes, already aligned.
    pub size: usize,
    /// Next block in the chain. The chain is append-only and ordered by
    /// creation time, which on a growing segment also means by address.
    pub next: Link,
    /// Whether the payload is currently unused and eligible for reuse.
    pub free: bool,
    /// Integrity marker for debugging and misuse checks. Never drives an
    /// allocation decision.
    pub tag: BlockTag,
}

/// Marks how a block reached its current state.
///
/// The tag exists for inspection and for the misuse asserts in
/// [`crate::Heap::release`]; the allocator itself only ever branches on
/// [`Block::free`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    /// Freshly carved out of the data segment, still on its first use.
    Carved,
    /// Picked up again from the free list after a release.
    Recycled,
    /// Released by the caller, waiting for reuse.
    Released,
}

impl Block {
    /// Recovers the header that owns `payload`.
    ///
    /// **SAFETY**: `payload` must be a pointer previously returned by this
    /// allocator and still backed by a block in the chain. Anything else
    /// reads foreign memory.
    pub(crate) unsafe fn from_payload(payload: NonNull<u8>) -> NonNull<Block> {
        unsafe { NonNull::new_unchecked(payload.as_ptr().sub(BLOCK_HEADER_SIZE)).cast() }
    }

    /// Returns the first payload byte of `block`, right past the header.
    ///
    /// **SAFETY**: `block` must point at a live header carved by this
    /// allocator.
    pub(crate) unsafe fn payload(block: NonNull<Block>) -> NonNull<u8> {
        unsafe { NonNull::new_unchecked(block.as_ptr().cast::<u8>().add(BLOCK_HEADER_SIZE)) }
    }
}

/// Copied snapshot of one block's metadata, safe to hold and print while
/// the heap keeps running.
///
/// Obtained from [`crate::Heap::blocks`]. The `Display` impl renders the
/// same line the allocator has always used for debugging:
///
/// ```text
/// address=0x55e3c1a2e000 { size=16, free=false, tag=Carved, next=0x55e3c1a2e020 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockView {
    /// Address of the block header.
    pub addr: *const u8,
    /// Usable payload size in bytes.
    pub size: usize,
    /// Whether the block is currently free.
    pub free: bool,
    /// Integrity tag.
    pub tag: BlockTag,
    /// Address of the next header in the chain, null at the tail.
    pub next: *const u8,
}

impl BlockView {
    /// Reads the metadata of `block` into an owned snapshot.
    ///
    /// **SAFETY**: `block` must point at a live header in the chain.
    pub(crate) unsafe fn read(block: NonNull<Block>) -> Self {
        let meta = unsafe { block.as_ref() };

        Self {
            addr: block.as_ptr().cast_const().cast(),
            size: meta.size,
            free: meta.free,
            tag: meta.tag,
            next: meta
                .next
                .map_or(std::ptr::null(), |n| n.as_ptr().cast_const().cast()),
        }
    }
}

impl fmt::Display for BlockView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "address={:p} {{ size={}, free={}, tag={:?}, next={:p} }}",
            self.addr, self.size, self.free, self.tag, self.next
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_size_is_word_aligned() {
        assert_eq!(0, BLOCK_HEADER_SIZE % ALIGNMENT);
    }

    #[test]
    fn payload_round_trip() {
        let mut block = Block {
            size: 8,
            next: None,
            free: false,
            tag: BlockTag::Carved,
        };

        let header = NonNull::from(&mut block);

        unsafe {
            let payload = Block::payload(header);
            assert_eq!(
                payload.as_ptr() as usize,
                header.as_ptr() as usize + BLOCK_HEADER_SIZE
            );
            assert_eq!(header, Block::from_payload(payload));
        }
    }

    #[test]
    fn view_renders_metadata() {
        let mut block = Block {
            size: 32,
            next: None,
            free: true,
            tag: BlockTag::Released,
        };

        let view = unsafe { BlockView::read(NonNull::from(&mut block)) };
        let rendered = view.to_string();

        assert!(rendered.contains("size=32"));
        assert!(rendered.contains("free=true"));
        assert!(rendered.contains("tag=Released"));
        assert!(rendered.contains("next=0x0"));
    }
}
