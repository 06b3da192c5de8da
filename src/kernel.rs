//! Platform layer of the allocator.
//!
//! Everything the heap needs from the operating system is one primitive:
//! grow the process's data segment and hand back the start of the fresh
//! area. On unix that is literally `sbrk(2)`; on windows there is no break
//! pointer, so the same contract is emulated by committing pages out of a
//! reserved address range.
//!
//! ```text
//!   High Address +---------------------+
//!                |        Stack        |  grows down
//!                |          |          |
//!                |          v          |
//!                |                     |
//!                |          ^          |
//!                |          |          |
//!                |        Heap         |  grows up, one extend() at a time
//!                +---------------------+  <- program break
//!                |        Data         |
//!                +---------------------+
//!                |        Text         |
//!   Low Address  +---------------------+
//! ```
//!
//! The break is process-wide state and this layer does nothing to guard
//! it: two threads racing through [`extend`] corrupt the segment. The
//! allocator is single-threaded by contract, callers that ever need more
//! must serialize externally.

use std::ptr::NonNull;

/// Carrier type for the platform implementations.
pub(crate) struct Kernel;

/// Abstraction over the primitive that grows the data segment. The heap,
/// as the top level view of this, has nothing to do with the concrete
/// APIs offered by each kernel.
trait PlatformBreak {
    /// Grows the managed region by `len` bytes and returns the start of
    /// the newly available area, or `None` when the operating system
    /// denies the request. A denied request leaves the segment unchanged
    /// and is never retried here.
    unsafe fn extend(len: usize) -> Option<NonNull<u8>>;
}

/// Wrapper to use [`Kernel::extend`].
#[inline]
pub(crate) unsafe fn extend(len: usize) -> Option<NonNull<u8>> {
    unsafe { Kernel::extend(len) }
}

#[cfg(unix)]
mod unix {
    use super::{Kernel, PlatformBreak};

    use libc::{c_void, intptr_t, sbrk};

    use std::ptr::NonNull;

    impl PlatformBreak for Kernel {
        unsafe fn extend(len: usize) -> Option<NonNull<u8>> {
            // sbrk takes a signed increment, anything larger would wrap.
            if len > intptr_t::MAX as usize {
                return None;
            }

            unsafe {
                let addr = sbrk(len as intptr_t);

                // sbrk signals failure with (void *)-1.
                if addr == usize::MAX as *mut c_void {
                    return None;
                }

                Some(NonNull::new_unchecked(addr).cast::<u8>())
            }
        }
    }
}

#[cfg(windows)]
mod windows {
    use super::{Kernel, PlatformBreak};

    use windows::Win32::System::Memory;

    use std::ptr::{self, NonNull};

    /// Span reserved up front for the emulated data segment. Reserving
    /// only claims address space, pages are committed as the break moves.
    const SEGMENT_SPAN: usize = 1 << 30;

    // Break emulation state. Unsynchronized like the real break pointer,
    // single-threaded use is a documented precondition of the crate.
    static mut SEGMENT_BASE: *mut u8 = ptr::null_mut();
    static mut SEGMENT_BREAK: usize = 0;

    impl PlatformBreak for Kernel {
        unsafe fn extend(len: usize) -> Option<NonNull<u8>> {
            unsafe {
                if SEGMENT_BASE.is_null() {
                    let base = Memory::VirtualAlloc(
                        None,
                        SEGMENT_SPAN,
                        Memory::MEM_RESERVE,
                        Memory::PAGE_NOACCESS,
                    );

                    if base.is_null() {
                        return None;
                    }

                    SEGMENT_BASE = base.cast();
                }

                let new_break = SEGMENT_BREAK.checked_add(len)?;
                if new_break > SEGMENT_SPAN {
                    return None;
                }

                let start = SEGMENT_BASE.add(SEGMENT_BREAK);

                // Committing rounds to page boundaries on its own, and
                // re-committing an already committed page is allowed.
                let committed = Memory::VirtualAlloc(
                    Some(start as *const _),
                    len,
                    Memory::MEM_COMMIT,
                    Memory::PAGE_READWRITE,
                );

                if committed.is_null() {
                    return None;
                }

                SEGMENT_BREAK = new_break;

                Some(NonNull::new_unchecked(start))
            }
        }
    }
}
