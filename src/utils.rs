//! Helper arithmetic for the allocator. These are functions that don't
//! particularly belong to any concrete module of the program.

use std::mem;

/// Fixed alignment boundary of the allocator: the machine word size in
/// bytes (8 on a 64 bit target, 4 on a 32 bit one). Every payload the
/// allocator hands out starts on a multiple of this boundary and has a
/// size that is a multiple of it.
pub(crate) const ALIGNMENT: usize = mem::size_of::<usize>();

/// Rounds `size` up to the next multiple of [`ALIGNMENT`].
///
/// A size of 0 maps to one full alignment unit, sizes that already sit on
/// the boundary pass through unchanged, everything else rounds up. Returns
/// `None` when the rounded value would not fit in a `usize`.
pub(crate) fn align(size: usize) -> Option<usize> {
    if size == 0 {
        return Some(ALIGNMENT);
    }

    Some(size.checked_add(ALIGNMENT - 1)? & !(ALIGNMENT - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_rounds_up_to_word_multiples() {
        let mut alignments = Vec::new();

        for i in 0..10 {
            let sizes = (ALIGNMENT * i + 1)..=(ALIGNMENT * (i + 1));
            let expected = ALIGNMENT * (i + 1);

            alignments.push((sizes, expected));
        }

        for (sizes, expected) in alignments {
            for size in sizes {
                assert_eq!(Some(expected), align(size));
            }
        }
    }

    #[test]
    fn align_zero_maps_to_one_unit() {
        assert_eq!(Some(ALIGNMENT), align(0));
    }

    #[test]
    fn align_exact_multiples_pass_through() {
        for i in 1..10 {
            assert_eq!(Some(ALIGNMENT * i), align(ALIGNMENT * i));
        }
    }

    #[test]
    fn align_overflow_is_detected() {
        assert_eq!(None, align(usize::MAX));
        assert_eq!(None, align(usize::MAX - (ALIGNMENT - 2)));
    }
}
