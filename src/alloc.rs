//! Pluggable node allocation.

use std::alloc::{self as global_alloc, Layout};
use std::ptr::NonNull;
use std::sync::Arc;

use crate::error::AllocError;

/// Allocation strategy for queue nodes.
///
/// The queue calls into the strategy from many threads at once without any
/// serialization, hence the `Send + Sync` bound.
///
/// # Safety
///
/// Implementors must return memory that is valid for reads and writes of
/// `layout.size()` bytes, aligned to `layout.align()`, and not handed out again
/// until it has been passed back to [`NodeAlloc::deallocate`]. The queue only
/// requests layouts with a non-zero size.
pub unsafe trait NodeAlloc: Send + Sync {
    /// Allocates a block for `layout`, or reports that none is available.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Returns a block to the strategy.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate` on this strategy with the same `layout`
    /// and must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// The process-wide allocator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Global;

// SAFETY: defers to `std::alloc`, which upholds the same contract.
unsafe impl NodeAlloc for Global {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        debug_assert!(layout.size() > 0);
        // SAFETY: the queue never asks for zero-sized layouts.
        NonNull::new(unsafe { global_alloc::alloc(layout) }).ok_or(AllocError)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: caller guarantees `ptr` came from `allocate` with `layout`.
        unsafe { global_alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

// SAFETY: forwards to `A`.
unsafe impl<A: NodeAlloc + ?Sized> NodeAlloc for &A {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { (**self).deallocate(ptr, layout) }
    }
}

// SAFETY: forwards to `A`.
unsafe impl<A: NodeAlloc + ?Sized> NodeAlloc for Arc<A> {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { (**self).deallocate(ptr, layout) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_round_trip() {
        let layout = Layout::new::<[u64; 4]>();
        let ptr = Global.allocate(layout).unwrap();
        assert_eq!(ptr.as_ptr() as usize % layout.align(), 0);
        unsafe {
            ptr.as_ptr().cast::<[u64; 4]>().write([1, 2, 3, 4]);
            Global.deallocate(ptr, layout);
        }
    }

    #[test]
    fn test_forwarding_impls() {
        fn allocate_with(alloc: impl NodeAlloc) {
            let layout = Layout::new::<u32>();
            let ptr = alloc.allocate(layout).unwrap();
            unsafe { alloc.deallocate(ptr, layout) };
        }

        allocate_with(&Global);
        allocate_with(Arc::new(Global));
    }
}
