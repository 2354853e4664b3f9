use std::alloc::Layout;
use std::mem::MaybeUninit;
use std::ptr::{self, NonNull};
use std::sync::atomic::AtomicPtr;

use crate::alloc::NodeAlloc;

/// Address stored in `next` once a last node has been dequeued.
///
/// Never a valid allocation: it is non-null and misaligned for `Node<T>`.
const REMOVED: usize = 1;

pub(crate) struct Node<T> {
    pub(crate) next: AtomicPtr<Node<T>>,
    value: MaybeUninit<T>,
}

impl<T> Node<T> {
    const LAYOUT: Layout = Layout::new::<Node<T>>();

    /// The permanent head node. Its payload is never initialised.
    pub(crate) fn sentinel() -> Self {
        Self {
            next: AtomicPtr::new(ptr::null_mut()),
            value: MaybeUninit::uninit(),
        }
    }

    /// Marker forbidding any further link after a dequeued last node.
    #[inline]
    pub(crate) fn removed() -> *mut Node<T> {
        ptr::without_provenance_mut(REMOVED)
    }

    /// Allocates a detached node through `alloc`, handing `value` back on failure.
    pub(crate) fn alloc_in<A: NodeAlloc>(alloc: &A, value: T) -> Result<*mut Node<T>, T> {
        let Ok(raw) = alloc.allocate(Self::LAYOUT) else {
            return Err(value);
        };
        let node = raw.cast::<Node<T>>().as_ptr();
        // SAFETY: fresh block, valid and aligned for `Node<T>`.
        unsafe {
            node.write(Node {
                next: AtomicPtr::new(ptr::null_mut()),
                value: MaybeUninit::new(value),
            });
        }
        Ok(node)
    }

    /// Moves the payload out without touching `next`, which other threads may
    /// still be reading.
    ///
    /// # Safety
    ///
    /// `node` must be a live data node whose payload has not been taken yet, and
    /// the caller must own that payload.
    #[inline]
    pub(crate) unsafe fn take(node: *mut Node<T>) -> T {
        unsafe { ptr::addr_of!((*node).value).cast::<T>().read() }
    }

    /// Returns the node's memory to `alloc`. The payload is not dropped.
    ///
    /// # Safety
    ///
    /// `node` must come from [`Node::alloc_in`] with the same strategy and must
    /// not be reachable by any thread.
    #[inline]
    pub(crate) unsafe fn dealloc_in<A: NodeAlloc>(alloc: &A, node: *mut Node<T>) {
        // SAFETY: caller contract; `Node<T>` has no drop glue besides the payload,
        // which has already been moved out.
        unsafe { alloc.deallocate(NonNull::new_unchecked(node).cast(), Self::LAYOUT) }
    }
}
