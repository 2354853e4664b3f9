//! The lock-free queue.
//!
//! The chain starts at a permanent sentinel owned by the queue. `tail` is a
//! stamped pointer to the sentinel or to the last node. Enqueue links behind
//! the last node and then swings `tail`; any thread that finds `tail` lagging
//! finishes the swing before retrying.
//!
//! Dequeue detaches `sentinel.next`:
//!
//! - A node with a successor is detached with one CAS on `sentinel.next`, after
//!   `tail` has been helped past it.
//! - The last node is detached in two steps. Marking its `next` as removed is
//!   the commit point and forbids any later link behind it. Unlinking it from
//!   `sentinel.next` and swinging `tail` back to the sentinel can then be done
//!   by any thread.
//!
//! Detached nodes go to a hazard-pointer domain and return to the allocation
//! strategy once no thread still protects them. The tail stamp keeps a stale
//! CAS expecting the sentinel from succeeding after `tail` has left and come
//! back to it.

use std::fmt;
use std::ptr::{self, NonNull};
use std::sync::atomic::Ordering;

use crossbeam_utils::{Backoff, CachePadded};
use msqueue_hazard::{Domain, Guard, RETIRE_THRESHOLD};

use crate::alloc::{Global, NodeAlloc};
use crate::error::EnqueueError;
use crate::node::Node;
use crate::stamped::{Stamped, StampedPtr};

/// Hazard slot for the node an operation is working on.
const SLOT_NODE: usize = 0;
/// Hazard slot used while helping a lagging tail.
const SLOT_HELP: usize = 1;

/// A lock-free, unbounded, multi-producer multi-consumer FIFO queue.
///
/// Nodes are allocated through `A` (see [`NodeAlloc`]); the sentinel is allocated
/// once with the global allocator and lives as long as the queue.
///
/// # Examples
///
/// ```
/// use msqueue::ConcurrentQueue;
///
/// let q = ConcurrentQueue::new();
/// q.enqueue(1).unwrap();
/// q.enqueue(2).unwrap();
/// assert_eq!(q.dequeue(), Some(1));
/// assert_eq!(q.dequeue(), Some(2));
/// assert_eq!(q.dequeue(), None);
/// ```
pub struct ConcurrentQueue<T, A: NodeAlloc = Global> {
    head: NonNull<Node<T>>,
    tail: CachePadded<StampedPtr<Node<T>>>,
    domain: Domain<Node<T>>,
    alloc: A,
}

// SAFETY: values move between threads through the queue; nodes and pointer
// fields are only mutated by CAS.
unsafe impl<T: Send, A: NodeAlloc> Send for ConcurrentQueue<T, A> {}
// SAFETY: as above; `&ConcurrentQueue` only exposes lock-free operations.
unsafe impl<T: Send, A: NodeAlloc> Sync for ConcurrentQueue<T, A> {}

impl<T> Default for ConcurrentQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ConcurrentQueue<T> {
    /// Creates an empty queue whose nodes come from the global allocator.
    pub fn new() -> Self {
        Self::with_allocator(Global)
    }
}

impl<T, A: NodeAlloc> ConcurrentQueue<T, A> {
    /// Creates an empty queue whose nodes come from `alloc`.
    ///
    /// Dequeued nodes are freed in batches of at least [`RETIRE_THRESHOLD`].
    pub fn with_allocator(alloc: A) -> Self {
        Self::with_allocator_and_threshold(alloc, RETIRE_THRESHOLD)
    }

    /// Creates an empty queue whose nodes come from `alloc`, holding back up to
    /// `threshold` dequeued nodes per thread before trying to free them.
    ///
    /// The effective threshold grows with the number of threads that have used
    /// the queue concurrently.
    pub fn with_allocator_and_threshold(alloc: A, threshold: usize) -> Self {
        let sentinel = NonNull::from(Box::leak(Box::new(Node::sentinel())));
        Self {
            head: sentinel,
            tail: CachePadded::new(StampedPtr::new(sentinel.as_ptr())),
            domain: Domain::with_threshold(threshold),
            alloc,
        }
    }

    /// The node allocation strategy.
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Appends `value` at the back of the queue.
    ///
    /// Fails only if the allocation strategy cannot supply a node; the queue is
    /// then unchanged and the value is returned inside the error.
    pub fn enqueue(&self, value: T) -> Result<(), EnqueueError<T>> {
        let node = Node::alloc_in(&self.alloc, value).map_err(EnqueueError::new)?;

        let backoff = Backoff::new();
        let guard = self.domain.guard();

        loop {
            let tail = self.protect_tail(&guard, SLOT_NODE);
            // SAFETY: protected by `guard`.
            let last = unsafe { &*tail.ptr };
            let next = last.next.load(Ordering::SeqCst);

            // Are tail and next consistent?
            if tail != self.tail.load(Ordering::SeqCst) {
                continue;
            }

            if next.is_null() {
                if last
                    .next
                    .compare_exchange(ptr::null_mut(), node, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    // Linked. Swinging the tail is a courtesy; helpers finish it otherwise.
                    let _ = self.tail.compare_exchange(tail, tail.advance(node));
                    return Ok(());
                }
            } else if next == Node::removed() {
                self.finish_removal(tail);
            } else {
                let _ = self.tail.compare_exchange(tail, tail.advance(next));
            }

            backoff.spin();
        }
    }

    /// Removes the element at the front of the queue, or returns `None` if the
    /// queue is empty.
    pub fn dequeue(&self) -> Option<T> {
        let backoff = Backoff::new();
        let guard = self.domain.guard();
        let sentinel = self.sentinel();

        loop {
            let first = guard.protect(SLOT_NODE, &sentinel.next);
            if first.is_null() {
                return None;
            }

            // SAFETY: protected by `guard`.
            let next = unsafe { (*first).next.load(Ordering::SeqCst) };
            if next == Node::removed() {
                // Already dequeued, its owner has not unlinked it yet.
                self.help_tail(&guard);
                continue;
            }

            let tail = self.tail.load(Ordering::SeqCst);
            if tail.ptr == first {
                if next.is_null() {
                    // SAFETY: protected by `guard`.
                    let marked = unsafe { &(*first).next }.compare_exchange(
                        ptr::null_mut(),
                        Node::removed(),
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    );
                    if marked.is_ok() {
                        let _ = sentinel.next.compare_exchange(
                            first,
                            ptr::null_mut(),
                            Ordering::SeqCst,
                            Ordering::SeqCst,
                        );
                        self.retreat_tail(first);
                        // SAFETY: the mark made this call the node's only owner,
                        // and neither `sentinel.next` nor `tail` names it anymore.
                        return Some(unsafe { self.release(&guard, first) });
                    }
                } else {
                    // Never detach the node the tail points at.
                    let _ = self.tail.compare_exchange(tail, tail.advance(next));
                }
            } else if next.is_null() {
                // `first` is the last node but the tail has not reached it yet.
                self.help_tail(&guard);
                continue;
            } else if sentinel
                .next
                .compare_exchange(first, next, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                // SAFETY: the CAS detached `first`, and `tail` is past it.
                return Some(unsafe { self.release(&guard, first) });
            }

            backoff.spin();
        }
    }

    /// Dequeues and drops every element. A no-op on an empty queue.
    pub fn clear(&self) {
        while self.dequeue().is_some() {}
    }

    /// Returns `true` if the queue held no elements at the moment of the call.
    pub fn is_empty(&self) -> bool {
        let guard = self.domain.guard();
        let first = guard.protect(SLOT_NODE, &self.sentinel().next);
        // SAFETY: protected by `guard`.
        first.is_null() || unsafe { (*first).next.load(Ordering::SeqCst) } == Node::removed()
    }

    #[inline]
    fn sentinel(&self) -> &Node<T> {
        // SAFETY: the sentinel lives until `drop`.
        unsafe { &*self.head.as_ptr() }
    }

    fn protect_tail(&self, guard: &Guard<'_, Node<T>>, slot: usize) -> Stamped<Node<T>> {
        let mut tail = self.tail.load(Ordering::SeqCst);
        loop {
            guard.publish(slot, tail.ptr);
            let current = self.tail.load(Ordering::SeqCst);
            if current == tail {
                return tail;
            }
            tail = current;
        }
    }

    /// Performs one pending tail step on behalf of whichever thread left it.
    fn help_tail(&self, guard: &Guard<'_, Node<T>>) {
        let tail = self.protect_tail(guard, SLOT_HELP);
        // SAFETY: protected by `guard`.
        let next = unsafe { (*tail.ptr).next.load(Ordering::SeqCst) };
        if next == Node::removed() {
            self.finish_removal(tail);
        } else if !next.is_null() {
            let _ = self.tail.compare_exchange(tail, tail.advance(next));
        }
        guard.reset(SLOT_HELP);
    }

    /// Completes the detachment of the dequeued last node `tail` points at.
    ///
    /// `sentinel.next` must be cleared before `tail` returns to the sentinel, or
    /// a helper could swing the tail forward onto the dequeued node again.
    fn finish_removal(&self, tail: Stamped<Node<T>>) {
        let _ = self.sentinel().next.compare_exchange(
            tail.ptr,
            ptr::null_mut(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        let _ = self
            .tail
            .compare_exchange(tail, tail.advance(self.head.as_ptr()));
    }

    /// Moves `tail` off `removed` and back to the sentinel.
    fn retreat_tail(&self, removed: *mut Node<T>) {
        let mut tail = self.tail.load(Ordering::SeqCst);
        while tail.ptr == removed {
            match self
                .tail
                .compare_exchange(tail, tail.advance(self.head.as_ptr()))
            {
                Ok(_) => break,
                Err(current) => tail = current,
            }
        }
    }

    /// Takes the payload of a detached node and retires the node.
    ///
    /// # Safety
    ///
    /// `node` must be detached, unreachable from `sentinel.next` and `tail`, and
    /// owned by the calling dequeue.
    unsafe fn release(&self, guard: &Guard<'_, Node<T>>, node: *mut Node<T>) -> T {
        // SAFETY: caller contract.
        let value = unsafe { Node::take(node) };
        guard.reset(SLOT_NODE);
        // SAFETY: detached and retired exactly once; every node comes from `self.alloc`.
        unsafe { guard.retire(node, |n| Node::dealloc_in(&self.alloc, n)) };
        value
    }
}

impl<T, A: NodeAlloc> Drop for ConcurrentQueue<T, A> {
    fn drop(&mut self) {
        self.clear();

        let alloc = &self.alloc;
        // SAFETY: no guard can be alive under `&mut self`; every retired node came
        // from `alloc` and has had its payload moved out.
        self.domain
            .reclaim_all(|node| unsafe { Node::dealloc_in(alloc, node) });

        // SAFETY: the sentinel was leaked from a `Box` in `with_allocator`.
        unsafe { drop(Box::from_raw(self.head.as_ptr())) };
    }
}

impl<T, A: NodeAlloc> fmt::Debug for ConcurrentQueue<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentQueue")
            .field("is_empty", &self.is_empty())
            .finish_non_exhaustive()
    }
}
