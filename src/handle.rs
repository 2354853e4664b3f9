use crate::alloc::NodeAlloc;
use crate::error::EnqueueError;
use crate::queue::ConcurrentQueue;

/// Object-safe view of a concurrent FIFO queue.
///
/// Drivers that only need the three queue operations can hold an
/// `Arc<dyn QueueHandle<T>>` and stay independent of the allocation strategy.
pub trait QueueHandle<T>: Send + Sync {
    /// Appends `value` at the back, handing it back if no node could be allocated.
    fn enqueue(&self, value: T) -> Result<(), EnqueueError<T>>;

    /// Removes the front element, or returns `None` if the queue is empty.
    fn dequeue(&self) -> Option<T>;

    /// Removes and drops every element.
    fn clear(&self);
}

impl<T: Send, A: NodeAlloc> QueueHandle<T> for ConcurrentQueue<T, A> {
    #[inline]
    fn enqueue(&self, value: T) -> Result<(), EnqueueError<T>> {
        ConcurrentQueue::enqueue(self, value)
    }

    #[inline]
    fn dequeue(&self) -> Option<T> {
        ConcurrentQueue::dequeue(self)
    }

    #[inline]
    fn clear(&self) {
        ConcurrentQueue::clear(self)
    }
}
