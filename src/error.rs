use std::fmt;

/// The allocation strategy could not supply memory for a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocError;

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node allocation failed")
    }
}

impl std::error::Error for AllocError {}

/// An enqueue that did not happen.
///
/// The only cause is node allocation failure. The queue is left untouched and
/// the rejected value is handed back.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EnqueueError<T> {
    value: T,
}

impl<T> EnqueueError<T> {
    pub(crate) fn new(value: T) -> Self {
        Self { value }
    }

    /// Returns the value that was not enqueued.
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> fmt::Debug for EnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnqueueError").finish_non_exhaustive()
    }
}

impl<T> fmt::Display for EnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "enqueue failed: {}", AllocError)
    }
}

impl<T> std::error::Error for EnqueueError<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&AllocError)
    }
}
