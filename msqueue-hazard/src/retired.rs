//! Per-record list of nodes waiting for reclamation.

/// Nodes retired through one hazard record.
///
/// Only the thread currently holding the record touches the list, so it needs no
/// synchronization of its own.
pub(crate) struct RetiredList<T> {
    nodes: Vec<*mut T>,
}

impl<T> RetiredList<T> {
    pub(crate) const fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    #[inline]
    pub(crate) fn push(&mut self, ptr: *mut T) {
        self.nodes.push(ptr);
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Frees every node absent from `protected`, which must be sorted.
    /// Returns how many nodes were freed.
    pub(crate) fn reclaim_unprotected(
        &mut self,
        protected: &[*mut T],
        free: &mut impl FnMut(*mut T),
    ) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|&ptr| {
            if protected.binary_search(&ptr).is_ok() {
                true
            } else {
                free(ptr);
                false
            }
        });
        before - self.nodes.len()
    }

    pub(crate) fn reclaim_all(&mut self, free: &mut impl FnMut(*mut T)) -> usize {
        let freed = self.nodes.len();
        for ptr in self.nodes.drain(..) {
            free(ptr);
        }
        freed
    }
}
