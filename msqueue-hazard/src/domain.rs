//! Hazard records and the per-structure domain that owns them.
//!
//! Records are pushed onto a lock-free list and never unlinked while the domain
//! lives. A record is either idle or held by exactly one [`Guard`]; the holder
//! has exclusive use of the record's retired list.

use core::cell::UnsafeCell;
use core::ptr;
use core::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering, fence};

use crate::guard::Guard;
use crate::retired::RetiredList;

/// Number of hazard slots per record.
pub const HAZARD_SLOTS: usize = 2;

/// Minimum retired-list length that triggers a scan.
pub const RETIRE_THRESHOLD: usize = 64;

pub(crate) struct Record<T> {
    pub(crate) hazards: [AtomicPtr<T>; HAZARD_SLOTS],
    active: AtomicBool,
    /// Written once before the record is published, read-only afterwards.
    next: *mut Record<T>,
    pub(crate) retired: UnsafeCell<RetiredList<T>>,
}

impl<T> Record<T> {
    fn new() -> Self {
        Self {
            hazards: core::array::from_fn(|_| AtomicPtr::new(ptr::null_mut())),
            active: AtomicBool::new(true),
            next: ptr::null_mut(),
            retired: UnsafeCell::new(RetiredList::new()),
        }
    }

    fn try_acquire(&self) -> bool {
        !self.active.load(Ordering::Relaxed)
            && self
                .active
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
    }

    pub(crate) fn release(&self) {
        for hazard in &self.hazards {
            hazard.store(ptr::null_mut(), Ordering::Release);
        }
        self.active.store(false, Ordering::Release);
    }
}

/// Reclamation domain for nodes of type `T`.
///
/// The domain never frees a node by itself: every pointer it reclaims is passed
/// to the `free` function supplied at retirement or to [`Domain::reclaim_all`].
/// Retired pointers that are still pending when the domain is dropped without a
/// prior `reclaim_all` are leaked.
pub struct Domain<T> {
    records: AtomicPtr<Record<T>>,
    record_count: AtomicUsize,
    threshold: usize,
}

// SAFETY: the domain only stores pointers to `T`; reclaimed nodes are handed to
// whichever thread scans, so `T` must be `Send`.
unsafe impl<T: Send> Send for Domain<T> {}
// SAFETY: record ownership is arbitrated with CAS, retired lists are only touched
// by the record holder or under `&mut self`.
unsafe impl<T: Send> Sync for Domain<T> {}

impl<T> Default for Domain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Domain<T> {
    /// Creates an empty domain with the default scan threshold.
    pub const fn new() -> Self {
        Self::with_threshold(RETIRE_THRESHOLD)
    }

    /// Creates an empty domain that scans once a record holds `threshold` retired
    /// nodes. The effective threshold never drops below twice the number of
    /// published hazard slots.
    pub const fn with_threshold(threshold: usize) -> Self {
        Self {
            records: AtomicPtr::new(ptr::null_mut()),
            record_count: AtomicUsize::new(0),
            threshold,
        }
    }

    /// Claims a hazard record for the calling thread.
    ///
    /// The returned guard must be dropped before the thread blocks for long:
    /// hazards it publishes keep their nodes alive.
    pub fn guard(&self) -> Guard<'_, T> {
        Guard::new(self, self.acquire())
    }

    /// Number of hazard records allocated so far.
    pub fn record_count(&self) -> usize {
        self.record_count.load(Ordering::Relaxed)
    }

    /// Number of retired nodes not yet reclaimed.
    pub fn pending(&mut self) -> usize {
        self.records_mut()
            .map(|record| record.retired.get_mut().len())
            .sum()
    }

    /// Frees every retired node through `free`.
    ///
    /// Exclusive access guarantees that no guard is alive, so no hazard can still
    /// name a retired node.
    pub fn reclaim_all(&mut self, mut free: impl FnMut(*mut T)) {
        let mut freed = 0;
        for record in self.records_mut() {
            freed += record.retired.get_mut().reclaim_all(&mut free);
        }
        if freed > 0 {
            tracing::trace!(freed, "reclaimed all retired nodes");
        }
    }

    pub(crate) fn scan_threshold(&self) -> usize {
        self.threshold
            .max(2 * HAZARD_SLOTS * self.record_count.load(Ordering::Relaxed))
    }

    /// Frees every node in `retired` that no record currently protects.
    pub(crate) fn scan(&self, retired: &mut RetiredList<T>, free: &mut impl FnMut(*mut T)) {
        // Pairs with the SeqCst publish/validate in `Guard::protect_with`: a hazard
        // that validated before the unlink is visible here.
        fence(Ordering::SeqCst);

        let mut protected = Vec::with_capacity(HAZARD_SLOTS * self.record_count());
        let mut current = self.records.load(Ordering::Acquire);
        while !current.is_null() {
            // SAFETY: records are only freed in `Drop`.
            let record = unsafe { &*current };
            for hazard in &record.hazards {
                let ptr = hazard.load(Ordering::SeqCst);
                if !ptr.is_null() {
                    protected.push(ptr);
                }
            }
            current = record.next;
        }
        protected.sort_unstable();

        let freed = retired.reclaim_unprotected(&protected, free);
        tracing::trace!(freed, kept = retired.len(), "hazard scan");
    }

    fn acquire(&self) -> &Record<T> {
        let mut current = self.records.load(Ordering::Acquire);
        while !current.is_null() {
            // SAFETY: records are only freed in `Drop`.
            let record = unsafe { &*current };
            if record.try_acquire() {
                return record;
            }
            current = record.next;
        }

        let record = Box::into_raw(Box::new(Record::new()));
        let mut head = self.records.load(Ordering::Acquire);
        loop {
            // SAFETY: `record` is not yet reachable by other threads.
            unsafe { (*record).next = head };
            match self
                .records
                .compare_exchange_weak(head, record, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(current) => head = current,
            }
        }
        let count = self.record_count.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(records = count, "allocated hazard record");

        // SAFETY: published records live until the domain drops.
        unsafe { &*record }
    }

    fn records_mut(&mut self) -> impl Iterator<Item = &mut Record<T>> {
        let mut current = *self.records.get_mut();
        core::iter::from_fn(move || {
            if current.is_null() {
                return None;
            }
            // SAFETY: `&mut self` excludes every guard, records are uniquely borrowed
            // one at a time.
            let record = unsafe { &mut *current };
            current = record.next;
            Some(record)
        })
    }
}

impl<T> Drop for Domain<T> {
    fn drop(&mut self) {
        let mut current = *self.records.get_mut();
        while !current.is_null() {
            // SAFETY: every record came from `Box::into_raw` in `acquire`.
            let record = unsafe { Box::from_raw(current) };
            current = record.next;
        }
    }
}
