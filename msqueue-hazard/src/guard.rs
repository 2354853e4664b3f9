//! RAII access to one hazard record.

use core::marker::PhantomData as marker;
use core::sync::atomic::{AtomicPtr, Ordering};

use crate::domain::{Domain, Record};

/// A claimed hazard record.
///
/// Pointers published through a guard stay allocated until the slot is
/// overwritten or the guard is dropped. Dropping the guard clears every slot and
/// returns the record to the domain; its retired list stays with the record and
/// is scanned by the next holder.
pub struct Guard<'d, T> {
    domain: &'d Domain<T>,
    record: &'d Record<T>,
    // The retired list behind `record` is unsynchronized, keep the guard on its thread.
    marker: marker<*mut ()>,
}

impl<'d, T> Guard<'d, T> {
    pub(crate) fn new(domain: &'d Domain<T>, record: &'d Record<T>) -> Self {
        Self {
            domain,
            record,
            marker,
        }
    }

    /// Loads `src` and protects the loaded pointer in `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= HAZARD_SLOTS`.
    #[inline]
    pub fn protect(&self, slot: usize, src: &AtomicPtr<T>) -> *mut T {
        self.protect_with(slot, || src.load(Ordering::SeqCst))
    }

    /// Protects the pointer produced by `load`, re-running `load` until the
    /// published value is confirmed to still be current.
    ///
    /// `load` must read the shared location the pointer is reachable from; a
    /// pointer that location no longer holds may already be retired.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= HAZARD_SLOTS`.
    #[inline]
    pub fn protect_with(&self, slot: usize, mut load: impl FnMut() -> *mut T) -> *mut T {
        let mut ptr = load();
        loop {
            self.publish(slot, ptr);
            let current = load();
            if current == ptr {
                return ptr;
            }
            ptr = current;
        }
    }

    /// Publishes `ptr` in `slot` without validation.
    ///
    /// The caller must re-read the pointer's source afterwards and only
    /// dereference `ptr` if the source still holds it.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= HAZARD_SLOTS`.
    #[inline]
    pub fn publish(&self, slot: usize, ptr: *mut T) {
        self.record.hazards[slot].store(ptr, Ordering::SeqCst);
    }

    /// Clears `slot`.
    #[inline]
    pub fn reset(&self, slot: usize) {
        self.record.hazards[slot].store(core::ptr::null_mut(), Ordering::Release);
    }

    /// Retires `ptr`; it is passed to `free` once no hazard names it.
    ///
    /// Retiring may trigger a scan of the whole domain, freeing other nodes
    /// retired through this record as well.
    ///
    /// # Safety
    ///
    /// - `ptr` must already be unreachable from every shared location, so that
    ///   no thread can newly protect it.
    /// - `ptr` must not be retired more than once.
    /// - `free` must be able to free every node retired through this domain.
    pub unsafe fn retire(&self, ptr: *mut T, mut free: impl FnMut(*mut T)) {
        // SAFETY: the record is held by this guard only.
        let retired = unsafe { &mut *self.record.retired.get() };
        retired.push(ptr);
        if retired.len() >= self.domain.scan_threshold() {
            self.domain.scan(retired, &mut free);
        }
    }
}

impl<T> Drop for Guard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.record.release();
    }
}
