//! A pointer and a stamp updated together by one 128-bit CAS.
//!
//! Every successful exchange bumps the stamp, so a CAS built from a stale read
//! fails even when the pointer has returned to the value that was read.

use core::fmt;
use core::marker::PhantomData;
use core::ptr;
use core::sync::atomic::Ordering;
use portable_atomic::AtomicU128;

/// A snapshot of a [`StampedPtr`].
pub(crate) struct Stamped<T> {
    pub(crate) ptr: *mut T,
    pub(crate) stamp: u64,
}

impl<T> Clone for Stamped<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Stamped<T> {}

impl<T> PartialEq for Stamped<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr && self.stamp == other.stamp
    }
}

impl<T> Eq for Stamped<T> {}

impl<T> fmt::Debug for Stamped<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stamped")
            .field("ptr", &self.ptr)
            .field("stamp", &self.stamp)
            .finish()
    }
}

impl<T> Stamped<T> {
    /// The value a successful exchange from `self` to `ptr` should install.
    #[inline]
    pub(crate) fn advance(self, ptr: *mut T) -> Self {
        Self {
            ptr,
            stamp: self.stamp.wrapping_add(1),
        }
    }

    #[inline]
    fn pack(self) -> u128 {
        (self.ptr.expose_provenance() as u64 as u128) | ((self.stamp as u128) << 64)
    }

    #[inline]
    fn unpack(value: u128) -> Self {
        Self {
            ptr: ptr::with_exposed_provenance_mut(value as u64 as usize),
            stamp: (value >> 64) as u64,
        }
    }
}

#[repr(align(16))]
pub(crate) struct StampedPtr<T> {
    data: AtomicU128,
    _marker: PhantomData<*mut T>,
}

impl<T> StampedPtr<T> {
    pub(crate) fn new(ptr: *mut T) -> Self {
        Self {
            data: AtomicU128::new(Stamped { ptr, stamp: 0 }.pack()),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn load(&self, order: Ordering) -> Stamped<T> {
        Stamped::unpack(self.data.load(order))
    }

    /// Installs `new` if the pointer and stamp both still equal `current`.
    #[inline]
    pub(crate) fn compare_exchange(
        &self,
        current: Stamped<T>,
        new: Stamped<T>,
    ) -> Result<Stamped<T>, Stamped<T>> {
        self.data
            .compare_exchange(
                current.pack(),
                new.pack(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map(Stamped::unpack)
            .map_err(Stamped::unpack)
    }
}
