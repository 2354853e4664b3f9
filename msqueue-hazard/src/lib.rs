//! msqueue-hazard: hazard-pointer reclamation for the nodes of one lock-free structure.
//!
//! A [`Domain`] owns a push-only list of hazard records. A thread borrows one
//! record for the length of a single operation through a [`Guard`], publishes the
//! nodes it is about to dereference into the record's slots, and retires nodes it
//! has unlinked. Retired nodes are handed back to the caller-supplied `free`
//! function only once no published slot names them.
//!
//! # Key Features
//!
//! - **Per-structure domains**: reclamation state lives next to the structure it
//!   protects, so freeing can go through that structure's own allocator
//! - **Bounded garbage**: each record scans once its retired list reaches the
//!   domain threshold, which grows with the number of records
//! - **No thread registration**: records are claimed with a CAS and released on drop
//!
//! # Example
//!
//! ```rust
//! use std::sync::atomic::{AtomicPtr, Ordering};
//! use msqueue_hazard::Domain;
//!
//! let domain = Domain::<u64>::new();
//! let shared = AtomicPtr::new(Box::into_raw(Box::new(7)));
//!
//! let guard = domain.guard();
//! let ptr = guard.protect(0, &shared);
//! assert_eq!(unsafe { *ptr }, 7);
//!
//! // Unlink, then retire. The node outlives every guard that protects it.
//! shared.store(std::ptr::null_mut(), Ordering::SeqCst);
//! unsafe { guard.retire(ptr, |p| drop(Box::from_raw(p))) };
//! drop(guard);
//!
//! let mut domain = domain;
//! domain.reclaim_all(|p| unsafe { drop(Box::from_raw(p)) });
//! ```

#![warn(missing_docs)]

mod domain;
mod guard;
mod retired;

pub use domain::{Domain, HAZARD_SLOTS, RETIRE_THRESHOLD};
pub use guard::Guard;
