//! msqueue: a lock-free unbounded MPMC FIFO queue.
//!
//! A Michael–Scott style linked-list queue with a permanent sentinel head, a
//! stamped tail pointer and per-node atomic `next` pointers. Threads coordinate
//! only through CAS retry loops with helping, so some thread always completes
//! its operation.
//!
//! ## Features
//!
//! - `ConcurrentQueue`: the queue, generic over its node allocation strategy.
//! - `NodeAlloc`: pluggable allocation; `Global` uses the process allocator.
//! - `QueueHandle`: object-safe view for drivers that hold `dyn` queues.
//!
//! Dequeued nodes are reclaimed through a per-queue hazard-pointer domain
//! ([`msqueue_hazard`]), never while another thread may still read them.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//! use msqueue::ConcurrentQueue;
//!
//! let q = Arc::new(ConcurrentQueue::new());
//!
//! let producers: Vec<_> = (0..4)
//!     .map(|p| {
//!         let q = q.clone();
//!         thread::spawn(move || {
//!             for i in 0..100 {
//!                 q.enqueue(p * 100 + i).unwrap();
//!             }
//!         })
//!     })
//!     .collect();
//! for h in producers {
//!     h.join().unwrap();
//! }
//!
//! let mut seen = 0;
//! while q.dequeue().is_some() {
//!     seen += 1;
//! }
//! assert_eq!(seen, 400);
//! ```

#![warn(missing_docs)]

pub mod alloc;
mod error;
mod handle;
mod node;
mod queue;
mod stamped;

pub use alloc::{Global, NodeAlloc};
pub use error::{AllocError, EnqueueError};
pub use handle::QueueHandle;
pub use queue::ConcurrentQueue;
