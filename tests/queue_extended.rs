use msqueue::{ConcurrentQueue, QueueHandle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

struct Counted(Arc<AtomicUsize>);

impl Drop for Counted {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_empty_dequeue() {
    let q: ConcurrentQueue<i32> = ConcurrentQueue::new();
    assert_eq!(q.dequeue(), None);
    assert_eq!(q.dequeue(), None);
    assert!(q.is_empty());
}

#[test]
fn test_fifo_ordering() {
    let q = ConcurrentQueue::new();
    for i in 0..100 {
        q.enqueue(i).unwrap();
    }
    for i in 0..100 {
        assert_eq!(q.dequeue(), Some(i));
    }
    assert_eq!(q.dequeue(), None);
}

#[test]
fn test_many_items() {
    let q = ConcurrentQueue::new();
    let n = 50_000;
    for i in 0..n {
        q.enqueue(i).unwrap();
    }
    for i in 0..n {
        assert_eq!(q.dequeue(), Some(i));
    }
    assert_eq!(q.dequeue(), None);
}

#[test]
fn test_enqueue_dequeue_interleaved() {
    let q = ConcurrentQueue::new();
    for round in 0..100 {
        for i in 0..10 {
            q.enqueue(round * 10 + i).unwrap();
        }
        for i in 0..10 {
            assert_eq!(q.dequeue(), Some(round * 10 + i));
        }
        assert!(q.is_empty());
    }
}

#[test]
fn test_single_item_cycles() {
    let q = ConcurrentQueue::new();
    for i in 0..1000 {
        q.enqueue(i).unwrap();
        assert!(!q.is_empty());
        assert_eq!(q.dequeue(), Some(i));
        assert_eq!(q.dequeue(), None);
    }
}

#[test]
fn test_string_values() {
    let q = ConcurrentQueue::new();
    for i in 0..100 {
        q.enqueue(format!("item-{}", i)).unwrap();
    }
    for i in 0..100 {
        assert_eq!(q.dequeue(), Some(format!("item-{}", i)));
    }
    assert_eq!(q.dequeue(), None);
}

#[test]
fn test_zero_sized_values() {
    let q = ConcurrentQueue::new();
    for _ in 0..10 {
        q.enqueue(()).unwrap();
    }
    for _ in 0..10 {
        assert_eq!(q.dequeue(), Some(()));
    }
    assert_eq!(q.dequeue(), None);
}

#[test]
fn test_empty_after_drain_is_idempotent() {
    let q = ConcurrentQueue::new();
    for i in 0..10 {
        q.enqueue(i).unwrap();
    }
    while q.dequeue().is_some() {}
    for _ in 0..5 {
        assert_eq!(q.dequeue(), None);
    }
}

#[test]
fn test_clear_empty_is_noop() {
    let q: ConcurrentQueue<u32> = ConcurrentQueue::new();
    q.clear();
    q.clear();
    assert_eq!(q.dequeue(), None);

    q.enqueue(7).unwrap();
    assert_eq!(q.dequeue(), Some(7));
}

#[test]
fn test_clear_removes_everything() {
    let drops = Arc::new(AtomicUsize::new(0));
    let q = ConcurrentQueue::new();
    for _ in 0..25 {
        q.enqueue(Counted(drops.clone())).unwrap();
    }

    q.clear();
    assert_eq!(drops.load(Ordering::SeqCst), 25);
    assert!(q.dequeue().is_none());

    // Still usable afterwards.
    q.enqueue(Counted(drops.clone())).unwrap();
    assert!(!q.is_empty());
}

#[test]
fn test_dequeued_values_not_dropped_by_queue() {
    let drops = Arc::new(AtomicUsize::new(0));
    let q = ConcurrentQueue::new();
    q.enqueue(Counted(drops.clone())).unwrap();
    q.enqueue(Counted(drops.clone())).unwrap();

    let held = q.dequeue().unwrap();
    drop(q);
    // Only the element left inside was dropped.
    assert_eq!(drops.load(Ordering::SeqCst), 1);

    drop(held);
    assert_eq!(drops.load(Ordering::SeqCst), 2);
}

/// Dropping after a partial drain drops the remaining values exactly once.
#[test]
fn test_drop_after_partial_dequeue() {
    let drop_count = Arc::new(AtomicUsize::new(0));

    let n = 100;
    {
        let q = ConcurrentQueue::new();
        for _ in 0..n {
            q.enqueue(Counted(Arc::clone(&drop_count))).unwrap();
        }
        for _ in 0..n / 2 {
            q.dequeue();
        }
    }

    assert_eq!(
        drop_count.load(Ordering::SeqCst),
        n,
        "all values must be dropped exactly once"
    );
}

#[test]
fn test_queue_handle_object() {
    let handle: Arc<dyn QueueHandle<String>> = Arc::new(ConcurrentQueue::new());
    handle.enqueue("a".to_string()).unwrap();
    handle.enqueue("b".to_string()).unwrap();
    assert_eq!(handle.dequeue().as_deref(), Some("a"));
    handle.clear();
    assert_eq!(handle.dequeue(), None);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_concurrent_mpmc_sum() {
    let q = Arc::new(ConcurrentQueue::new());
    let total = 4000;
    let producers = 4;
    let consumers = 4;

    let mut handles = vec![];
    for p in 0..producers {
        let q = q.clone();
        handles.push(thread::spawn(move || {
            for i in 0..(total / producers) {
                q.enqueue(p * (total / producers) + i).unwrap();
            }
        }));
    }

    let sum = Arc::new(std::sync::atomic::AtomicU64::new(0));
    for _ in 0..consumers {
        let q = q.clone();
        let sum = sum.clone();
        handles.push(thread::spawn(move || {
            let mut local = 0u64;
            for _ in 0..(total / consumers) {
                loop {
                    if let Some(v) = q.dequeue() {
                        local += v as u64;
                        break;
                    }
                    thread::yield_now();
                }
            }
            sum.fetch_add(local, Ordering::Relaxed);
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    let expected: u64 = (0..total as u64).sum();
    assert_eq!(sum.load(Ordering::SeqCst), expected);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_concurrent_drop_counts() {
    let drops = Arc::new(AtomicUsize::new(0));
    let q = Arc::new(ConcurrentQueue::new());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let q = q.clone();
            let drops = drops.clone();
            thread::spawn(move || {
                for _ in 0..2000 {
                    q.enqueue(Counted(drops.clone())).unwrap();
                    if let Some(v) = q.dequeue() {
                        drop(v);
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    drop(Arc::try_unwrap(q).ok().expect("all threads joined"));
    assert_eq!(drops.load(Ordering::SeqCst), 4 * 2000);
}
