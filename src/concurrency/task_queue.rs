/// Bounded multi-producer/multi-consumer task queue.
///
/// A full queue blocks the pushing thread until a consumer frees a slot;
/// tasks are never dropped. Closing wakes every blocked consumer, and a
/// closed queue keeps serving already-queued tasks before reporting empty.
use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

pub(crate) type Task = Box<dyn FnOnce() + Send + 'static>;

pub(crate) struct TaskQueue {
    inner: Mutex<QueueInner>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

struct QueueInner {
    tasks: VecDeque<Task>,
    closed: bool,
}

impl TaskQueue {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "task queue capacity must be non-zero");
        Self {
            inner: Mutex::new(QueueInner {
                tasks: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// Enqueue a task, blocking while the queue is at capacity.
    pub fn push(&self, task: Task) {
        let mut inner = self.inner.lock();
        assert!(!inner.closed, "push() on a closed task queue");
        while inner.tasks.len() == self.capacity {
            self.not_full.wait(&mut inner);
            assert!(!inner.closed, "task queue closed while a producer was blocked");
        }
        inner.tasks.push_back(task);
        drop(inner);
        self.not_empty.notify_one();
    }

    /// Dequeue a task, blocking while the queue is empty. Returns `None`
    /// once the queue has been closed and fully drained.
    pub fn pop(&self) -> Option<Task> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(task) = inner.tasks.pop_front() {
                drop(inner);
                self.not_full.notify_one();
                return Some(task);
            }
            if inner.closed {
                return None;
            }
            self.not_empty.wait(&mut inner);
        }
    }

    /// Mark the queue closed and wake everyone blocked on it.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        drop(inner);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }
}
