/// Fixed-size worker pool driving both parallel phases of a draw call.
///
/// Tasks flow through a bounded queue (see `task_queue`); completion of
/// fire-and-forget dispatches is tracked with atomic submitted/finished
/// counters and a condition-variable barrier rather than per-task futures.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

use super::task_queue::{Task, TaskQueue};

/// Queue slots before producers start blocking (backpressure).
const TASK_QUEUE_CAPACITY: usize = 256;

/// Future for a single task submitted with [`WorkerPool::execute`].
pub struct TaskFuture<R> {
    state: Arc<FutureState<R>>,
}

struct FutureState<R> {
    result: Mutex<Option<R>>,
    ready: Condvar,
}

impl<R> TaskFuture<R> {
    /// Block until the task has run, then take its result.
    pub fn wait(self) -> R {
        let mut slot = self.state.result.lock();
        while slot.is_none() {
            self.state.ready.wait(&mut slot);
        }
        slot.take().expect("future resolved without a result")
    }
}

struct PoolShared {
    queue: TaskQueue,
    submitted: AtomicUsize,
    finished: AtomicUsize,
    done_mutex: Mutex<()>,
    all_done: Condvar,
}

/// A task that panicked would strand the phase barrier (its finished tick
/// never happens), so treat it like the contract violation it is and take
/// the process down instead of deadlocking the caller.
struct AbortOnPanic;

impl Drop for AbortOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            log::error!("worker task panicked; aborting");
            std::process::abort();
        }
    }
}

pub struct WorkerPool {
    shared: Arc<PoolShared>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `num_threads` workers consuming the shared task queue.
    pub fn new(num_threads: usize) -> Self {
        assert!(num_threads > 0, "worker pool needs at least one thread");

        let shared = Arc::new(PoolShared {
            queue: TaskQueue::new(TASK_QUEUE_CAPACITY),
            submitted: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
            done_mutex: Mutex::new(()),
            all_done: Condvar::new(),
        });

        let workers = (0..num_threads)
            .map(|i| {
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("tilerast-worker-{i}"))
                    .spawn(move || Self::run(shared))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        log::debug!("worker pool started with {num_threads} threads");
        Self { shared, workers }
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Submit a single task and get a future for its result.
    pub fn execute<F, R>(&self, f: F) -> TaskFuture<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let state = Arc::new(FutureState {
            result: Mutex::new(None),
            ready: Condvar::new(),
        });

        let task_state = Arc::clone(&state);
        self.submit(Box::new(move || {
            let value = f();
            let mut slot = task_state.result.lock();
            *slot = Some(value);
            task_state.ready.notify_all();
        }));

        TaskFuture { state }
    }

    /// Partition `[0, num_jobs)` into contiguous groups of `group_size` and
    /// submit one task per group; each task calls `job(i)` for every index
    /// in its sub-range. Completion is observed with
    /// [`WorkerPool::wait_for_all_done`], not per-task futures.
    pub fn dispatch<F>(&self, num_jobs: usize, group_size: usize, job: F)
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        assert!(
            num_jobs != 0 && group_size != 0,
            "dispatch(): num_jobs and group_size must be non-zero"
        );

        let group_count = (num_jobs + group_size - 1) / group_size;
        let job = Arc::new(job);

        for gi in 0..group_count {
            let job = Arc::clone(&job);
            self.submit(Box::new(move || {
                let start = gi * group_size;
                let end = (start + group_size).min(num_jobs);
                for i in start..end {
                    job(i);
                }
            }));
        }
    }

    /// Barrier: block until every submitted task has finished. New
    /// submissions must not race with an in-flight wait from the same
    /// logical phase.
    pub fn wait_for_all_done(&self) {
        let mut guard = self.shared.done_mutex.lock();
        while self.shared.finished.load(Ordering::Acquire)
            != self.shared.submitted.load(Ordering::Acquire)
        {
            self.shared.all_done.wait(&mut guard);
        }
    }

    fn submit(&self, task: Task) {
        // Counted before the push so a fast worker can never observe
        // finished > submitted.
        self.shared.submitted.fetch_add(1, Ordering::AcqRel);
        self.shared.queue.push(task);
    }

    fn run(shared: Arc<PoolShared>) {
        while let Some(task) = shared.queue.pop() {
            let guard = AbortOnPanic;
            task();
            std::mem::forget(guard);

            let finished = shared.finished.fetch_add(1, Ordering::AcqRel) + 1;
            if finished == shared.submitted.load(Ordering::Acquire) {
                // Taking the lock pairs with the waiter's predicate check,
                // closing the window for a lost wakeup.
                let _done = shared.done_mutex.lock();
                shared.all_done.notify_all();
            }
        }
    }
}

impl Drop for WorkerPool {
    /// Drain-then-join shutdown: workers finish everything still queued
    /// before exiting; no task is silently lost.
    fn drop(&mut self) {
        self.shared.queue.close();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        log::debug!("worker pool shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn execute_resolves_future_with_result() {
        let pool = WorkerPool::new(2);
        let future = pool.execute(|| 6 * 7);
        assert_eq!(future.wait(), 42);
    }

    #[test]
    fn execute_many_futures_resolve_independently() {
        let pool = WorkerPool::new(4);
        let futures: Vec<_> = (0..32).map(|i| pool.execute(move || i * i)).collect();
        for (i, future) in futures.into_iter().enumerate() {
            assert_eq!(future.wait(), i * i);
        }
    }

    #[test]
    fn dispatch_runs_every_index_exactly_once() {
        for threads in [1, 2, 8] {
            let pool = WorkerPool::new(threads);
            let hits: Arc<Vec<AtomicU32>> =
                Arc::new((0..100).map(|_| AtomicU32::new(0)).collect());

            let task_hits = Arc::clone(&hits);
            pool.dispatch(100, 10, move |i| {
                task_hits[i].fetch_add(1, Ordering::SeqCst);
            });
            pool.wait_for_all_done();

            for (i, hit) in hits.iter().enumerate() {
                assert_eq!(hit.load(Ordering::SeqCst), 1, "index {i} ({threads} threads)");
            }
        }
    }

    #[test]
    fn dispatch_handles_ragged_final_group() {
        let pool = WorkerPool::new(3);
        let sum = Arc::new(AtomicUsize::new(0));

        let task_sum = Arc::clone(&sum);
        pool.dispatch(17, 5, move |i| {
            task_sum.fetch_add(i, Ordering::SeqCst);
        });
        pool.wait_for_all_done();

        assert_eq!(sum.load(Ordering::SeqCst), (0..17usize).sum::<usize>());
    }

    #[test]
    fn wait_with_nothing_submitted_returns_immediately() {
        let pool = WorkerPool::new(2);
        pool.wait_for_all_done();
    }

    #[test]
    fn wait_acts_as_barrier_between_phases() {
        let pool = WorkerPool::new(4);
        let phase_one = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&phase_one);
        pool.dispatch(64, 4, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        pool.wait_for_all_done();
        assert_eq!(phase_one.load(Ordering::SeqCst), 64);

        // A second phase on the same pool starts from a clean barrier.
        let phase_two = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&phase_two);
        pool.dispatch(8, 8, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        pool.wait_for_all_done();
        assert_eq!(phase_two.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn shutdown_drains_queued_tasks() {
        let ran = Arc::new(AtomicUsize::new(0));
        {
            let pool = WorkerPool::new(1);
            for _ in 0..50 {
                let ran = Arc::clone(&ran);
                pool.execute(move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                });
            }
            // Dropping the pool must not lose queued work.
        }
        assert_eq!(ran.load(Ordering::SeqCst), 50);
    }

    #[test]
    #[should_panic(expected = "must be non-zero")]
    fn zero_jobs_dispatch_panics() {
        let pool = WorkerPool::new(1);
        pool.dispatch(0, 4, |_| {});
    }

    #[test]
    #[should_panic(expected = "must be non-zero")]
    fn zero_group_size_dispatch_panics() {
        let pool = WorkerPool::new(1);
        pool.dispatch(4, 0, |_| {});
    }
}
