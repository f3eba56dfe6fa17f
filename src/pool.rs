//! Persistent work-stealing thread pool.
//!
//! Every data-parallel stage of the pipeline goes through [`ThreadPool::parallel_for`]
//! (or one of its chunked variants). Each worker owns a FIFO queue; an idle
//! worker steals from the back of its peers' queues before going to sleep.
//!
//! The pool is an explicit handle. Callers create one, pass `&ThreadPool`
//! into the stages, and drop it to join the workers.

use std::any::Any;
use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_utils::{Backoff, CachePadded};
use parking_lot::{Condvar, Mutex};

use crate::cpu_caps;

/// Unit of work accepted by [`ThreadPool::enqueue`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

// chunk count per worker for parallel_for, trims the tail when chunks are uneven
const CHUNKS_PER_WORKER: usize = 4;

thread_local! {
    // set on pool worker threads, nested parallel_for calls run inline there
    static IN_WORKER: Cell<bool> = const { Cell::new(false) };
}

struct Shared {
    queues: Vec<CachePadded<Mutex<VecDeque<Task>>>>,
    work_lock: Mutex<()>,
    work_cv: Condvar,
    done_cv: Condvar,
    stop: AtomicBool,
    // submitted and not yet retired
    pending: AtomicUsize,
    // sitting in a queue, not yet picked up by any worker
    queued: AtomicUsize,
}

impl Shared {
    fn new(queue_count: usize) -> Self {
        Shared {
            queues: (0..queue_count)
                .map(|_| CachePadded::new(Mutex::new(VecDeque::new())))
                .collect(),
            work_lock: Mutex::new(()),
            work_cv: Condvar::new(),
            done_cv: Condvar::new(),
            stop: AtomicBool::new(false),
            pending: AtomicUsize::new(0),
            queued: AtomicUsize::new(0),
        }
    }

    fn push(&self, queue_index: usize, task: Task) {
        self.pending.fetch_add(1, Ordering::AcqRel);
        // bump before the push so a fast popper can never underflow the counter
        self.queued.fetch_add(1, Ordering::AcqRel);
        self.queues[queue_index].lock().push_back(task);

        let _guard = self.work_lock.lock();
        self.work_cv.notify_one();
    }

    // own queue, oldest first
    fn pop_local(&self, index: usize) -> Option<Task> {
        let task = self.queues[index].lock().pop_front();
        if task.is_some() {
            self.queued.fetch_sub(1, Ordering::AcqRel);
        }
        task
    }

    // peers' queues, newest first
    fn steal(&self, index: usize) -> Option<Task> {
        let count = self.queues.len();
        for offset in 1..count {
            let victim = (index + offset) % count;
            let task = self.queues[victim].lock().pop_back();
            if task.is_some() {
                self.queued.fetch_sub(1, Ordering::AcqRel);
                return task;
            }
        }
        None
    }

    // parallel_for jobs catch their own panics, only loose enqueue tasks land here
    fn run(&self, task: Task) {
        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            log::warn!("pool task panicked, retiring it and continuing");
        }
        self.retire();
    }

    fn retire(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _guard = self.work_lock.lock();
            self.done_cv.notify_all();
        }
    }

    fn wait_idle(&self) {
        if self.pending.load(Ordering::Acquire) == 0 {
            return;
        }
        let mut guard = self.work_lock.lock();
        while self.pending.load(Ordering::Acquire) != 0 {
            self.done_cv.wait(&mut guard);
        }
    }

    fn should_exit(&self) -> bool {
        self.stop.load(Ordering::Acquire) && self.queued.load(Ordering::Acquire) == 0
    }
}

fn worker_loop(shared: Arc<Shared>, index: usize) {
    IN_WORKER.with(|flag| flag.set(true));
    let backoff = Backoff::new();

    loop {
        if let Some(task) = shared.pop_local(index).or_else(|| shared.steal(index)) {
            shared.run(task);
            backoff.reset();
            continue;
        }

        // spin briefly before parking, chunks of one parallel_for arrive back to back
        if !backoff.is_completed() {
            backoff.snooze();
            continue;
        }

        let mut guard = shared.work_lock.lock();
        while !shared.stop.load(Ordering::Acquire) && shared.queued.load(Ordering::Acquire) == 0 {
            shared.work_cv.wait(&mut guard);
        }
        let exit = shared.should_exit();
        drop(guard);

        if exit {
            break;
        }
        backoff.reset();
    }
}

// blocks in drop until every task submitted so far has retired, unwinding included
struct WaitGuard<'a> {
    pool: &'a ThreadPool,
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.pool.wait();
    }
}

pub struct ThreadPool {
    workers: usize,
    shared: Arc<Shared>,
    handles: Vec<JoinHandle<()>>,
    next_queue: AtomicUsize,
}

impl ThreadPool {
    /// Starts a pool with `workers` workers (at least one).
    ///
    /// A single-worker pool spawns no threads: every task runs inline on the
    /// submitting thread, in submission order.
    pub fn new(workers: usize) -> Self {
        let mut pool = ThreadPool {
            workers: 1,
            shared: Arc::new(Shared::new(1)),
            handles: Vec::new(),
            next_queue: AtomicUsize::new(0),
        };
        pool.start_workers(workers.max(1));
        pool
    }

    /// Pool sized to the detected hardware thread count.
    pub fn with_default_workers() -> Self {
        Self::new(cpu_caps::hw_threads())
    }

    /// Configured worker count.
    pub fn size(&self) -> usize {
        self.workers
    }

    /// Restarts the pool with `workers` workers (at least one).
    ///
    /// Taking `&mut self` means no `parallel_for` can be in flight. Loose
    /// tasks submitted with [`enqueue`](Self::enqueue) are drained before the
    /// old workers are joined.
    pub fn resize(&mut self, workers: usize) {
        let workers = workers.max(1);
        if workers == self.workers {
            return;
        }
        self.wait();
        self.stop_workers();
        self.start_workers(workers);
        log::info!("thread pool resized to {} workers", self.workers);
    }

    /// Submits one task, round-robin across worker queues.
    pub fn enqueue(&self, task: Task) {
        if self.workers <= 1 {
            task();
            return;
        }
        let queue_index = self.next_queue.fetch_add(1, Ordering::Relaxed) % self.shared.queues.len();
        self.shared.push(queue_index, task);
    }

    /// Blocks until every submitted task has retired.
    pub fn wait(&self) {
        self.shared.wait_idle();
    }

    /// Calls `f(i)` exactly once for every `i` in `begin..end`.
    ///
    /// # Panics
    ///
    /// Re-raises the first chunk panic of this call on the calling thread,
    /// with its original payload, after all chunks have retired.
    pub fn parallel_for<F>(&self, begin: usize, end: usize, f: F)
    where
        F: Fn(usize) + Sync,
    {
        self.parallel_for_chunks(begin, end, |range| range.for_each(&f));
    }

    /// Splits `begin..end` into contiguous chunks (about four per worker) and
    /// calls `f` once per chunk, blocking until all chunks are done.
    pub fn parallel_for_chunks<F>(&self, begin: usize, end: usize, f: F)
    where
        F: Fn(Range<usize>) + Sync,
    {
        if end <= begin {
            return;
        }
        let total = end - begin;
        if self.workers <= 1 || total < self.workers || IN_WORKER.with(Cell::get) {
            f(begin..end);
            return;
        }

        let chunk_len = total.div_ceil(self.workers * CHUNKS_PER_WORKER).max(1);
        // first panic payload of this call only, other callers keep their own
        let failure: Mutex<Option<Box<dyn Any + Send>>> = Mutex::new(None);
        let (f, failure_ref) = (&f, &failure);
        let guard = WaitGuard { pool: self };

        let mut start = begin;
        while start < end {
            let stop = (start + chunk_len).min(end);
            let job: Box<dyn FnOnce() + Send + '_> = Box::new(move || {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| f(start..stop))) {
                    log::warn!("parallel_for chunk {}..{} panicked", start, stop);
                    failure_ref.lock().get_or_insert(payload);
                }
            });
            // SAFETY: `guard` waits for every submitted task before this frame
            // returns or unwinds, so the borrows of `f` and `failure` outlive each job.
            let job: Task =
                unsafe { std::mem::transmute::<Box<dyn FnOnce() + Send + '_>, Task>(job) };
            self.enqueue(job);
            start = stop;
        }

        drop(guard);
        if let Some(payload) = failure.into_inner() {
            panic::resume_unwind(payload);
        }
    }

    /// Hands each `chunk_len`-sized piece of `data` to `f` together with its
    /// chunk index. Pieces are disjoint, so `f` may write freely.
    pub fn parallel_chunks_mut<T, F>(&self, data: &mut [T], chunk_len: usize, f: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync,
    {
        if data.is_empty() || chunk_len == 0 {
            return;
        }
        let chunks: Vec<Mutex<&mut [T]>> = data.chunks_mut(chunk_len).map(Mutex::new).collect();
        self.parallel_for(0, chunks.len(), |index| {
            let mut chunk = chunks[index].lock();
            f(index, &mut **chunk);
        });
    }

    fn start_workers(&mut self, workers: usize) {
        self.shared = Arc::new(Shared::new(workers));
        self.next_queue.store(0, Ordering::Relaxed);
        self.handles.clear();
        self.workers = workers;

        if workers <= 1 {
            return;
        }

        for index in 0..workers {
            let shared = Arc::clone(&self.shared);
            let spawned = thread::Builder::new()
                .name(format!("pixmask-worker-{}", index))
                .spawn(move || worker_loop(shared, index));
            match spawned {
                Ok(handle) => self.handles.push(handle),
                Err(e) => {
                    // queues without an owner are still drained by stealing
                    log::warn!("failed to spawn pool worker {}: {}", index, e);
                    break;
                }
            }
        }

        if self.handles.is_empty() {
            log::warn!("no pool workers could be spawned, running inline");
            self.workers = 1;
            return;
        }
        log::info!("thread pool started with {} workers", self.workers);
    }

    fn stop_workers(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        {
            let _guard = self.shared.work_lock.lock();
            self.shared.work_cv.notify_all();
        }
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                log::warn!("pool worker exited abnormally");
            }
        }
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::with_default_workers()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.wait();
        self.stop_workers();
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("workers", &self.workers)
            .field("threads", &self.handles.len())
            .field("pending", &self.shared.pending.load(Ordering::Relaxed))
            .finish()
    }
}
