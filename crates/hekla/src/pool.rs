//   Copyright (c) 2024-2026 Anton Kundenko <singaraiona@gmail.com>
//   All rights reserved.
//
//   Permission is hereby granted, free of charge, to any person obtaining a copy
//   of this software and associated documentation files (the "Software"), to deal
//   in the Software without restriction, including without limitation the rights
//   to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
//   copies of the Software, and to permit persons to whom the Software is
//   furnished to do so, subject to the following conditions:
//
//   The above copyright notice and this permission notice shall be included in all
//   copies or substantial portions of the Software.
//
//   THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
//   IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
//   FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
//   AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
//   LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
//   OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
//   SOFTWARE.

//! Process-global work-stealing thread pool.
//!
//! One primitive: parallel-for over `[0, n)` in morsels. Each worker drains
//! its own deque and steals from the injector or its peers on exhaustion.
//! The calling thread participates until every morsel has finished.
//! Cancellation is cooperative: the task group's flag is checked at morsel
//! boundaries, never mid-kernel.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock, RwLock};
use std::time::{Duration, Instant};

use crossbeam_deque::{Injector, Stealer, Worker};
use log::debug;

use crate::error::{Error, Result};

/// Below this element count kernels stay sequential; scheduling overhead
/// dominates on small inputs.
pub const SERIAL_THRESHOLD: usize = 100_000;

/// Smallest morsel worth scheduling.
pub const MIN_MORSEL: usize = 16_384;

const MAX_WORKERS: usize = 32;

// ---------------------------------------------------------------------------
// TaskGroup — shared cancellation flag + optional deadline
// ---------------------------------------------------------------------------

struct GroupInner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
}

/// Shared cancellation state for one logical unit of parallel work.
#[derive(Clone)]
pub struct TaskGroup {
    inner: Arc<GroupInner>,
}

impl TaskGroup {
    pub fn new() -> Self {
        TaskGroup {
            inner: Arc::new(GroupInner {
                cancelled: AtomicBool::new(false),
                deadline: None,
            }),
        }
    }

    /// Group that auto-cancels once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        TaskGroup {
            inner: Arc::new(GroupInner {
                cancelled: AtomicBool::new(false),
                deadline: Some(Instant::now() + timeout),
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
    }

    /// Checked at every morsel boundary.
    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::Acquire) {
            return true;
        }
        if let Some(deadline) = self.inner.deadline {
            if Instant::now() >= deadline {
                self.inner.cancelled.store(true, Ordering::Release);
                return true;
            }
        }
        false
    }

    /// Error check for serial loops that honor the group.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for TaskGroup {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Task — one parallel-for invocation
// ---------------------------------------------------------------------------

type Body<'a> = dyn Fn(usize, usize) -> Result<()> + Sync + 'a;

struct TaskInner {
    // Lifetime erased; `parallel_for` blocks until `remaining` hits zero,
    // so the borrow outlives every worker access.
    body: *const Body<'static>,
    remaining: AtomicUsize,
    group: TaskGroup,
    error: Mutex<Option<Error>>,
    done: Mutex<bool>,
    done_cv: Condvar,
}

unsafe impl Send for TaskInner {}
unsafe impl Sync for TaskInner {}

impl TaskInner {
    fn record_error(&self, err: Error) {
        // First error wins; the rest of the group is cancelled.
        if let Ok(mut slot) = self.error.lock() {
            if slot.is_none() {
                *slot = Some(err);
            }
        }
        self.group.cancel();
    }

    fn finish_morsel(&self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            if let Ok(mut done) = self.done.lock() {
                *done = true;
            }
            self.done_cv.notify_all();
        }
    }
}

#[derive(Clone)]
struct Morsel {
    task: Arc<TaskInner>,
    start: usize,
    end: usize,
}

fn run_morsel(m: &Morsel) {
    if m.task.group.is_cancelled() {
        m.task.record_error(Error::Cancelled);
    } else {
        let body = unsafe { &*m.task.body };
        if let Err(e) = body(m.start, m.end) {
            m.task.record_error(e);
        }
    }
    m.task.finish_morsel();
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

struct Pool {
    injector: Injector<Morsel>,
    stealers: Vec<Stealer<Morsel>>,
    sleep: Mutex<()>,
    wake_cv: Condvar,
    shutdown: AtomicBool,
    workers: usize,
    handles: Mutex<Vec<std::thread::JoinHandle<()>>>,
}

impl Pool {
    fn spawn(workers: usize) -> Result<Arc<Pool>> {
        let locals: Vec<Worker<Morsel>> = (0..workers).map(|_| Worker::new_fifo()).collect();
        let stealers: Vec<Stealer<Morsel>> = locals.iter().map(|w| w.stealer()).collect();
        let pool = Arc::new(Pool {
            injector: Injector::new(),
            stealers,
            sleep: Mutex::new(()),
            wake_cv: Condvar::new(),
            shutdown: AtomicBool::new(false),
            workers,
            handles: Mutex::new(Vec::new()),
        });
        let mut handles = Vec::with_capacity(workers);
        for (i, local) in locals.into_iter().enumerate() {
            let pool = pool.clone();
            let handle = std::thread::Builder::new()
                .name(format!("hekla-worker-{i}"))
                .spawn(move || pool.worker_loop(local))
                .map_err(|e| Error::internal(format!("failed to spawn pool worker: {e}")))?;
            handles.push(handle);
        }
        if let Ok(mut slot) = pool.handles.lock() {
            *slot = handles;
        }
        debug!("thread pool spawned with {workers} workers");
        Ok(pool)
    }

    fn worker_loop(&self, local: Worker<Morsel>) {
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                return;
            }
            match self.find_task(&local) {
                Some(m) => run_morsel(&m),
                None => {
                    // Sleep until new work is injected.
                    if let Ok(guard) = self.sleep.lock() {
                        if self.injector.is_empty() && !self.shutdown.load(Ordering::Acquire) {
                            let _ = self
                                .wake_cv
                                .wait_timeout(guard, Duration::from_millis(50));
                        }
                    }
                }
            }
        }
    }

    fn find_task(&self, local: &Worker<Morsel>) -> Option<Morsel> {
        local.pop().or_else(|| {
            std::iter::repeat_with(|| {
                self.injector
                    .steal_batch_and_pop(local)
                    .or_else(|| self.stealers.iter().map(|s| s.steal()).collect())
            })
            .find(|s| !s.is_retry())
            .and_then(|s| s.success())
        })
    }

    fn wake_all(&self) {
        self.wake_cv.notify_all();
    }

    fn shut_down(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.wake_all();
        if let Ok(mut handles) = self.handles.lock() {
            for h in handles.drain(..) {
                let _ = h.join();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Global pool state
// ---------------------------------------------------------------------------

// Configured worker count; 0 means auto-detect.
static DESIRED_THREADS: AtomicUsize = AtomicUsize::new(0);

fn pool_slot() -> &'static RwLock<Option<Arc<Pool>>> {
    static SLOT: OnceLock<RwLock<Option<Arc<Pool>>>> = OnceLock::new();
    SLOT.get_or_init(|| RwLock::new(None))
}

fn auto_threads() -> usize {
    let cap = std::env::var("HEKLA_MAX_THREADS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(MAX_WORKERS);
    num_cpus::get().min(MAX_WORKERS).min(cap)
}

fn effective_threads() -> usize {
    match DESIRED_THREADS.load(Ordering::Acquire) {
        0 => auto_threads(),
        n => n.min(MAX_WORKERS),
    }
}

/// Set the worker count; `0` restores auto-detection. Takes effect before
/// the next parallel task (the pool rebuilds when idle).
pub fn set_thread_count(n: usize) {
    DESIRED_THREADS.store(n, Ordering::Release);
}

/// `(current, auto_detected)`.
pub fn thread_count() -> (usize, bool) {
    (
        effective_threads(),
        DESIRED_THREADS.load(Ordering::Acquire) == 0,
    )
}

fn current_pool() -> Result<Arc<Pool>> {
    let slot = pool_slot();
    let wanted = effective_threads();
    {
        let guard = slot
            .read()
            .map_err(|_| Error::internal("thread pool lock poisoned"))?;
        if let Some(pool) = guard.as_ref() {
            if pool.workers == wanted {
                return Ok(pool.clone());
            }
        }
    }
    let mut guard = slot
        .write()
        .map_err(|_| Error::internal("thread pool lock poisoned"))?;
    if let Some(pool) = guard.as_ref() {
        if pool.workers == wanted {
            return Ok(pool.clone());
        }
        pool.shut_down();
    }
    let pool = Pool::spawn(wanted)?;
    *guard = Some(pool.clone());
    Ok(pool)
}

// ---------------------------------------------------------------------------
// parallel_for
// ---------------------------------------------------------------------------

/// Morsel size giving each worker roughly eight morsels, floored at
/// [`MIN_MORSEL`].
pub fn default_morsel(n: usize, workers: usize) -> usize {
    (n / (workers.max(1) * 8)).max(MIN_MORSEL)
}

/// Run `f(start, end)` over `[0, n)` in morsels of `morsel` elements on the
/// global pool, observing `group` at every morsel boundary. Returns the
/// first error; remaining morsels of a failed task are skipped.
pub fn parallel_for(
    n: usize,
    morsel: usize,
    group: &TaskGroup,
    f: impl Fn(usize, usize) -> Result<()> + Sync,
) -> Result<()> {
    if n == 0 {
        return group.check();
    }
    let morsel = morsel.max(1);
    let pool = current_pool()?;
    if pool.workers <= 1 || n <= morsel {
        let mut start = 0;
        while start < n {
            group.check()?;
            let end = (start + morsel).min(n);
            f(start, end)?;
            start = end;
        }
        return Ok(());
    }

    let n_morsels = n.div_ceil(morsel);
    let body: &Body<'_> = &f;
    // SAFETY: the task cannot outlive this frame; we block on `done` below
    // before returning, so every worker access to `body` happens while `f`
    // is alive.
    let body: *const Body<'static> =
        unsafe { std::mem::transmute::<&Body<'_>, &'static Body<'static>>(body) };
    let task = Arc::new(TaskInner {
        body,
        remaining: AtomicUsize::new(n_morsels),
        group: group.clone(),
        error: Mutex::new(None),
        done: Mutex::new(false),
        done_cv: Condvar::new(),
    });

    let mut start = 0;
    while start < n {
        let end = (start + morsel).min(n);
        pool.injector.push(Morsel {
            task: task.clone(),
            start,
            end,
        });
        start = end;
    }
    pool.wake_all();

    // The caller helps drain the injector instead of idling.
    while let Some(m) = pool.injector.steal().success() {
        run_morsel(&m);
    }

    // Remaining morsels live in worker-local deques; wait for the last one.
    let mut done = task
        .done
        .lock()
        .map_err(|_| Error::internal("task completion lock poisoned"))?;
    while !*done {
        let (guard, _) = task
            .done_cv
            .wait_timeout(done, Duration::from_millis(1))
            .map_err(|_| Error::internal("task completion lock poisoned"))?;
        done = guard;
    }
    drop(done);

    let err = task
        .error
        .lock()
        .map_err(|_| Error::internal("task error lock poisoned"))?
        .take();
    match err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Parallelize when `n` crosses [`SERIAL_THRESHOLD`], otherwise run inline.
pub fn maybe_parallel(
    n: usize,
    group: &TaskGroup,
    f: impl Fn(usize, usize) -> Result<()> + Sync,
) -> Result<()> {
    if n < SERIAL_THRESHOLD {
        group.check()?;
        return f(0, n);
    }
    let workers = effective_threads();
    parallel_for(n, default_morsel(n, workers), group, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    #[test]
    fn parallel_sum_matches_serial() {
        let n = 1_000_000usize;
        let total = AtomicU64::new(0);
        let group = TaskGroup::new();
        parallel_for(n, 4096, &group, |start, end| {
            let mut local = 0u64;
            for i in start..end {
                local += i as u64;
            }
            total.fetch_add(local, Ordering::Relaxed);
            Ok(())
        })
        .unwrap();
        let expect = (n as u64 - 1) * n as u64 / 2;
        assert_eq!(total.load(Ordering::Relaxed), expect);
    }

    #[test]
    fn cancellation_propagates() {
        let group = TaskGroup::new();
        group.cancel();
        let res = parallel_for(100_000, 1024, &group, |_, _| Ok(()));
        assert_eq!(res, Err(Error::Cancelled));
    }

    #[test]
    fn first_error_wins() {
        let group = TaskGroup::new();
        let res = parallel_for(1_000_000, 1024, &group, |start, _| {
            if start == 0 {
                Err(Error::internal("boom"))
            } else {
                Ok(())
            }
        });
        assert!(res.is_err());
    }

    #[test]
    fn deadline_cancels() {
        let group = TaskGroup::with_timeout(Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(2));
        assert!(group.is_cancelled());
    }

    #[test]
    fn thread_count_reporting() {
        let (n, auto) = thread_count();
        assert!(n >= 1);
        assert!(auto);
    }
}
