//! Bounded-concurrency task execution.
//!
//! [`TaskExecutor`] maps a blocking worker over a lazily pulled sequence using a
//! fixed pool of OS threads. Every thread pulls its next item from one shared
//! cursor only when it is idle, so no more than `max_threads` worker calls are
//! ever running and the input is never materialized. Outcomes are streamed back
//! through a bounded channel in completion order.
//!
//! The executor imposes no timeout. A worker that never returns keeps its slot
//! busy for the rest of the run, so workers must bound their own network
//! operations.

use netsweep_core::{ConfigError, Error, Result, TaskError, TaskOutcome};
use parking_lot::Mutex;
use std::any::Any;
use std::iter::FusedIterator;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Worker pool size used when none is configured
pub const DEFAULT_THREADS: usize = 6;

/// Lifecycle of a running pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    /// Workers are pulling fresh items
    Filling,
    /// Input is exhausted or stopped; in-flight work is finishing
    Draining,
    /// All workers exited and every outcome was delivered
    Done,
}

/// Fixed-size worker pool
#[derive(Debug, Clone, Copy)]
pub struct TaskExecutor {
    max_threads: usize,
}

impl Default for TaskExecutor {
    fn default() -> Self {
        Self {
            max_threads: DEFAULT_THREADS,
        }
    }
}

/// Flags shared between the pool and its [`Outcomes`] handle.
#[derive(Debug, Default)]
struct Control {
    stop: AtomicBool,
    exhausted: AtomicBool,
    in_flight: AtomicUsize,
}

impl TaskExecutor {
    /// Create an executor running at most `max_threads` workers at once
    pub fn new(max_threads: usize) -> Result<Self> {
        if max_threads == 0 {
            return Err(ConfigError::InvalidThreads(max_threads).into());
        }
        Ok(Self { max_threads })
    }

    /// Maximum number of concurrent worker invocations
    #[must_use]
    pub const fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// Runs `worker` over `items` and returns the stream of outcomes.
    ///
    /// Every pulled item yields exactly one [`TaskOutcome`]. Worker errors are
    /// wrapped in [`TaskError::Failed`] and panics in [`TaskError::Panicked`];
    /// neither stops the pool.
    ///
    /// The returned iterator blocks while waiting for results, so it must be
    /// consumed from a plain thread rather than from inside an async runtime.
    pub fn run<I, T, R, E, F>(&self, items: I, worker: F) -> Result<Outcomes<T, R, E>>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
        T: Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(&T) -> std::result::Result<R, E> + Send + Sync + 'static,
    {
        let cursor = Arc::new(Mutex::new(Some(items.into_iter())));
        let control = Arc::new(Control::default());
        let worker = Arc::new(worker);
        let (tx, rx) = mpsc::channel(self.max_threads);

        let mut handles = Vec::with_capacity(self.max_threads);
        for id in 0..self.max_threads {
            let cursor = Arc::clone(&cursor);
            let control = Arc::clone(&control);
            let worker = Arc::clone(&worker);
            let tx = tx.clone();

            let spawned = thread::Builder::new()
                .name(format!("netsweep-worker-{id}"))
                .spawn(move || work_loop(id, &cursor, &control, worker.as_ref(), &tx));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) if handles.is_empty() => return Err(Error::Spawn(e)),
                Err(e) => {
                    warn!(
                        started = handles.len(),
                        error = %e,
                        "running with a reduced worker pool"
                    );
                    break;
                }
            }
        }

        debug!(threads = handles.len(), "worker pool started");

        Ok(Outcomes {
            rx: Some(rx),
            control,
            handles,
        })
    }
}

/// Pulls one item under the cursor lock.
///
/// The iterator is dropped on first exhaustion so it is never polled again.
fn next_item<I: Iterator>(cursor: &Mutex<Option<I>>, control: &Control) -> Option<I::Item> {
    let mut guard = cursor.lock();
    let items = guard.as_mut()?;

    if let Some(item) = items.next() {
        control.in_flight.fetch_add(1, Ordering::AcqRel);
        Some(item)
    } else {
        *guard = None;
        control.exhausted.store(true, Ordering::Release);
        None
    }
}

fn work_loop<I, T, R, E, F>(
    id: usize,
    cursor: &Mutex<Option<I>>,
    control: &Control,
    worker: &F,
    tx: &mpsc::Sender<TaskOutcome<T, R, E>>,
) where
    I: Iterator<Item = T>,
    F: Fn(&T) -> std::result::Result<R, E>,
{
    while !control.stop.load(Ordering::Acquire) {
        let Some(input) = next_item(cursor, control) else {
            break;
        };

        let result = match panic::catch_unwind(AssertUnwindSafe(|| worker(&input))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(TaskError::Failed(e)),
            Err(payload) => {
                warn!(worker = id, "worker panicked");
                Err(TaskError::Panicked(panic_message(payload.as_ref())))
            }
        };

        let delivered = tx.blocking_send(TaskOutcome { input, result }).is_ok();
        control.in_flight.fetch_sub(1, Ordering::AcqRel);

        if !delivered {
            debug!(worker = id, "outcome stream closed");
            break;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("non-string panic payload"))
}

/// Stream of outcomes from a running pool.
///
/// Ends once the input is exhausted and every in-flight worker finished.
/// Dropping it early stops dispatch and joins all worker threads; workers
/// already running are allowed to finish their current item.
pub struct Outcomes<T, R, E> {
    rx: Option<mpsc::Receiver<TaskOutcome<T, R, E>>>,
    control: Arc<Control>,
    handles: Vec<JoinHandle<()>>,
}

impl<T, R, E> Outcomes<T, R, E> {
    /// Stops dispatching new items.
    ///
    /// Outcomes of items already in flight are still delivered.
    pub fn stop(&self) {
        self.control.stop.store(true, Ordering::Release);
    }

    /// Current pool state
    #[must_use]
    pub fn state(&self) -> ExecutorState {
        if self.rx.is_none() {
            ExecutorState::Done
        } else if self.control.exhausted.load(Ordering::Acquire)
            || self.control.stop.load(Ordering::Acquire)
        {
            ExecutorState::Draining
        } else {
            ExecutorState::Filling
        }
    }

    /// Number of items pulled whose outcome has not been handed over yet
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.control.in_flight.load(Ordering::Acquire)
    }

    fn shutdown(&mut self) {
        // Closing the receiver releases workers blocked on a full channel.
        self.rx = None;
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread terminated abnormally");
            }
        }
    }
}

impl<T, R, E> Iterator for Outcomes<T, R, E> {
    type Item = TaskOutcome<T, R, E>;

    fn next(&mut self) -> Option<Self::Item> {
        let outcome = self.rx.as_mut()?.blocking_recv();
        if outcome.is_none() {
            self.shutdown();
        }
        outcome
    }
}

impl<T, R, E> FusedIterator for Outcomes<T, R, E> {}

impl<T, R, E> Drop for Outcomes<T, R, E> {
    fn drop(&mut self) {
        self.stop();
        self.shutdown();
    }
}
