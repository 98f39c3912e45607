//! Delayed task scheduling
//!
//! A single worker thread runs posted tasks in deadline order, one at a time,
//! the way a UI message loop runs delayed callbacks.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::lock;

/// Unit of work run by a scheduler
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Trait for delayed-callback schedulers
pub trait Scheduler: Send + Sync {
    /// Run `task` once `delay` has elapsed
    fn post_delayed(&self, delay: Duration, task: Task);

    /// Drop every task that has not started running yet
    fn cancel_pending(&self);
}

struct Entry {
    due: Instant,
    seq: u64,
    task: Task,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so the BinaryHeap pops the earliest deadline first; ties keep post order.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct Queue {
    entries: BinaryHeap<Entry>,
    next_seq: u64,
    quit: bool,
}

#[derive(Default)]
struct Shared {
    queue: Mutex<Queue>,
    wakeup: Condvar,
}

/// Scheduler backed by one dedicated looper thread
pub struct LooperScheduler {
    shared: Arc<Shared>,
    worker: Option<thread::JoinHandle<()>>,
}

impl LooperScheduler {
    /// Spawn the looper thread
    pub fn start() -> Self {
        let shared = Arc::new(Shared::default());
        let worker = {
            let shared = shared.clone();
            thread::Builder::new()
                .name("click-looper".to_string())
                .spawn(move || run_looper(&shared))
        };

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                // Without a worker nothing would ever fire; posts still queue.
                error!("Failed to spawn scheduler thread: {}", e);
                None
            }
        };

        Self { shared, worker }
    }

    /// Number of tasks waiting to run
    pub fn pending(&self) -> usize {
        lock(&self.shared.queue).entries.len()
    }
}

impl Scheduler for LooperScheduler {
    fn post_delayed(&self, delay: Duration, task: Task) {
        let mut queue = lock(&self.shared.queue);
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.entries.push(Entry {
            due: Instant::now() + delay,
            seq,
            task,
        });
        self.shared.wakeup.notify_one();
    }

    fn cancel_pending(&self) {
        let mut queue = lock(&self.shared.queue);
        let dropped = queue.entries.len();
        queue.entries.clear();
        if dropped > 0 {
            debug!("Cancelled {} pending task(s)", dropped);
        }
        self.shared.wakeup.notify_one();
    }
}

impl Drop for LooperScheduler {
    fn drop(&mut self) {
        {
            let mut queue = lock(&self.shared.queue);
            queue.quit = true;
            queue.entries.clear();
        }
        self.shared.wakeup.notify_all();

        if let Some(worker) = self.worker.take() {
            // Dropped from inside one of our own tasks: the loop exits on its own.
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}

fn run_looper(shared: &Shared) {
    info!("Scheduler looper started");

    let mut queue = lock(&shared.queue);
    loop {
        if queue.quit {
            break;
        }

        let now = Instant::now();
        match queue.entries.peek().map(|entry| entry.due) {
            None => {
                queue = shared
                    .wakeup
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            Some(due) if due <= now => {
                let entry = queue.entries.pop();
                drop(queue);
                if let Some(entry) = entry {
                    (entry.task)();
                }
                queue = lock(&shared.queue);
            }
            Some(due) => {
                queue = match shared.wakeup.wait_timeout(queue, due - now) {
                    Ok((guard, _)) => guard,
                    Err(poisoned) => poisoned.into_inner().0,
                };
            }
        }
    }

    info!("Scheduler looper stopped");
}
