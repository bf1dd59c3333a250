//! Single-threaded cooperative dispatcher.
//!
//! Work submitted with [`DispatchHandle::invoke_later`] runs on a later turn
//! of the loop, in FIFO order; [`DispatchHandle::invoke_after`] queues the job
//! once its delay has elapsed. Jobs only run inside
//! [`Dispatcher::run_until_idle`], one at a time, on the calling thread.
//! Nothing is cancellable once submitted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace};

use crate::error::Result;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Owner of the loop. Create one per session.
pub struct Dispatcher {
    runtime: Runtime,
    queue: Mutex<UnboundedReceiver<Job>>,
    handle: DispatchHandle,
}

/// Cloneable submission handle.
#[derive(Clone)]
pub struct DispatchHandle {
    sender: UnboundedSender<Job>,
    pending_timers: Arc<AtomicUsize>,
    runtime: Handle,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pending_timers", &self.handle.pending_timers())
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for DispatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchHandle")
            .field("pending_timers", &self.pending_timers())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Build a dispatcher on a current-thread tokio runtime.
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_time().build()?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = DispatchHandle {
            sender,
            pending_timers: Arc::new(AtomicUsize::new(0)),
            runtime: runtime.handle().clone(),
        };
        Ok(Self {
            runtime,
            queue: Mutex::new(receiver),
            handle,
        })
    }

    /// Handle for submitting work.
    pub fn handle(&self) -> DispatchHandle {
        self.handle.clone()
    }

    /// Run queued jobs, waiting out pending delays, until nothing is left.
    /// Returns the number of jobs run.
    ///
    /// Must not be called from inside a job.
    pub fn run_until_idle(&self) -> usize {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let timers = Arc::clone(&self.handle.pending_timers);

        let ran = self.runtime.block_on(async {
            let mut ran = 0usize;
            loop {
                let job = match queue.try_recv() {
                    Ok(job) => job,
                    Err(_) if timers.load(Ordering::SeqCst) == 0 => break,
                    Err(_) => match queue.recv().await {
                        Some(job) => job,
                        None => break,
                    },
                };
                job();
                ran += 1;
            }
            ran
        });
        trace!(ran, "Dispatcher idle");
        ran
    }
}

impl DispatchHandle {
    /// Queue `job` for a later turn.
    pub fn invoke_later<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.sender.send(Box::new(job)).is_err() {
            debug!("Dispatcher shut down, dropping job");
        }
    }

    /// Queue `job` once `delay` has elapsed.
    pub fn invoke_after<F>(&self, delay: Duration, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if delay.is_zero() {
            self.invoke_later(job);
            return;
        }

        self.pending_timers.fetch_add(1, Ordering::SeqCst);
        let sender = self.sender.clone();
        let timers = Arc::clone(&self.pending_timers);
        let job: Job = Box::new(job);
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if sender.send(job).is_err() {
                debug!("Dispatcher shut down, dropping delayed job");
            }
            timers.fetch_sub(1, Ordering::SeqCst);
        });
    }

    /// Delayed jobs not yet queued.
    pub fn pending_timers(&self) -> usize {
        self.pending_timers.load(Ordering::SeqCst)
    }
}
