//! Single-worker command dispatcher.
//!
//! Every native call is funnelled onto one dedicated thread. Callers on any thread
//! submit an operation and block for its result; the worker runs operations in
//! FIFO order, one at a time, with exclusive access to the backend.

use std::any::Any;
use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use audio_backend::AudioBackend;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::DispatcherConfig;
use crate::error::{EngineError, Result};

/// The backend, shared only so the worker can take it; callers never lock it.
pub type SharedBackend = Arc<Mutex<Box<dyn AudioBackend>>>;

static NEXT_DISPATCHER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    // id of the dispatcher whose worker is running on this thread
    static WORKER_OF: Cell<Option<u64>> = const { Cell::new(None) };
}

trait Envelope: Send {
    fn id(&self) -> u64;
    fn run(self: Box<Self>, backend: &mut dyn AudioBackend);
}

struct Call<R, F> {
    id: u64,
    op: F,
    reply: Sender<Result<R>>,
}

impl<R, F> Envelope for Call<R, F>
where
    R: Send + 'static,
    F: FnOnce(&mut dyn AudioBackend) -> Result<R> + Send + 'static,
{
    fn id(&self) -> u64 {
        self.id
    }

    fn run(self: Box<Self>, backend: &mut dyn AudioBackend) {
        let Call { id, op, reply } = *self;
        let result = match catch_unwind(AssertUnwindSafe(|| op(backend))) {
            Ok(result) => result,
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                error!(command = id, panic = %msg, "dispatched operation panicked");
                Err(EngineError::OperationPanicked(msg))
            }
        };
        if reply.send(result).is_err() {
            // submitter timed out and went away
            debug!(command = id, "result dropped, no receiver");
        }
    }
}

enum Command {
    Run(Box<dyn Envelope>),
    Shutdown,
}

struct Worker {
    tx: Sender<Command>,
    handle: JoinHandle<()>,
    // disconnects when the worker thread exits, however it exits
    exited: Receiver<()>,
    abort: Arc<AtomicBool>,
}

impl Worker {
    fn thread_id(&self) -> ThreadId {
        self.handle.thread().id()
    }

    fn wait_exit(&self, timeout: Duration) -> bool {
        matches!(
            self.exited.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }
}

pub struct Dispatcher {
    id: u64,
    backend: SharedBackend,
    config: DispatcherConfig,
    worker: Mutex<Option<Worker>>,
    next_command: AtomicU64,
    queued: Arc<AtomicUsize>,
    #[cfg(test)]
    ready_delay: Duration,
}

impl Dispatcher {
    pub fn new(backend: SharedBackend, config: DispatcherConfig) -> Self {
        Self {
            id: NEXT_DISPATCHER_ID.fetch_add(1, Ordering::Relaxed),
            backend,
            config,
            worker: Mutex::new(None),
            next_command: AtomicU64::new(0),
            queued: Arc::new(AtomicUsize::new(0)),
            #[cfg(test)]
            ready_delay: Duration::ZERO,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Spawn the worker and run the backend's `initialize` on it.
    ///
    /// Idempotent. Initialisation is queued before any other caller can reach the
    /// worker, so it is always the first command executed. If it fails the worker
    /// is stopped again and the error returned.
    pub fn start(&self) -> Result<()> {
        let mut slot = self.worker.lock();
        if slot.is_some() {
            return Ok(());
        }

        let worker = self.spawn_worker()?;
        let init = self.enqueue(&worker, |backend: &mut dyn AudioBackend| {
            backend.initialize()?;
            Ok(())
        })?;
        let thread = worker.thread_id();
        *slot = Some(worker);
        drop(slot);

        match self.wait(&init, Some(self.config.startup_timeout())) {
            Ok(()) => {
                info!(name = %self.config.thread_name, ?thread, "dispatcher started");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "backend initialization failed, stopping dispatcher");
                self.stop();
                Err(e)
            }
        }
    }

    fn spawn_worker(&self) -> Result<Worker> {
        let (tx, rx) = unbounded::<Command>();
        let (ready_tx, ready_rx) = bounded::<()>(1);
        let (exit_tx, exit_rx) = bounded::<()>(0);
        let abort = Arc::new(AtomicBool::new(false));

        let ctx = WorkerContext {
            dispatcher: self.id,
            backend: self.backend.clone(),
            rx,
            abort: abort.clone(),
            queued: self.queued.clone(),
            poll_interval: self.config.poll_interval(),
        };
        #[cfg(test)]
        let ready_delay = self.ready_delay;
        let handle = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || {
                let _exit = exit_tx;
                WORKER_OF.with(|w| w.set(Some(ctx.dispatcher)));
                #[cfg(test)]
                thread::sleep(ready_delay);
                let _ = ready_tx.send(());
                if let Err(payload) = catch_unwind(AssertUnwindSafe(|| ctx.run())) {
                    error!(
                        panic = %panic_message(payload.as_ref()),
                        "dispatcher worker crashed"
                    );
                }
            })
            .map_err(|e| EngineError::Spawn(e.to_string()))?;

        let startup = self.config.startup_timeout();
        if ready_rx.recv_timeout(startup).is_err() {
            abort.store(true, Ordering::SeqCst);
            drop(tx);
            error!(timeout = ?startup, "dispatcher worker did not report ready");
            return Err(EngineError::StartupTimeout(startup));
        }

        Ok(Worker {
            tx,
            handle,
            exited: exit_rx,
            abort,
        })
    }

    /// Run `op` on the worker and wait for its result.
    ///
    /// Errors returned by `op` come back unchanged. With a `timeout` the wait is
    /// bounded, but the operation is not cancelled: it may still run later.
    pub fn submit<R, F>(&self, op: F, timeout: Option<Duration>) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut dyn AudioBackend) -> Result<R> + Send + 'static,
    {
        if self.on_worker_thread() {
            return Err(EngineError::ReentrantSubmit);
        }
        let pending = {
            let slot = self.worker.lock();
            let worker = slot.as_ref().ok_or(EngineError::NotStarted)?;
            self.enqueue(worker, op)?
        };
        self.wait(&pending, timeout)
    }

    /// Like [`submit`](Self::submit), for operations whose result owns a native
    /// resource.
    ///
    /// If the caller stops waiting before the result is handed over, `reclaim` runs
    /// on the worker with the orphaned value instead of it being dropped unseen.
    pub fn submit_reclaimable<R, F, C>(
        &self,
        op: F,
        reclaim: C,
        timeout: Option<Duration>,
    ) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut dyn AudioBackend) -> Result<R> + Send + 'static,
        C: FnOnce(R, &mut dyn AudioBackend) + Send + 'static,
    {
        let Some(limit) = timeout else {
            return self.submit(op, None);
        };
        if self.on_worker_thread() {
            return Err(EngineError::ReentrantSubmit);
        }

        // both sides decide under this lock, so a value is either delivered or reclaimed
        let handoff = Arc::new(Mutex::new(Handoff::Waiting));
        let worker_side = handoff.clone();
        let wrapped = move |backend: &mut dyn AudioBackend| -> Result<R> {
            let value = op(backend)?;
            let mut state = worker_side.lock();
            if *state == Handoff::Abandoned {
                drop(state);
                reclaim(value, backend);
                return Err(EngineError::Timeout(limit));
            }
            *state = Handoff::Delivered;
            Ok(value)
        };

        let pending = {
            let slot = self.worker.lock();
            let worker = slot.as_ref().ok_or(EngineError::NotStarted)?;
            self.enqueue(worker, wrapped)?
        };
        match self.wait(&pending, timeout) {
            Err(EngineError::Timeout(waited)) => {
                let mut state = handoff.lock();
                if *state == Handoff::Delivered {
                    // the reply is already on its way
                    drop(state);
                    return pending.rx.recv().map_err(|_| EngineError::WorkerStopped)?;
                }
                *state = Handoff::Abandoned;
                Err(EngineError::Timeout(waited))
            }
            other => other,
        }
    }

    fn enqueue<R, F>(&self, worker: &Worker, op: F) -> Result<Pending<R>>
    where
        R: Send + 'static,
        F: FnOnce(&mut dyn AudioBackend) -> Result<R> + Send + 'static,
    {
        let id = self.next_command.fetch_add(1, Ordering::Relaxed);
        let (reply, rx) = bounded(1);
        self.queued.fetch_add(1, Ordering::SeqCst);
        if worker
            .tx
            .send(Command::Run(Box::new(Call { id, op, reply })))
            .is_err()
        {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(EngineError::WorkerStopped);
        }
        Ok(Pending { id, rx })
    }

    fn wait<R>(&self, pending: &Pending<R>, timeout: Option<Duration>) -> Result<R> {
        let Pending { id, rx } = pending;
        match timeout {
            Some(timeout) => match rx.recv_timeout(timeout) {
                Ok(result) => result,
                Err(RecvTimeoutError::Timeout) => {
                    warn!(command = id, ?timeout, "dispatched operation timed out");
                    Err(EngineError::Timeout(timeout))
                }
                Err(RecvTimeoutError::Disconnected) => Err(EngineError::WorkerStopped),
            },
            None => rx.recv().map_err(|_| EngineError::WorkerStopped)?,
        }
    }

    /// Drain the queue and stop the worker. Idempotent, and always returns.
    ///
    /// Commands already queued run first. If the worker does not exit in time it is
    /// told to abort, up to `shutdown_retries` times; after that it is detached.
    pub fn stop(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };

        if self.on_worker_thread() {
            // cannot join ourselves; the worker exits after the current command
            worker.abort.store(true, Ordering::SeqCst);
            let _ = worker.tx.send(Command::Shutdown);
            warn!("dispatcher stopped from its own worker thread, not joining");
            return;
        }

        debug!(queued = self.queued(), "stopping dispatcher");
        let _ = worker.tx.send(Command::Shutdown);
        let mut exited = worker.wait_exit(self.config.shutdown_timeout());

        for attempt in 1..=self.config.shutdown_retries {
            if exited {
                break;
            }
            warn!(attempt, "dispatcher worker still running, aborting");
            worker.abort.store(true, Ordering::SeqCst);
            let _ = worker.tx.send(Command::Shutdown);
            exited = worker.wait_exit(self.config.shutdown_retry_timeout());
        }

        if !exited {
            error!(
                thread = ?worker.thread_id(),
                "dispatcher worker failed to stop, detaching; it may need external cleanup"
            );
            return;
        }
        if worker.handle.join().is_err() {
            error!("dispatcher worker panicked during shutdown");
        }
        info!("dispatcher stopped");
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Commands submitted but not yet picked up by the worker.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    pub fn worker_thread(&self) -> Option<ThreadId> {
        self.worker.lock().as_ref().map(Worker::thread_id)
    }

    fn on_worker_thread(&self) -> bool {
        WORKER_OF.with(|w| w.get()) == Some(self.id)
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Pending<R> {
    id: u64,
    rx: Receiver<Result<R>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handoff {
    Waiting,
    Delivered,
    Abandoned,
}

struct WorkerContext {
    dispatcher: u64,
    backend: SharedBackend,
    rx: Receiver<Command>,
    abort: Arc<AtomicBool>,
    queued: Arc<AtomicUsize>,
    poll_interval: Duration,
}

impl WorkerContext {
    fn run(self) {
        debug!(dispatcher = self.dispatcher, "dispatcher worker running");
        loop {
            if self.abort.load(Ordering::SeqCst) {
                warn!("dispatcher worker aborted");
                break;
            }
            match self.rx.recv_timeout(self.poll_interval) {
                Ok(Command::Run(envelope)) => {
                    self.queued.fetch_sub(1, Ordering::SeqCst);
                    let id = envelope.id();
                    debug!(command = id, "running command");
                    let mut backend = self.backend.lock();
                    envelope.run(&mut **backend);
                }
                Ok(Command::Shutdown) => break,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        // dropping an envelope drops its reply sender, so waiting callers see WorkerStopped
        let mut dropped = 0usize;
        for command in self.rx.try_iter() {
            if let Command::Run(envelope) = command {
                self.queued.fetch_sub(1, Ordering::SeqCst);
                debug!(command = envelope.id(), "dropping unexecuted command");
                dropped += 1;
            }
        }
        if dropped > 0 {
            warn!(dropped, "dispatcher worker exited with commands still queued");
        }
        debug!(dispatcher = self.dispatcher, "dispatcher worker exiting");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
