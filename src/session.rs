//! Session control for the watcher.
//!
//! A single worker thread owns the monitor, the journal and the persistence
//! channels. Notifications, manual checks and lifecycle changes reach it
//! through one channel and are handled strictly in arrival order, so none of
//! that state needs a lock.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::WatchConfig;
use crate::detector::{
    ActivationSink, CheckOutcome, Monitor, MonitorState, MonitorStateMachine, TreeProvider,
    UiEvent, UiNode,
};
use crate::error::WatchError;
use crate::journal::{Persistence, RecordJournal, StorageError};

/// Receives the result of a manual check, after it has been journaled.
pub type CheckReceiver = Box<dyn FnOnce(Result<CheckOutcome, WatchError>) + Send>;

enum Job<N> {
    Event(UiEvent<N>),
    Start(Uuid),
    Stop,
    Check(CheckReceiver),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchStatus {
    pub state: MonitorState,
    pub accepted_total: u64,
}

pub struct WatchHandle<N> {
    state: Mutex<MonitorStateMachine>,
    running: AtomicBool,
    accepted_total: Arc<AtomicU64>,
    tx: Sender<Job<N>>,
    worker: Option<JoinHandle<()>>,
}

impl<N> WatchHandle<N>
where
    N: UiNode + Send + 'static,
{
    /// Start the worker. It restores the counter and journal before handling
    /// any job; the monitor itself stays idle until `start`.
    pub fn spawn<P, S>(
        config: WatchConfig,
        provider: P,
        sink: S,
        persistence: Persistence,
    ) -> Result<Self, WatchError>
    where
        P: TreeProvider<Node = N> + Send + 'static,
        S: ActivationSink<N> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<Job<N>>();
        let accepted_total = Arc::new(AtomicU64::new(0));

        let worker = Worker {
            journal: RecordJournal::new(config.journal_capacity),
            monitor: Monitor::new(config),
            provider,
            sink,
            persistence,
            monitoring: false,
            accepted_total: Arc::clone(&accepted_total),
        };
        let handle = thread::Builder::new()
            .name("skipwatch-worker".to_string())
            .spawn(move || worker.run(rx))
            .map_err(WatchError::Spawn)?;

        Ok(Self {
            state: Mutex::new(MonitorStateMachine::new()),
            running: AtomicBool::new(false),
            accepted_total,
            tx,
            worker: Some(handle),
        })
    }

    pub fn start(&self) -> Result<(), WatchError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.start()?;
        self.tx
            .send(Job::Start(Uuid::new_v4()))
            .map_err(|_| WatchError::WorkerGone)?;
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn stop(&self) -> Result<(), WatchError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.stop()?;
        self.running.store(false, Ordering::SeqCst);
        self.tx.send(Job::Stop).map_err(|_| WatchError::WorkerGone)
    }

    /// Tear the subscription down whatever state the monitor is in.
    pub fn force_unregister(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let was_running = state.current() == MonitorState::Running;
        state.force_idle();
        self.running.store(false, Ordering::SeqCst);
        if was_running {
            let _ = self.tx.send(Job::Stop);
        }
    }

    pub fn status(&self) -> WatchStatus {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        WatchStatus {
            state: state.current(),
            accepted_total: self.accepted_total.load(Ordering::SeqCst),
        }
    }

    /// Queue a UI-change notification. Never blocks; dropped while idle.
    ///
    /// Notifications queued before a `stop` are still processed.
    pub fn notify(&self, event: UiEvent<N>) {
        if self.running.load(Ordering::SeqCst) {
            let _ = self.tx.send(Job::Event(event));
        }
    }

    pub fn check_now<F>(&self, receiver: F) -> Result<(), WatchError>
    where
        F: FnOnce(Result<CheckOutcome, WatchError>) + Send + 'static,
    {
        self.tx
            .send(Job::Check(Box::new(receiver)))
            .map_err(|_| WatchError::WorkerGone)
    }

    /// Persist and stop the worker, waiting for it to finish.
    pub fn shutdown(mut self) {
        self.finish();
    }
}

impl<N> WatchHandle<N> {
    fn finish(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.running.store(false, Ordering::SeqCst);
        let _ = self.tx.send(Job::Shutdown);
        if worker.join().is_err() {
            error!("watch worker panicked");
        }
    }
}

impl<N> Drop for WatchHandle<N> {
    fn drop(&mut self) {
        self.finish();
    }
}

struct Worker<P, S> {
    monitor: Monitor,
    journal: RecordJournal,
    provider: P,
    sink: S,
    persistence: Persistence,
    /// Follows the Start/Stop jobs in queue order.
    monitoring: bool,
    accepted_total: Arc<AtomicU64>,
}

impl<P, S> Worker<P, S>
where
    P: TreeProvider,
    S: ActivationSink<P::Node>,
{
    fn run(mut self, rx: Receiver<Job<P::Node>>) {
        self.restore();

        for job in rx {
            match job {
                Job::Event(event) => {
                    if !self.monitoring {
                        debug!("event arrived after stop, dropped");
                        continue;
                    }
                    let disposition =
                        self.monitor
                            .on_event(event, &mut self.sink, &mut self.journal);
                    debug!(?disposition, "event processed");
                }
                Job::Start(session) => {
                    self.monitoring = true;
                    info!(%session, "monitor started");
                    self.journal.log(format!("monitor started, session {session}"));
                }
                Job::Stop => {
                    self.monitoring = false;
                    info!("monitor stopped");
                    self.journal.log("monitor stopped");
                }
                Job::Check(receiver) => {
                    let result =
                        self.monitor
                            .check_now(&mut self.provider, &mut self.sink, &mut self.journal);
                    self.publish_total();
                    receiver(result);
                }
                Job::Shutdown => break,
            }
            self.publish_total();
        }

        self.persist();
    }

    fn publish_total(&self) {
        self.accepted_total
            .store(self.journal.accepted_total(), Ordering::SeqCst);
    }

    fn restore(&mut self) {
        let hint = match self.persistence.read_counter() {
            Ok(count) => count.unwrap_or(0),
            Err(err) => {
                self.report_load_failure("counter", &err);
                0
            }
        };

        let loaded = self
            .persistence
            .journal
            .read_all()
            .map_err(StorageError::from)
            .and_then(|bytes| self.journal.load_and_reconcile(&bytes, hint));
        match loaded {
            Ok(reconciled) => info!(
                loaded = reconciled.loaded,
                accepted_total = reconciled.accepted_total,
                "journal restored"
            ),
            Err(err) => {
                self.report_load_failure("journal", &err);
                self.journal.adopt_total(hint);
            }
        }
        self.publish_total();
    }

    fn report_load_failure(&mut self, what: &str, err: &StorageError) {
        match err {
            StorageError::Parse { .. } => {
                warn!(what, %err, "persisted data is malformed");
                self.journal.log(format!("{what} is malformed, ignoring it: {err}"));
            }
            _ => {
                error!(what, %err, "failed to read persisted data");
                self.journal.log(format!("failed to read {what}: {err}"));
            }
        }
    }

    fn persist(&mut self) {
        self.journal.log("shutting down");
        match self.journal.flush(&mut self.persistence) {
            Ok(()) => info!(
                entries = self.journal.len(),
                accepted_total = self.journal.accepted_total(),
                "journal persisted"
            ),
            Err(err) => error!(%err, "failed to persist journal"),
        }
    }
}
