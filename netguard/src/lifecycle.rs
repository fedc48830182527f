//! Capture session lifecycle: start and stop the capture thread.
//!
//! `CaptureController` is a two-state machine (stopped, running). Each session
//! gets its own cancellation flag, its own sink connection and its own capture
//! source, all owned by the capture thread. Both transitions are idempotent.
//!
//! `stop` only raises the cancellation flag; the engine closes its sink once it
//! notices. Callers that need the thread gone use `wait_stopped`.

use std::io;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use netguard_capture::{CaptureError, SourceOpener};
use netguard_store::{Sink, SinkError, SinkOpener};
use thiserror::Error;

use crate::engine::{self, EngineReport};
use crate::logger::Logger;
use crate::signal::ShutdownFlag;

/// Name of the capture thread.
pub const CAPTURE_THREAD_NAME: &str = "netguard-capture";

const WAIT_POLL: Duration = Duration::from_millis(10);

/// Errors from starting a capture session. The controller stays stopped.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("capture failed to start: {0}")]
    Start(#[from] CaptureError),

    #[error("store unavailable: {0}")]
    Store(#[from] SinkError),

    #[error("failed to spawn capture thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("capture thread exited before it was ready")]
    Exited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Cancellation was requested; the thread exits on its own.
    Requested,
    NotRunning,
}

struct Session {
    cancel: ShutdownFlag,
    handle: JoinHandle<EngineReport>,
}

/// Owns the capture session state.
pub struct CaptureController<SO, KO, L>
where
    SO: SourceOpener + 'static,
    KO: SinkOpener + 'static,
    L: Logger + 'static,
{
    sources: Arc<SO>,
    sinks: Arc<KO>,
    logger: Arc<L>,
    session: Option<Session>,
    draining: Vec<JoinHandle<EngineReport>>,
    last_report: Option<EngineReport>,
}

impl<SO, KO, L> CaptureController<SO, KO, L>
where
    SO: SourceOpener + 'static,
    KO: SinkOpener + 'static,
    L: Logger + 'static,
{
    pub fn new(sources: SO, sinks: KO, logger: L) -> Self {
        Self {
            sources: Arc::new(sources),
            sinks: Arc::new(sinks),
            logger: Arc::new(logger),
            session: None,
            draining: Vec::new(),
            last_report: None,
        }
    }

    /// Start a capture session.
    ///
    /// Returns once the capture thread has opened both its sink and its
    /// source, so an open failure is reported here and the controller stays
    /// stopped. A no-op while a session is running.
    pub fn start(&mut self) -> Result<StartOutcome, LifecycleError> {
        self.reconcile();
        if self.session.is_some() {
            return Ok(StartOutcome::AlreadyRunning);
        }

        let cancel = ShutdownFlag::manual();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), LifecycleError>>();

        let sources = Arc::clone(&self.sources);
        let sinks = Arc::clone(&self.sinks);
        let logger = Arc::clone(&self.logger);
        let thread_cancel = cancel.clone();

        let handle = thread::Builder::new()
            .name(CAPTURE_THREAD_NAME.to_string())
            .spawn(move || {
                let mut sink = match sinks.open() {
                    Ok(sink) => sink,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.into()));
                        return EngineReport::default();
                    }
                };
                let mut source = match sources.open() {
                    Ok(source) => source,
                    Err(e) => {
                        sink.close();
                        let _ = ready_tx.send(Err(e.into()));
                        return EngineReport::default();
                    }
                };
                let _ = ready_tx.send(Ok(()));
                drop(ready_tx);

                engine::run(&mut source, &mut sink, &thread_cancel, logger.as_ref())
            })
            .map_err(LifecycleError::Spawn)?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.session = Some(Session { cancel, handle });
                self.logger.debug("capture session running");
                Ok(StartOutcome::Started)
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                self.logger.error(&format!("{}", e));
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                self.logger.error("capture thread exited before it was ready");
                Err(LifecycleError::Exited)
            }
        }
    }

    /// Request the running session to stop. Never waits for the thread.
    pub fn stop(&mut self) -> StopOutcome {
        self.reconcile();
        match self.session.take() {
            Some(session) => {
                session.cancel.trigger();
                self.draining.push(session.handle);
                self.logger.debug("capture stop requested");
                StopOutcome::Requested
            }
            None => StopOutcome::NotRunning,
        }
    }

    /// Current state, after noticing a session that ended on its own.
    pub fn state(&mut self) -> SessionState {
        self.reconcile();
        if self.session.is_some() {
            SessionState::Running
        } else {
            SessionState::Stopped
        }
    }

    /// Wait up to `timeout` for every capture thread to exit.
    ///
    /// Returns false on timeout. Does not request a stop.
    pub fn wait_stopped(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.reconcile();
            if self.session.is_none() && self.draining.is_empty() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(WAIT_POLL);
        }
    }

    /// Counters of the most recently finished session.
    pub fn last_report(&self) -> Option<EngineReport> {
        self.last_report
    }

    fn reconcile(&mut self) {
        if self
            .session
            .as_ref()
            .map_or(false, |s| s.handle.is_finished())
        {
            if let Some(session) = self.session.take() {
                self.logger.info("capture session ended");
                self.collect(session.handle);
            }
        }

        let (finished, pending): (Vec<_>, Vec<_>) = self
            .draining
            .drain(..)
            .partition(|handle| handle.is_finished());
        self.draining = pending;
        for handle in finished {
            self.collect(handle);
        }
    }

    fn collect(&mut self, handle: JoinHandle<EngineReport>) {
        match handle.join() {
            Ok(report) => self.last_report = Some(report),
            Err(_) => self.logger.error("capture thread panicked"),
        }
    }
}

impl<SO, KO, L> Drop for CaptureController<SO, KO, L>
where
    SO: SourceOpener + 'static,
    KO: SinkOpener + 'static,
    L: Logger + 'static,
{
    fn drop(&mut self) {
        self.stop();
    }
}
