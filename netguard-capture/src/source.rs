//! Capture source abstraction.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::frame::Frame;

/// Default snap length: whole frames.
pub const DEFAULT_SNAPLEN: i32 = 65535;

/// Default read timeout. Bounds how long a stop request can go unnoticed
/// on an idle link.
pub const DEFAULT_POLL_TIMEOUT_MS: i32 = 1000;

/// Errors from capture sources.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to open capture on '{device}': {reason}")]
    Open { device: String, reason: String },

    #[error("insufficient permissions to capture on '{device}' (requires CAP_NET_RAW)")]
    InsufficientPermissions { device: String },

    #[error("no capture device available")]
    NoDevice,

    #[error("capture read failed: {0}")]
    Read(String),
}

/// Result of one poll of a capture source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    Frame(Frame),
    /// The poll timeout elapsed with no frame.
    Timeout,
    /// The source has no more frames.
    Closed,
}

/// A source of captured frames.
///
/// `next_frame` blocks for at most the source's poll timeout.
pub trait CaptureSource: Send {
    fn next_frame(&mut self) -> Result<Next, CaptureError>;

    /// Human-readable name for logs.
    fn describe(&self) -> String;
}

/// Opens capture sources. Failure to open is fatal to a capture session.
pub trait SourceOpener: Send + Sync {
    type Source: CaptureSource + 'static;

    fn open(&self) -> Result<Self::Source, CaptureError>;
}

impl<O: SourceOpener + ?Sized> SourceOpener for Arc<O> {
    type Source = O::Source;

    fn open(&self) -> Result<Self::Source, CaptureError> {
        (**self).open()
    }
}

/// One step of a scripted capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    Frame(Frame),
    Timeout,
    /// A read error with this message.
    Error(String),
}

/// Replays a fixed script of frames, timeouts and read errors.
///
/// When the script runs out the source either closes or, if built with
/// [`ScriptedSource::idle_after`], keeps reporting timeouts.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    steps: VecDeque<ScriptStep>,
    idle: Option<Duration>,
}

impl ScriptedSource {
    /// A source that closes after its last step.
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps: steps.into(),
            idle: None,
        }
    }

    /// A source that closes after the given frames.
    pub fn from_frames(frames: Vec<Frame>) -> Self {
        Self::new(frames.into_iter().map(ScriptStep::Frame).collect())
    }

    /// Keep the source open after the script, sleeping `poll` per timeout.
    pub fn idle_after(mut self, poll: Duration) -> Self {
        self.idle = Some(poll);
        self
    }

    /// Steps not yet replayed.
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl CaptureSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Next, CaptureError> {
        match self.steps.pop_front() {
            Some(ScriptStep::Frame(frame)) => Ok(Next::Frame(frame)),
            Some(ScriptStep::Timeout) => Ok(Next::Timeout),
            Some(ScriptStep::Error(msg)) => Err(CaptureError::Read(msg)),
            None => match self.idle {
                Some(poll) => {
                    thread::sleep(poll);
                    Ok(Next::Timeout)
                }
                None => Ok(Next::Closed),
            },
        }
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Opener handing out copies of one script.
#[derive(Debug, Clone)]
pub struct ScriptedOpener {
    source: ScriptedSource,
    failure: Option<String>,
    opens: Arc<AtomicUsize>,
}

impl ScriptedOpener {
    pub fn new(source: ScriptedSource) -> Self {
        Self {
            source,
            failure: None,
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// An opener whose every `open` fails with `reason`.
    pub fn failing(reason: &str) -> Self {
        Self {
            source: ScriptedSource::new(Vec::new()),
            failure: Some(reason.to_string()),
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of `open` calls so far, failed ones included.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl SourceOpener for ScriptedOpener {
    type Source = ScriptedSource;

    fn open(&self) -> Result<ScriptedSource, CaptureError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(reason) => Err(CaptureError::Open {
                device: "scripted".to_string(),
                reason: reason.clone(),
            }),
            None => Ok(self.source.clone()),
        }
    }
}
