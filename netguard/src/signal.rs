//! Cooperative cancellation.
//!
//! `ShutdownFlag` is both the Ctrl+C flag for the foreground loop and the
//! per-session cancellation signal the capture engine checks between frames.
//! Both are advisory: nothing is interrupted, loops check at their own pace.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::logger::Logger;

/// Trait for checking shutdown status.
pub trait ShutdownCheck: Send + Sync {
    /// Returns true if shutdown has been requested.
    fn should_stop(&self) -> bool;
}

impl<T: ShutdownCheck + ?Sized> ShutdownCheck for Arc<T> {
    fn should_stop(&self) -> bool {
        (**self).should_stop()
    }
}

/// Shared stop flag. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct ShutdownFlag {
    flag: Arc<AtomicBool>,
}

impl Default for ShutdownFlag {
    fn default() -> Self {
        Self::manual()
    }
}

impl ShutdownFlag {
    /// Create a flag that Ctrl+C sets.
    ///
    /// Fails if the handler cannot be installed, e.g. because one already
    /// exists in this process.
    pub fn with_ctrlc() -> Result<Self, ctrlc::Error> {
        let flag = Self::manual();
        let handle = flag.clone();
        ctrlc::set_handler(move || handle.trigger())?;
        Ok(flag)
    }

    /// Like `with_ctrlc`, but falls back to a manual flag and warns when
    /// the handler cannot be installed. Ctrl+C then ends the process
    /// without a clean stop.
    pub fn with_ctrlc_or_warn<L: Logger + ?Sized>(logger: &L) -> Self {
        match Self::with_ctrlc() {
            Ok(flag) => flag,
            Err(e) => {
                logger.warn(&format!(
                    "cannot install Ctrl+C handler ({}); Ctrl+C will skip the clean shutdown",
                    e
                ));
                Self::manual()
            }
        }
    }

    /// Create a flag with no signal handler.
    pub fn manual() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request shutdown.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

impl ShutdownCheck for ShutdownFlag {
    fn should_stop(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Mock shutdown checker for testing - never signals shutdown.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverShutdown;

impl ShutdownCheck for NeverShutdown {
    fn should_stop(&self) -> bool {
        false
    }
}

/// Mock shutdown checker that always signals shutdown.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysShutdown;

impl ShutdownCheck for AlwaysShutdown {
    fn should_stop(&self) -> bool {
        true
    }
}
