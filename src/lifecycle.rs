//! Application run state
//!
//! A close request or a fatal error does not abort whatever is being dispatched: it only flips
//! the state, which the dispatch loop looks at between two iterations before tearing down.

use std::mem;

use tracing::{error, info, warn};

use crate::error::{RenderError, SetupError};

/// Where the application is in its life
#[derive(Debug, Default)]
pub enum RunState {
    /// Dispatching events
    #[default]
    Running,
    /// The window was asked to close, teardown happens after the current iteration
    ShuttingDown,
    /// A fatal error was raised from inside a handler
    Failed(SetupError),
}

/// Cooperative shutdown flag of a client
#[derive(Debug, Default)]
pub struct Lifecycle {
    state: RunState,
}

impl Lifecycle {
    /// A running application
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the dispatch loop should keep going
    pub fn is_running(&self) -> bool {
        matches!(self.state, RunState::Running)
    }

    /// The compositor asked to close the window
    pub fn request_close(&mut self) {
        if self.is_running() {
            info!("close requested, shutting down");
            self.state = RunState::ShuttingDown;
        }
    }

    /// A handler hit an error the client cannot recover from
    ///
    /// The first error wins, later ones are only logged.
    pub fn fail(&mut self, err: SetupError) {
        match self.state {
            RunState::Failed(_) => error!("additional fatal error: {}", err),
            _ => self.state = RunState::Failed(err),
        }
    }

    /// A render pass failed
    ///
    /// Once a frame was presented the failure only costs this frame: the caller still requests a
    /// frame callback and commits, and the next callback retries. Before that the surface is not
    /// mapped and no callback would ever arrive, so the failure ends the run.
    /// Returns whether the frame may be skipped.
    pub fn frame_failed(&mut self, err: RenderError, presented: bool) -> bool {
        if presented {
            warn!("{}, skipping frame", err);
            true
        } else {
            self.fail(SetupError::FirstFrame(err));
            false
        }
    }

    /// Current state
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Consume the state once the loop has stopped
    pub fn finish(&mut self) -> Result<(), SetupError> {
        match mem::replace(&mut self.state, RunState::ShuttingDown) {
            RunState::Failed(err) => Err(err),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    fn shm_error() -> SetupError {
        SetupError::Shm(io::Error::new(io::ErrorKind::OutOfMemory, "test"))
    }

    #[test]
    fn close_is_orderly() {
        let mut lifecycle = Lifecycle::new();
        assert!(lifecycle.is_running());
        lifecycle.request_close();
        assert!(!lifecycle.is_running());
        assert!(matches!(lifecycle.state(), RunState::ShuttingDown));
        assert!(lifecycle.finish().is_ok());
    }

    #[test]
    fn failure_is_reported_once_finished() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.fail(shm_error());
        // a close request does not hide the error
        lifecycle.request_close();
        assert!(!lifecycle.is_running());
        assert!(matches!(lifecycle.finish(), Err(SetupError::Shm(_))));
    }

    #[test]
    fn failed_frame_is_skipped_after_the_first_was_presented() {
        let mut lifecycle = Lifecycle::new();
        assert!(lifecycle.frame_failed(RenderError::NoFreeBuffer, true));
        assert!(lifecycle.is_running());
        assert!(lifecycle.finish().is_ok());
    }

    #[test]
    fn failed_first_frame_ends_the_run() {
        let mut lifecycle = Lifecycle::new();
        assert!(!lifecycle.frame_failed(RenderError::NoFreeBuffer, false));
        assert!(!lifecycle.is_running());
        assert!(matches!(
            lifecycle.finish(),
            Err(SetupError::FirstFrame(RenderError::NoFreeBuffer))
        ));
    }
}
