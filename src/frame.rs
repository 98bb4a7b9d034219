//! Frame callback bookkeeping
//!
//! A frame callback is a one-shot token: the compositor fires it once when it is a good time to
//! draw again, and it has to be requested anew for every frame. Requesting a second callback
//! while one is still outstanding would make the client render twice per refresh, so the
//! [`FramePacer`] keeps track of the token in flight.

use smithay_client_toolkit::reexports::client::{
    protocol::{wl_callback::WlCallback, wl_surface::WlSurface},
    Dispatch, QueueHandle,
};
use tracing::trace;

/// Tracks the frame callback of one surface
#[derive(Debug, Default)]
pub struct FramePacer {
    outstanding: bool,
    presented: u64,
}

impl FramePacer {
    /// A pacer with no callback in flight
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the right to request a frame callback
    ///
    /// Returns `false` if a callback is already in flight, in which case no new one must be
    /// requested.
    pub fn claim(&mut self) -> bool {
        if self.outstanding {
            return false;
        }
        self.outstanding = true;
        true
    }

    /// Request a frame callback on `surface` unless one is already in flight
    ///
    /// The callback is delivered through `CompositorHandler::frame`.
    pub fn request<D>(&mut self, surface: &WlSurface, qh: &QueueHandle<D>)
    where
        D: Dispatch<WlCallback, WlSurface> + 'static,
    {
        if self.claim() {
            surface.frame(qh, surface.clone());
        } else {
            trace!("frame callback already pending");
        }
    }

    /// The outstanding callback fired
    pub fn done(&mut self) {
        self.outstanding = false;
        self.presented += 1;
    }

    /// Whether a callback is in flight
    pub fn is_pending(&self) -> bool {
        self.outstanding
    }

    /// Number of callbacks that fired so far
    pub fn presented(&self) -> u64 {
        self.presented
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_token_in_flight() {
        let mut pacer = FramePacer::new();
        assert!(pacer.claim());
        assert!(!pacer.claim());
        assert!(pacer.is_pending());
    }

    #[test]
    fn token_is_reissued_after_done() {
        let mut pacer = FramePacer::new();
        assert!(pacer.claim());
        pacer.done();
        assert!(!pacer.is_pending());
        assert!(pacer.claim());
        pacer.done();
        assert_eq!(pacer.presented(), 2);
    }
}
