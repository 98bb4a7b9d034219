use tracing::{debug, trace};

/// Size of a window in surface-local pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl Size {
    /// A size of `width` × `height`
    pub const fn new(width: u32, height: u32) -> Self {
        Size { width, height }
    }

    /// Apply a suggested size from a configure
    ///
    /// Zero or negative components mean the compositor leaves that axis to the client, so the
    /// current value is kept for it.
    pub fn apply(self, width: i32, height: i32) -> Size {
        Size {
            width: if width > 0 { width as u32 } else { self.width },
            height: if height > 0 { height as u32 } else { self.height },
        }
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Size { width, height }
    }
}

/// Where a window is in its configure handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// The role was assigned and the initial bufferless commit issued, no configure yet
    Unconfigured,
    /// A configure arrived but was not acknowledged yet
    Configuring,
    /// A configure was acknowledged, buffers may be attached and committed
    Configured,
}

/// How a configure relates to the current state of the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureKind {
    /// The very first configure of the window
    Initial,
    /// The suggested size differs from the current one
    Resize,
    /// Nothing the client draws is affected
    Unchanged,
}

/// A configure that was just acknowledged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acknowledge {
    /// Serial to hand to `xdg_surface.ack_configure`
    pub serial: u32,
    /// Size of the window from now on
    pub size: Size,
    /// Whether `size` differs from the size before the acknowledgement
    pub resized: bool,
}

/// The configure handshake of a toplevel
///
/// Every configure is recorded with [`Handshake::configure`] and becomes pending. Taking it out
/// with [`Handshake::acknowledge`] yields the serial to acknowledge, exactly once; if several
/// configures arrive before the client gets to acknowledge, only the latest one is kept, which
/// acknowledges the earlier ones as well.
#[derive(Debug)]
pub struct Handshake {
    state: HandshakeState,
    size: Size,
    pending: Option<(u32, Size)>,
    seen_configure: bool,
}

impl Handshake {
    /// A fresh handshake for a window that will default to `size`
    pub fn new(size: Size) -> Self {
        Handshake {
            state: HandshakeState::Unconfigured,
            size,
            pending: None,
            seen_configure: false,
        }
    }

    /// Record a configure with its suggested size
    pub fn configure(&mut self, serial: u32, width: i32, height: i32) -> ConfigureKind {
        let base = self.pending.map(|(_, size)| size).unwrap_or(self.size);
        let target = base.apply(width, height);
        trace!(serial, width, height, ?target, "configure");
        self.pending = Some((serial, target));

        if self.state == HandshakeState::Unconfigured {
            self.state = HandshakeState::Configuring;
        }

        if !self.seen_configure {
            self.seen_configure = true;
            ConfigureKind::Initial
        } else if target != self.size {
            ConfigureKind::Resize
        } else {
            ConfigureKind::Unchanged
        }
    }

    /// Take the pending configure out for acknowledgement
    ///
    /// Returns `None` when there is nothing left to acknowledge.
    pub fn acknowledge(&mut self) -> Option<Acknowledge> {
        let (serial, size) = self.pending.take()?;
        let resized = size != self.size;
        self.size = size;
        self.state = HandshakeState::Configured;
        debug!(serial, ?size, resized, "acknowledging configure");
        Some(Acknowledge { serial, size, resized })
    }

    /// Whether a buffer may be attached and committed
    pub fn may_attach(&self) -> bool {
        self.state == HandshakeState::Configured
    }

    /// Whether a configure awaits acknowledgement
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Current state
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Size as of the last acknowledged configure
    pub fn size(&self) -> Size {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_may_be_attached_before_acknowledge() {
        let mut handshake = Handshake::new(Size::new(128, 128));
        assert_eq!(handshake.state(), HandshakeState::Unconfigured);
        assert!(!handshake.may_attach());

        assert_eq!(handshake.configure(3, 0, 0), ConfigureKind::Initial);
        assert_eq!(handshake.state(), HandshakeState::Configuring);
        assert!(!handshake.may_attach());

        let ack = handshake.acknowledge().unwrap();
        assert_eq!(ack.serial, 3);
        assert!(handshake.may_attach());
    }

    #[test]
    fn non_positive_components_keep_the_axis() {
        let mut handshake = Handshake::new(Size::new(128, 96));
        handshake.configure(1, 0, 0);
        assert_eq!(handshake.acknowledge().unwrap().size, Size::new(128, 96));

        for (serial, (width, height)) in [(0, -5), (-1, 0), (0, 0), (-300, -300)].into_iter().enumerate() {
            handshake.configure(serial as u32 + 2, width, height);
            let ack = handshake.acknowledge().unwrap();
            assert_eq!(ack.size, Size::new(128, 96));
            assert!(!ack.resized);
        }

        handshake.configure(10, 640, -1);
        assert_eq!(handshake.acknowledge().unwrap().size, Size::new(640, 96));
        handshake.configure(11, 0, 480);
        assert_eq!(handshake.acknowledge().unwrap().size, Size::new(640, 480));
    }

    #[test]
    fn resize_is_acknowledged_exactly_once() {
        let mut handshake = Handshake::new(Size::new(128, 128));
        handshake.configure(1, 0, 0);
        handshake.acknowledge();

        assert_eq!(handshake.configure(42, 800, 600), ConfigureKind::Resize);

        // first render pass after the configure
        let ack = handshake.acknowledge().unwrap();
        assert_eq!(
            ack,
            Acknowledge {
                serial: 42,
                size: Size::new(800, 600),
                resized: true
            }
        );
        assert_eq!(handshake.size(), Size::new(800, 600));

        // later passes have nothing left to acknowledge
        assert_eq!(handshake.acknowledge(), None);
        assert_eq!(handshake.acknowledge(), None);
    }

    #[test]
    fn latest_configure_supersedes_unacknowledged_ones() {
        let mut handshake = Handshake::new(Size::new(128, 128));
        handshake.configure(1, 0, 0);
        handshake.acknowledge();

        handshake.configure(2, 800, 600);
        // a state-only configure keeps the pending suggested size
        assert_eq!(handshake.configure(3, 0, 0), ConfigureKind::Resize);

        let ack = handshake.acknowledge().unwrap();
        assert_eq!(ack.serial, 3);
        assert_eq!(ack.size, Size::new(800, 600));
        assert!(!handshake.is_pending());
    }

    #[test]
    fn same_size_is_unchanged() {
        let mut handshake = Handshake::new(Size::new(128, 128));
        handshake.configure(1, 300, 200);
        handshake.acknowledge();
        assert_eq!(handshake.configure(2, 300, 200), ConfigureKind::Unchanged);
        assert!(!handshake.acknowledge().unwrap().resized);
    }
}
