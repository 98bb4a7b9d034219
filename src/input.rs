//! Input routing
//!
//! Input only drives two things in these clients: a primary button press starts an interactive
//! move, and a key release (in the clipboard client) publishes the selection. Both need the
//! serial of an input event to prove to the compositor that the user actually asked for it.

use std::sync::Mutex;

use smithay_client_toolkit::{
    reexports::client::{
        protocol::wl_keyboard::{self, WlKeyboard},
        Connection, Dispatch, QueueHandle, WEnum,
    },
    seat::pointer::PointerEventKind,
};
use tracing::trace;

/// Linux evdev code of the left mouse button
pub const BTN_LEFT: u32 = 0x110;

/// What a pointer event asks the client to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerAction {
    /// Start an interactive move, tagged with the serial of the triggering press
    Move {
        /// Serial of the button press
        serial: u32,
    },
}

impl PointerAction {
    /// Route a button event
    ///
    /// Only a press of [`BTN_LEFT`] does anything.
    pub fn from_button(button: u32, pressed: bool, serial: u32) -> Option<PointerAction> {
        (pressed && button == BTN_LEFT).then_some(PointerAction::Move { serial })
    }

    /// Route a pointer event as reported by `PointerHandler::pointer_frame`
    pub fn from_event(kind: &PointerEventKind) -> Option<PointerAction> {
        match *kind {
            PointerEventKind::Press { button, serial, .. } => Self::from_button(button, true, serial),
            PointerEventKind::Release { button, serial, .. } => Self::from_button(button, false, serial),
            _ => None,
        }
    }
}

/// Keyboard focus of one `wl_keyboard`
#[derive(Debug, Default)]
pub struct KeyboardFocus {
    enter_serial: Option<u32>,
}

impl KeyboardFocus {
    /// The keyboard entered one of our surfaces
    pub fn enter(&mut self, serial: u32) {
        self.enter_serial = Some(serial);
    }

    /// The keyboard left our surfaces
    pub fn leave(&mut self) {
        self.enter_serial = None;
    }

    /// Serial of the enter event of the current focus
    pub fn serial(&self) -> Option<u32> {
        self.enter_serial
    }
}

/// User data of a `wl_keyboard` routed through [`KeyboardRouter`]
#[derive(Debug, Default)]
pub struct KeyboardData {
    focus: Mutex<KeyboardFocus>,
}

/// Handler trait for keyboard events
pub trait KeyboardHandler: Sized {
    /// A key was released while one of our surfaces had keyboard focus
    ///
    /// `focus_serial` is the serial of the enter event that gave us the focus.
    fn key_released(
        &mut self,
        conn: &Connection,
        qh: &QueueHandle<Self>,
        keyboard: &WlKeyboard,
        key: u32,
        focus_serial: u32,
    );
}

/// Dispatches `wl_keyboard` events to a [`KeyboardHandler`]
#[derive(Debug)]
pub struct KeyboardRouter;

impl<D> Dispatch<WlKeyboard, KeyboardData, D> for KeyboardRouter
where
    D: Dispatch<WlKeyboard, KeyboardData> + KeyboardHandler,
{
    fn event(
        state: &mut D,
        keyboard: &WlKeyboard,
        event: wl_keyboard::Event,
        data: &KeyboardData,
        conn: &Connection,
        qh: &QueueHandle<D>,
    ) {
        match event {
            wl_keyboard::Event::Enter { serial, .. } => {
                trace!(serial, "keyboard focus entered");
                data.focus.lock().unwrap().enter(serial);
            }
            wl_keyboard::Event::Leave { .. } => {
                trace!("keyboard focus left");
                data.focus.lock().unwrap().leave();
            }
            wl_keyboard::Event::Key {
                key,
                state: WEnum::Value(wl_keyboard::KeyState::Released),
                ..
            } => {
                let focus_serial = data.focus.lock().unwrap().serial();
                if let Some(focus_serial) = focus_serial {
                    state.key_released(conn, qh, keyboard, key, focus_serial);
                }
            }
            // the keymap fd is closed on drop, key presses and modifiers are not used
            _ => {}
        }
    }
}

/// Delegate `wl_keyboard` objects created with [`KeyboardData`] to the application state
#[macro_export]
macro_rules! delegate_keyboard_focus {
    ($ty: ty) => {
        $crate::reexports::wayland_client::delegate_dispatch!($ty: [
            $crate::reexports::wayland_client::protocol::wl_keyboard::WlKeyboard: $crate::input::KeyboardData
        ] => $crate::input::KeyboardRouter);
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    const BTN_RIGHT: u32 = 0x111;
    const BTN_MIDDLE: u32 = 0x112;

    #[test]
    fn primary_press_starts_move_with_its_serial() {
        assert_eq!(
            PointerAction::from_button(BTN_LEFT, true, 1234),
            Some(PointerAction::Move { serial: 1234 })
        );
    }

    #[test]
    fn other_buttons_and_releases_are_ignored() {
        assert_eq!(PointerAction::from_button(BTN_LEFT, false, 1), None);
        assert_eq!(PointerAction::from_button(BTN_RIGHT, true, 2), None);
        assert_eq!(PointerAction::from_button(BTN_MIDDLE, true, 3), None);
    }

    #[test]
    fn pointer_events_are_routed() {
        let press = PointerEventKind::Press {
            time: 10,
            button: BTN_LEFT,
            serial: 77,
        };
        let release = PointerEventKind::Release {
            time: 11,
            button: BTN_LEFT,
            serial: 78,
        };
        let motion = PointerEventKind::Motion { time: 12 };

        assert_eq!(
            PointerAction::from_event(&press),
            Some(PointerAction::Move { serial: 77 })
        );
        assert_eq!(PointerAction::from_event(&release), None);
        assert_eq!(PointerAction::from_event(&motion), None);
    }

    #[test]
    fn focus_serial_follows_enter_and_leave() {
        let mut focus = KeyboardFocus::default();
        assert_eq!(focus.serial(), None);
        focus.enter(5);
        focus.enter(9);
        assert_eq!(focus.serial(), Some(9));
        focus.leave();
        assert_eq!(focus.serial(), None);
    }
}
