//! xdg toplevel windows
//!
//! A [`Window`] wraps a `wl_surface` with the `xdg_surface` and `xdg_toplevel` objects giving it
//! the toplevel role. The suggested size carried by `xdg_toplevel.configure` is latched in the
//! window's user data until the closing `xdg_surface.configure`, at which point the complete
//! configure is handed to [`WindowHandler::configure`]. Acknowledging it is left to the
//! application, which knows when it is ready to honor it (see [`Handshake`]).
//!
//! ```ignore
//! let windows = WindowManager::bind(&globals, &qh)?;
//! let window = windows.create_window(compositor.create_surface(&qh), &qh);
//! window.set_title("hello");
//! // the initial commit carries no buffer
//! window.commit();
//!
//! delegate_window!(App);
//! ```

mod handshake;

pub use self::handshake::{Acknowledge, ConfigureKind, Handshake, HandshakeState, Size};

use std::sync::{Arc, Mutex};

use smithay_client_toolkit::reexports::{
    client::{
        globals::{BindError, GlobalList},
        protocol::{wl_seat::WlSeat, wl_surface::WlSurface},
        Connection, Dispatch, Proxy, QueueHandle,
    },
    protocols::xdg::shell::client::{xdg_surface, xdg_toplevel, xdg_wm_base},
};
use tracing::{debug, trace};

/// A configure sequence as delivered by the compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfigure {
    /// Serial of the closing `xdg_surface.configure`
    pub serial: u32,
    /// Suggested width, zero or less if left to the client
    pub width: i32,
    /// Suggested height, zero or less if left to the client
    pub height: i32,
}

/// Handler trait for toplevel events
pub trait WindowHandler: Sized {
    /// A configure sequence completed and must be acknowledged before the next commit honoring it
    fn configure(&mut self, conn: &Connection, qh: &QueueHandle<Self>, configure: WindowConfigure);

    /// The compositor asks the window to close
    fn request_close(&mut self, conn: &Connection, qh: &QueueHandle<Self>);
}

/// User data of the `xdg_wm_base` global
#[derive(Debug)]
pub struct WmBaseData;

/// User data shared by the `xdg_surface` and `xdg_toplevel` of a window
#[derive(Debug, Clone, Default)]
pub struct WindowData {
    latched: Arc<Mutex<(i32, i32)>>,
}

impl WindowData {
    fn latch(&self, width: i32, height: i32) {
        *self.latched.lock().unwrap() = (width, height);
    }

    fn latched(&self) -> (i32, i32) {
        *self.latched.lock().unwrap()
    }
}

/// The bound `xdg_wm_base` global
#[derive(Debug)]
pub struct WindowManager {
    wm_base: xdg_wm_base::XdgWmBase,
}

impl WindowManager {
    /// Bind `xdg_wm_base`
    ///
    /// Fails if the compositor does not implement xdg-shell.
    pub fn bind<D>(globals: &GlobalList, qh: &QueueHandle<D>) -> Result<Self, BindError>
    where
        D: Dispatch<xdg_wm_base::XdgWmBase, WmBaseData> + 'static,
    {
        let wm_base = globals.bind(qh, 1..=5, WmBaseData)?;
        Ok(WindowManager { wm_base })
    }

    /// Give `surface` the toplevel role
    ///
    /// Nothing is shown until the window was configured and a buffer committed.
    pub fn create_window<D>(&self, surface: WlSurface, qh: &QueueHandle<D>) -> Window
    where
        D: Dispatch<xdg_surface::XdgSurface, WindowData>
            + Dispatch<xdg_toplevel::XdgToplevel, WindowData>
            + 'static,
    {
        let data = WindowData::default();
        let xdg_surface = self.wm_base.get_xdg_surface(&surface, qh, data.clone());
        let toplevel = xdg_surface.get_toplevel(qh, data);
        debug!(surface = ?surface.id(), "created toplevel");

        Window {
            surface,
            xdg_surface,
            toplevel,
        }
    }
}

/// A toplevel window
///
/// Dropping the window destroys the toplevel, its `xdg_surface` and the underlying `wl_surface`.
#[derive(Debug)]
pub struct Window {
    surface: WlSurface,
    xdg_surface: xdg_surface::XdgSurface,
    toplevel: xdg_toplevel::XdgToplevel,
}

impl Window {
    /// The surface backing this window
    pub fn wl_surface(&self) -> &WlSurface {
        &self.surface
    }

    /// Set the window title
    pub fn set_title(&self, title: impl Into<String>) {
        self.toplevel.set_title(title.into());
    }

    /// Set the application id
    pub fn set_app_id(&self, app_id: impl Into<String>) {
        self.toplevel.set_app_id(app_id.into());
    }

    /// Acknowledge the configure with `serial`
    pub fn ack_configure(&self, serial: u32) {
        self.xdg_surface.ack_configure(serial);
    }

    /// Commit the surface
    pub fn commit(&self) {
        self.surface.commit();
    }

    /// Start an interactive move driven by the compositor
    ///
    /// `serial` must be the serial of the input event that triggered the move.
    pub fn start_move(&self, seat: &WlSeat, serial: u32) {
        self.toplevel._move(seat, serial);
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        self.toplevel.destroy();
        self.xdg_surface.destroy();
        self.surface.destroy();
    }
}

impl<D> Dispatch<xdg_wm_base::XdgWmBase, WmBaseData, D> for WindowManager
where
    D: Dispatch<xdg_wm_base::XdgWmBase, WmBaseData>,
{
    fn event(
        _: &mut D,
        wm_base: &xdg_wm_base::XdgWmBase,
        event: xdg_wm_base::Event,
        _: &WmBaseData,
        _: &Connection,
        _: &QueueHandle<D>,
    ) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            wm_base.pong(serial);
        }
    }
}

impl<D> Dispatch<xdg_surface::XdgSurface, WindowData, D> for WindowManager
where
    D: Dispatch<xdg_surface::XdgSurface, WindowData> + WindowHandler,
{
    fn event(
        state: &mut D,
        _: &xdg_surface::XdgSurface,
        event: xdg_surface::Event,
        data: &WindowData,
        conn: &Connection,
        qh: &QueueHandle<D>,
    ) {
        if let xdg_surface::Event::Configure { serial } = event {
            let (width, height) = data.latched();
            state.configure(conn, qh, WindowConfigure { serial, width, height });
        }
    }
}

impl<D> Dispatch<xdg_toplevel::XdgToplevel, WindowData, D> for WindowManager
where
    D: Dispatch<xdg_toplevel::XdgToplevel, WindowData> + WindowHandler,
{
    fn event(
        state: &mut D,
        _: &xdg_toplevel::XdgToplevel,
        event: xdg_toplevel::Event,
        data: &WindowData,
        conn: &Connection,
        qh: &QueueHandle<D>,
    ) {
        match event {
            xdg_toplevel::Event::Configure { width, height, .. } => data.latch(width, height),
            xdg_toplevel::Event::Close => state.request_close(conn, qh),
            event => trace!(?event, "ignored toplevel event"),
        }
    }
}

/// Delegate the xdg-shell objects of [`WindowManager`] to the application state
#[macro_export]
macro_rules! delegate_window {
    ($ty: ty) => {
        $crate::reexports::wayland_client::delegate_dispatch!($ty: [
            $crate::reexports::wayland_protocols::xdg::shell::client::xdg_wm_base::XdgWmBase:
                $crate::window::WmBaseData
        ] => $crate::window::WindowManager);
        $crate::reexports::wayland_client::delegate_dispatch!($ty: [
            $crate::reexports::wayland_protocols::xdg::shell::client::xdg_surface::XdgSurface:
                $crate::window::WindowData
        ] => $crate::window::WindowManager);
        $crate::reexports::wayland_client::delegate_dispatch!($ty: [
            $crate::reexports::wayland_protocols::xdg::shell::client::xdg_toplevel::XdgToplevel:
                $crate::window::WindowData
        ] => $crate::window::WindowManager);
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_data_is_shared_between_roles() {
        let surface_data = WindowData::default();
        let toplevel_data = surface_data.clone();
        assert_eq!(surface_data.latched(), (0, 0));
        toplevel_data.latch(800, 600);
        assert_eq!(surface_data.latched(), (800, 600));
    }
}
