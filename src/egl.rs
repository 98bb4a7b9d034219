//! EGL window surfaces on top of a wayland connection
//!
//! libEGL is loaded at runtime, so building the crate does not need any graphics library
//! installed. An [`EglContext`] owns everything between the `wl_surface` and GLES: the EGL
//! display of the connection, an OpenGL ES 2 context, the native `wl_egl_window` and the EGL
//! window surface drawing into it.
//!
//! Swapping buffers attaches and commits the surface, so anything that has to be part of the
//! same commit (acknowledging a configure, requesting a frame callback) must happen before
//! [`EglContext::swap_buffers`].

use std::{ffi::c_void, fmt, ptr};

use khronos_egl as egl;
use smithay_client_toolkit::reexports::client::{protocol::wl_surface::WlSurface, Connection, Proxy};
use tracing::{debug, info, warn};
use wayland_egl::WlEglSurface;

use crate::{
    error::{RenderError, SetupError},
    window::Size,
};

type Egl = egl::DynamicInstance<egl::EGL1_4>;

/// Attributes of the frame buffer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigRequest {
    /// Ask for a depth buffer of at least 16 bits
    pub depth: bool,
}

impl ConfigRequest {
    fn attributes(self) -> Vec<egl::Int> {
        let mut attribs = vec![
            egl::SURFACE_TYPE,
            egl::WINDOW_BIT,
            egl::RENDERABLE_TYPE,
            egl::OPENGL_ES2_BIT,
            egl::RED_SIZE,
            8,
            egl::GREEN_SIZE,
            8,
            egl::BLUE_SIZE,
            8,
        ];
        if self.depth {
            attribs.extend_from_slice(&[egl::DEPTH_SIZE, 16]);
        }
        attribs.push(egl::NONE);
        attribs
    }
}

/// An OpenGL ES 2 context rendering into one `wl_surface`
pub struct EglContext {
    egl: Egl,
    display: egl::Display,
    context: egl::Context,
    surface: egl::Surface,
    // dropped after the EGL surface using it is destroyed
    native: WlEglSurface,
    gl: glow::Context,
    size: Size,
}

impl fmt::Debug for EglContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EglContext")
            .field("display", &self.display)
            .field("context", &self.context)
            .field("surface", &self.surface)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl EglContext {
    /// Create a context for `surface`, initially sized `size`
    ///
    /// The context is left current with a swap interval of 0: pacing comes from frame callbacks,
    /// not from blocking in `eglSwapBuffers`.
    pub fn new(
        conn: &Connection,
        surface: &WlSurface,
        size: Size,
        request: ConfigRequest,
    ) -> Result<EglContext, SetupError> {
        // SAFETY: libEGL is a system library following the EGL 1.4 ABI
        let egl = unsafe { Egl::load_required() }.map_err(|err| SetupError::EglLoad(err.to_string()))?;

        let display_ptr = conn.backend().display_ptr() as *mut c_void;
        // SAFETY: the wl_display outlives the EGL display, which is terminated on drop
        let display = unsafe { egl.get_display(display_ptr) }.ok_or(SetupError::NoEglDisplay)?;
        let (major, minor) = egl.initialize(display)?;
        info!(major, minor, "initialized EGL");

        egl.bind_api(egl::OPENGL_ES_API)?;
        let config = egl
            .choose_first_config(display, &request.attributes())?
            .ok_or(SetupError::NoEglConfig)?;
        let context = egl.create_context(
            display,
            config,
            None,
            &[egl::CONTEXT_CLIENT_VERSION, 2, egl::NONE],
        )?;

        let native = WlEglSurface::new(surface.id(), size.width as i32, size.height as i32)?;
        // SAFETY: the native window stays alive as long as the EGL surface
        let egl_surface = unsafe {
            egl.create_window_surface(display, config, native.ptr() as egl::NativeWindowType, None)?
        };

        egl.make_current(display, Some(egl_surface), Some(egl_surface), Some(context))?;
        egl.swap_interval(display, 0)?;

        // SAFETY: the context is current on this thread
        let gl = unsafe {
            glow::Context::from_loader_function(|name| {
                egl.get_proc_address(name)
                    .map_or(ptr::null(), |f| f as *const c_void)
            })
        };
        debug!(?size, depth = request.depth, "created EGL window surface");

        Ok(EglContext {
            egl,
            display,
            context,
            surface: egl_surface,
            native,
            gl,
            size,
        })
    }

    /// Make this context current on the calling thread
    pub fn make_current(&self) -> Result<(), RenderError> {
        self.egl
            .make_current(self.display, Some(self.surface), Some(self.surface), Some(self.context))
            .map_err(RenderError::MakeCurrent)
    }

    /// Resize the native window, taking effect with the next swap
    pub fn resize(&mut self, size: Size) {
        if size != self.size {
            debug!(old = ?self.size, new = ?size, "resizing EGL window");
            self.native.resize(size.width as i32, size.height as i32, 0, 0);
            self.size = size;
        }
    }

    /// Present the back buffer, committing the surface
    pub fn swap_buffers(&self) -> Result<(), RenderError> {
        self.egl
            .swap_buffers(self.display, self.surface)
            .map_err(RenderError::SwapBuffers)
    }

    /// GLES entry points of this context
    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    /// Current size of the native window
    pub fn size(&self) -> Size {
        self.size
    }
}

impl Drop for EglContext {
    fn drop(&mut self) {
        if let Err(err) = self.egl.make_current(self.display, None, None, None) {
            warn!("failed to release the EGL context: {}", err);
        }
        let _ = self.egl.destroy_surface(self.display, self.surface);
        let _ = self.egl.destroy_context(self.display, self.context);
        let _ = self.egl.terminate(self.display);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_of(attribs: &[egl::Int], key: egl::Int) -> Option<egl::Int> {
        attribs
            .chunks(2)
            .find(|pair| pair[0] == key)
            .and_then(|pair| pair.get(1).copied())
    }

    #[test]
    fn config_requests_gles2_window_surfaces() {
        let attribs = ConfigRequest::default().attributes();
        assert_eq!(attribs.last(), Some(&egl::NONE));
        assert_eq!(value_of(&attribs, egl::SURFACE_TYPE), Some(egl::WINDOW_BIT));
        assert_eq!(value_of(&attribs, egl::RENDERABLE_TYPE), Some(egl::OPENGL_ES2_BIT));
        assert_eq!(value_of(&attribs, egl::RED_SIZE), Some(8));
        assert_eq!(value_of(&attribs, egl::DEPTH_SIZE), None);
    }

    #[test]
    fn depth_is_requested_on_demand() {
        let attribs = ConfigRequest { depth: true }.attributes();
        assert_eq!(value_of(&attribs, egl::DEPTH_SIZE), Some(16));
        assert_eq!(attribs.last(), Some(&egl::NONE));
    }
}
