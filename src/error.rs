//! Error types
//!
//! Errors come in two tiers. A [`SetupError`] means the environment cannot host the client
//! (a global is missing, memory cannot be shared, no EGL) and ends the program with a non-zero
//! exit status. A [`RenderError`] only costs the current frame, unless no frame was presented yet.

use std::io;

use smithay_client_toolkit::reexports::{
    calloop,
    client::{
        globals::{BindError, GlobalError},
        ConnectError,
    },
};

/// Fatal errors raised while bootstrapping or setting up a client
#[derive(thiserror::Error, Debug)]
pub enum SetupError {
    /// No compositor could be reached through `WAYLAND_DISPLAY` / `WAYLAND_SOCKET`
    #[error("Failed to connect to the wayland compositor: {0}")]
    Connect(#[from] ConnectError),
    /// The initial registry roundtrip failed
    #[error("Failed to retrieve the global list: {0}")]
    Globals(#[from] GlobalError),
    /// A required global is not advertised, or only in an unsupported version
    #[error("A required global is not available: {0}")]
    MissingGlobal(#[from] BindError),
    /// The event loop could not be created or polled
    #[error("Event loop failure: {0}")]
    EventLoop(#[from] calloop::Error),
    /// A shared memory file could not be created, sized or mapped
    #[error("Failed to allocate shared memory: {0}")]
    Shm(#[source] io::Error),
    /// libEGL could not be loaded at runtime
    #[cfg(feature = "egl")]
    #[error("Failed to load libEGL: {0}")]
    EglLoad(String),
    /// Unable to obtain an EGL display for the wayland connection
    #[cfg(feature = "egl")]
    #[error("Unable to obtain an EGL display for the wayland connection")]
    NoEglDisplay,
    /// No EGL config matched the requested attributes
    #[cfg(feature = "egl")]
    #[error("No EGL config matched the requested attributes")]
    NoEglConfig,
    /// An EGL call failed during setup
    #[cfg(feature = "egl")]
    #[error("EGL setup failed: {0}")]
    Egl(#[from] khronos_egl::Error),
    /// The native `wl_egl_window` could not be created
    #[cfg(feature = "egl")]
    #[error("Failed to create the wl_egl_window: {0}")]
    WaylandEgl(#[from] wayland_egl::Error),
    /// Compiling or linking a GLES program failed
    #[cfg(feature = "egl")]
    #[error("GLES setup failed: {0}")]
    Gles(String),
    /// The first frame could not be presented, so no frame callback will ever retry it
    #[error("Failed to present the first frame: {0}")]
    FirstFrame(#[source] RenderError),
}

/// Transient errors of a single render pass
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// `eglMakeCurrent` failed
    #[cfg(feature = "egl")]
    #[error("eglMakeCurrent failed: {0}")]
    MakeCurrent(#[source] khronos_egl::Error),
    /// `eglSwapBuffers` failed
    #[cfg(feature = "egl")]
    #[error("eglSwapBuffers failed: {0}")]
    SwapBuffers(#[source] khronos_egl::Error),
    /// Every shm buffer is still held by the compositor
    #[error("No shm buffer is free for drawing")]
    NoFreeBuffer,
}
