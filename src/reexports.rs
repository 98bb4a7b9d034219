//! Reexports of crates, that are part of the public api, for convenience

#[cfg(feature = "egl")]
pub use cgmath;
#[cfg(feature = "egl")]
pub use glow;
#[cfg(feature = "egl")]
pub use khronos_egl;
pub use smithay_client_toolkit as sctk;
pub use smithay_client_toolkit::reexports::{
    calloop, client as wayland_client, protocols as wayland_protocols,
};
#[cfg(feature = "egl")]
pub use wayland_egl;
