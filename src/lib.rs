#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
// Allow acronyms like EGL
#![allow(clippy::upper_case_acronyms)]

//! # hello-wayland: the smallest useful Wayland clients
//!
//! This crate collects the pieces every minimal Wayland client ends up writing: binding the
//! globals, giving a surface the xdg toplevel role, acknowledging configures, pacing rendering
//! on frame callbacks, allocating shared-memory buffers and routing a handful of input events.
//! The programs in the `clients` workspace member are built out of these pieces.
//!
//! ## Structure of the crate
//!
//! - [`window`] owns the xdg toplevel and the configure [`Handshake`](window::Handshake).
//! - [`frame`] and [`animation`] drive the render loop: one outstanding frame callback per surface,
//!   and animation state advanced by the monotonic time between passes.
//! - [`shm`] and [`os`] provide software rendering into `wl_shm` buffers backed by anonymous files.
//! - `egl` and `gles` (behind the `egl` feature) provide hardware rendering through EGL and GLES2.
//! - [`input`] and [`clipboard`] route pointer, keyboard and data-device events.
//!
//! ## State handling
//!
//! Everything is dispatched from a single thread. Protocol listeners are [`Dispatch`] implementations
//! on the application state; the objects provided here only carry the per-object data they need and
//! forward everything else to handler traits implemented by the application, in the style of
//! `smithay-client-toolkit`. Each module exposes a `delegate_*` macro wiring its objects into the
//! application state.
//!
//! ### Logging
//!
//! This crate logs through [`tracing`]. The client programs install a `tracing-subscriber` filtered
//! by `RUST_LOG`.
//!
//! [`Dispatch`]: smithay_client_toolkit::reexports::client::Dispatch

pub mod animation;
pub mod clipboard;
#[cfg(feature = "egl")]
pub mod egl;
pub mod error;
pub mod frame;
#[cfg(feature = "egl")]
pub mod gles;
pub mod input;
pub mod lifecycle;
pub mod os;
pub mod shm;
pub mod window;

pub mod reexports;

pub use error::{RenderError, SetupError};
