//! A rotating cube drawn with GLES2
//!
//! Same render loop as `hello-egl`, with a depth buffer and a model-view-projection matrix
//! recomputed from the elapsed time on every pass.

use clap::Parser;
use hello_wayland::{
    animation::{FrameClock, Spin},
    delegate_window,
    egl::{ConfigRequest, EglContext},
    frame::FramePacer,
    gles::CubeRenderer,
    lifecycle::Lifecycle,
    window::{ConfigureKind, Handshake, Window, WindowConfigure, WindowHandler, WindowManager},
    SetupError,
};
use hello_wayland_clients::{Options, Running};
use smithay_client_toolkit::{
    compositor::{CompositorHandler, CompositorState},
    delegate_compositor, delegate_output, delegate_pointer, delegate_registry, delegate_seat,
    output::{OutputHandler, OutputState},
    reexports::client::{
        protocol::{
            wl_output::{self, WlOutput},
            wl_pointer::WlPointer,
            wl_seat,
            wl_surface::WlSurface,
        },
        Connection, Proxy, QueueHandle,
    },
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    seat::{
        pointer::{PointerEvent, PointerHandler},
        Capability, SeatHandler, SeatState,
    },
};
use tracing::{info, warn};

const DEGREES_PER_SECOND: f32 = 45.0;

fn main() {
    hello_wayland_clients::init_logging();
    let options = Options::parse();
    hello_wayland_clients::exit_on_error(run(options));
}

fn run(options: Options) -> Result<(), SetupError> {
    let hello_wayland_clients::Client {
        conn,
        mut event_loop,
        globals,
        qh,
    } = hello_wayland_clients::init_connection::<App>()?;

    let compositor_state = CompositorState::bind(&globals, &qh)?;
    let window_manager = WindowManager::bind(&globals, &qh)?;

    let window = window_manager.create_window(compositor_state.create_surface(&qh), &qh);
    window.set_title(options.title_or("hello-cube"));
    window.set_app_id("hello-cube");

    let size = options.size();
    let egl = EglContext::new(&conn, window.wl_surface(), size, ConfigRequest { depth: true })?;
    let cube = CubeRenderer::new(egl.gl())?;
    window.commit();

    let mut app = App {
        registry_state: RegistryState::new(&globals),
        output_state: OutputState::new(&globals, &qh),
        seat_state: SeatState::new(&globals, &qh),
        pointer: None,

        cube: Some(cube),
        egl,
        window,
        handshake: Handshake::new(size),
        pacer: FramePacer::new(),
        clock: FrameClock::new(),
        spin: Spin::new(DEGREES_PER_SECOND),
        presented: false,
        lifecycle: Lifecycle::new(),
    };

    hello_wayland_clients::run(&mut event_loop, &mut app)
}

struct App {
    registry_state: RegistryState,
    output_state: OutputState,
    seat_state: SeatState,
    pointer: Option<WlPointer>,

    cube: Option<CubeRenderer>,
    // the EGL surface goes before the wl_surface under it
    egl: EglContext,
    window: Window,
    handshake: Handshake,
    pacer: FramePacer,
    clock: FrameClock,
    spin: Spin,
    // whether a swap succeeded, before that a failed pass cannot be retried
    presented: bool,
    lifecycle: Lifecycle,
}

impl App {
    fn render(&mut self, qh: &QueueHandle<Self>) {
        if !self.handshake.may_attach() && !self.handshake.is_pending() {
            return;
        }

        self.spin.advance(self.clock.tick());

        if let Err(err) = self.egl.make_current() {
            if self.lifecycle.frame_failed(err, self.presented) {
                self.skip_frame(qh);
            }
            return;
        }

        if let Some(ack) = self.handshake.acknowledge() {
            self.egl.resize(ack.size);
            self.window.ack_configure(ack.serial);
        }

        if let Some(cube) = &self.cube {
            cube.draw(self.egl.gl(), self.egl.size(), self.spin.degrees());
        }

        // swapping commits, the callback has to be part of that commit
        self.pacer.request(self.window.wl_surface(), qh);
        match self.egl.swap_buffers() {
            Ok(()) => self.presented = true,
            Err(err) => {
                if self.lifecycle.frame_failed(err, self.presented) {
                    self.window.commit();
                }
            }
        }
    }

    fn skip_frame(&mut self, qh: &QueueHandle<Self>) {
        self.pacer.request(self.window.wl_surface(), qh);
        self.window.commit();
    }
}

impl Drop for App {
    fn drop(&mut self) {
        if let Some(cube) = self.cube.take() {
            if self.egl.make_current().is_ok() {
                cube.destroy(self.egl.gl());
            }
        }
    }
}

impl WindowHandler for App {
    fn configure(&mut self, _: &Connection, qh: &QueueHandle<Self>, configure: WindowConfigure) {
        let kind = self
            .handshake
            .configure(configure.serial, configure.width, configure.height);
        if kind == ConfigureKind::Initial {
            info!("window configured");
            self.render(qh);
        }
    }

    fn request_close(&mut self, _: &Connection, _: &QueueHandle<Self>) {
        self.lifecycle.request_close();
    }
}

impl Running for App {
    fn lifecycle(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }
}

impl CompositorHandler for App {
    fn frame(&mut self, _: &Connection, qh: &QueueHandle<Self>, _: &WlSurface, _: u32) {
        self.pacer.done();
        self.render(qh);
    }

    fn surface_enter(&mut self, _: &Connection, _: &QueueHandle<Self>, _: &WlSurface, _: &WlOutput) {}
    fn surface_leave(&mut self, _: &Connection, _: &QueueHandle<Self>, _: &WlSurface, _: &WlOutput) {}
    fn scale_factor_changed(&mut self, _: &Connection, _: &QueueHandle<Self>, _: &WlSurface, _: i32) {}
    fn transform_changed(
        &mut self,
        _: &Connection,
        _: &QueueHandle<Self>,
        _: &WlSurface,
        _: wl_output::Transform,
    ) {
    }
}

impl PointerHandler for App {
    fn pointer_frame(
        &mut self,
        _: &Connection,
        _: &QueueHandle<Self>,
        pointer: &WlPointer,
        events: &[PointerEvent],
    ) {
        let surface = self.window.wl_surface();
        if let Some((seat, serial)) = hello_wayland_clients::move_request(surface, pointer, events) {
            self.window.start_move(&seat, serial);
        }
    }
}

impl SeatHandler for App {
    fn seat_state(&mut self) -> &mut SeatState {
        &mut self.seat_state
    }

    fn new_seat(&mut self, _: &Connection, _: &QueueHandle<Self>, _: wl_seat::WlSeat) {}

    fn new_capability(
        &mut self,
        _: &Connection,
        qh: &QueueHandle<Self>,
        seat: wl_seat::WlSeat,
        capability: Capability,
    ) {
        if capability == Capability::Pointer && self.pointer.is_none() {
            match self.seat_state.get_pointer(qh, &seat) {
                Ok(pointer) => self.pointer = Some(pointer),
                Err(err) => warn!("failed to get pointer: {}", err),
            }
        }
    }

    fn remove_capability(
        &mut self,
        _: &Connection,
        _: &QueueHandle<Self>,
        _: wl_seat::WlSeat,
        capability: Capability,
    ) {
        if capability == Capability::Pointer {
            if let Some(pointer) = self.pointer.take() {
                if pointer.version() >= 3 {
                    pointer.release();
                }
            }
        }
    }

    fn remove_seat(&mut self, _: &Connection, _: &QueueHandle<Self>, _: wl_seat::WlSeat) {}
}

impl OutputHandler for App {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }
    fn new_output(&mut self, _: &Connection, _: &QueueHandle<Self>, _: WlOutput) {}
    fn update_output(&mut self, _: &Connection, _: &QueueHandle<Self>, _: WlOutput) {}
    fn output_destroyed(&mut self, _: &Connection, _: &QueueHandle<Self>, _: WlOutput) {}
}

impl ProvidesRegistryState for App {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }
    registry_handlers![OutputState, SeatState];
}

delegate_compositor!(App);
delegate_output!(App);
delegate_seat!(App);
delegate_pointer!(App);
delegate_registry!(App);

delegate_window!(App);
