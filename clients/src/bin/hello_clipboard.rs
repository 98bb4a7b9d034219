//! Clipboard demo
//!
//! Releasing any key while the window has keyboard focus publishes a selection offering
//! `text/plain` and `text/html`. Whenever another client sets the selection, its plain text is
//! read and logged. The window itself is a static software rendered color.

use clap::Parser;
use hello_wayland::{
    clipboard::{Clipboard, ClipboardContent, ClipboardHandler},
    delegate_clipboard, delegate_keyboard_focus, delegate_shm_buffers, delegate_window,
    input::{KeyboardData, KeyboardHandler},
    lifecycle::Lifecycle,
    shm::{fill_solid, BufferRing},
    window::{Handshake, Window, WindowConfigure, WindowHandler, WindowManager},
    RenderError, SetupError,
};
use hello_wayland_clients::{Options, Running};
use smithay_client_toolkit::{
    compositor::{CompositorHandler, CompositorState},
    delegate_compositor, delegate_output, delegate_pointer, delegate_registry, delegate_seat, delegate_shm,
    output::{OutputHandler, OutputState},
    reexports::client::{
        protocol::{
            wl_keyboard::WlKeyboard,
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
    shm::{Shm, ShmHandler},
};
use tracing::{debug, info, warn};

const PLAIN: &str = "hello wayland";
const HTML: &str = "<p><b>hello</b> wayland</p>";
const BACKGROUND: [f32; 3] = [0.2, 0.4, 0.8];

fn main() {
    hello_wayland_clients::init_logging();
    let options = Options::parse();
    hello_wayland_clients::exit_on_error(run(options));
}

fn run(options: Options) -> Result<(), SetupError> {
    let hello_wayland_clients::Client {
        mut event_loop,
        globals,
        qh,
        ..
    } = hello_wayland_clients::init_connection::<App>()?;

    let compositor_state = CompositorState::bind(&globals, &qh)?;
    let window_manager = WindowManager::bind(&globals, &qh)?;
    let shm = Shm::bind(&globals, &qh)?;

    let window = window_manager.create_window(compositor_state.create_surface(&qh), &qh);
    window.set_title(options.title_or("hello-clipboard"));
    window.set_app_id("hello-clipboard");
    // the initial commit carries no buffer, the compositor answers with the first configure
    window.commit();

    let mut clipboard = Clipboard::bind(&globals, &qh, ClipboardContent::new(PLAIN, HTML))?;
    let seat_state = SeatState::new(&globals, &qh);
    if let Some(seat) = seat_state.seats().next() {
        clipboard.attach_seat(&seat, &qh);
    }

    let mut app = App {
        registry_state: RegistryState::new(&globals),
        output_state: OutputState::new(&globals, &qh),
        seat_state,
        shm,
        pointer: None,
        keyboard: None,
        clipboard,

        window,
        buffers: BufferRing::new(),
        handshake: Handshake::new(options.size()),
        lifecycle: Lifecycle::new(),
    };

    hello_wayland_clients::run(&mut event_loop, &mut app)
}

struct App {
    registry_state: RegistryState,
    output_state: OutputState,
    seat_state: SeatState,
    shm: Shm,
    pointer: Option<WlPointer>,
    keyboard: Option<WlKeyboard>,
    clipboard: Clipboard,

    window: Window,
    buffers: BufferRing,
    handshake: Handshake,
    lifecycle: Lifecycle,
}

impl App {
    fn draw(&mut self, qh: &QueueHandle<Self>) {
        if !self.handshake.may_attach() {
            return;
        }

        let surface = self.window.wl_surface();
        match self.buffers.acquire(self.shm.wl_shm(), self.handshake.size(), qh) {
            Ok(Some(mut frame)) => {
                fill_solid(frame.canvas(), BACKGROUND);
                frame.attach(surface);
            }
            Ok(None) => debug!("{}, skipping frame", RenderError::NoFreeBuffer),
            Err(err) => {
                self.lifecycle.fail(SetupError::Shm(err));
                return;
            }
        }

        self.window.commit();
    }
}

impl WindowHandler for App {
    fn configure(&mut self, _: &Connection, qh: &QueueHandle<Self>, configure: WindowConfigure) {
        self.handshake
            .configure(configure.serial, configure.width, configure.height);
        if let Some(ack) = self.handshake.acknowledge() {
            self.window.ack_configure(ack.serial);
            // nothing animates, so every configure is drawn right away
            self.draw(qh);
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

impl KeyboardHandler for App {
    fn key_released(
        &mut self,
        _: &Connection,
        qh: &QueueHandle<Self>,
        _: &WlKeyboard,
        key: u32,
        focus_serial: u32,
    ) {
        debug!(key, "key released, setting the selection");
        self.clipboard.publish(focus_serial, qh);
    }
}

impl ClipboardHandler for App {
    fn clipboard(&mut self) -> &mut Clipboard {
        &mut self.clipboard
    }

    fn selection_received(&mut self, mime_type: &str, data: Vec<u8>) {
        info!(mime_type, "selection: {}", String::from_utf8_lossy(&data));
    }
}

impl CompositorHandler for App {
    fn frame(&mut self, _: &Connection, _: &QueueHandle<Self>, _: &WlSurface, _: u32) {}

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

    fn new_seat(&mut self, _: &Connection, qh: &QueueHandle<Self>, seat: wl_seat::WlSeat) {
        self.clipboard.attach_seat(&seat, qh);
    }

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
        if capability == Capability::Keyboard && self.keyboard.is_none() {
            self.keyboard = Some(seat.get_keyboard(qh, KeyboardData::default()));
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
        if capability == Capability::Keyboard {
            if let Some(keyboard) = self.keyboard.take() {
                if keyboard.version() >= 3 {
                    keyboard.release();
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

impl ShmHandler for App {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.shm
    }
}

impl ProvidesRegistryState for App {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }
    registry_handlers![OutputState, SeatState];
}

delegate_compositor!(App);
delegate_output!(App);
delegate_shm!(App);
delegate_seat!(App);
delegate_pointer!(App);
delegate_registry!(App);

delegate_window!(App);
delegate_shm_buffers!(App);
delegate_keyboard_focus!(App);
delegate_clipboard!(App);
