use clap::Parser;
use hello_wayland::{input::PointerAction, lifecycle::Lifecycle, window::Size, SetupError};
use smithay_client_toolkit::{
    reexports::{
        calloop::EventLoop,
        calloop_wayland_source::WaylandSource,
        client::{
            globals::{registry_queue_init, GlobalList, GlobalListContents},
            protocol::{
                wl_pointer::WlPointer, wl_registry::WlRegistry, wl_seat::WlSeat, wl_surface::WlSurface,
            },
            Connection, Dispatch, Proxy, QueueHandle,
        },
    },
    seat::pointer::{PointerData, PointerEvent},
};
use tracing::error;

/// Command line shared by all clients
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Options {
    /// Width of the window until the compositor suggests one
    #[arg(long, default_value_t = 128)]
    pub width: u32,
    /// Height of the window until the compositor suggests one
    #[arg(long, default_value_t = 128)]
    pub height: u32,
    /// Window title
    #[arg(long)]
    pub title: Option<String>,
}

impl Options {
    pub fn size(&self) -> Size {
        Size::new(self.width.max(1), self.height.max(1))
    }

    pub fn title_or(&self, default: &str) -> String {
        self.title.clone().unwrap_or_else(|| default.to_owned())
    }
}

pub fn init_logging() {
    if let Ok(env_filter) = tracing_subscriber::EnvFilter::try_from_default_env() {
        tracing_subscriber::fmt()
            .compact()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}

pub struct Client<APP: 'static> {
    pub conn: Connection,
    pub event_loop: EventLoop<'static, APP>,
    pub globals: GlobalList,
    pub qh: QueueHandle<APP>,
}

pub fn init_connection<APP>() -> Result<Client<APP>, SetupError>
where
    APP: Dispatch<WlRegistry, GlobalListContents> + 'static,
{
    let conn = Connection::connect_to_env()?;

    let (globals, event_queue) = registry_queue_init(&conn)?;
    let qh = event_queue.handle();
    let event_loop: EventLoop<APP> = EventLoop::try_new()?;
    let loop_handle = event_loop.handle();
    WaylandSource::new(conn.clone(), event_queue)
        .insert(loop_handle)
        .map_err(|err| SetupError::EventLoop(err.error))?;

    Ok(Client {
        conn,
        event_loop,
        globals,
        qh,
    })
}

/// Application state driven by [`run`]
pub trait Running {
    fn lifecycle(&mut self) -> &mut Lifecycle;
}

/// Dispatch until the window is closed or a handler failed
pub fn run<APP: Running>(event_loop: &mut EventLoop<'static, APP>, app: &mut APP) -> Result<(), SetupError> {
    while app.lifecycle().is_running() {
        event_loop.dispatch(None, app)?;
    }
    app.lifecycle().finish()
}

/// Log a fatal error and leave with status 1
pub fn exit_on_error(result: Result<(), SetupError>) {
    if let Err(err) = result {
        error!("{}", err);
        std::process::exit(1);
    }
}

/// The seat and serial of a press in `events` that should start moving `surface`
pub fn move_request(
    surface: &WlSurface,
    pointer: &WlPointer,
    events: &[PointerEvent],
) -> Option<(WlSeat, u32)> {
    let seat = pointer.data::<PointerData>()?.seat().clone();
    events
        .iter()
        .filter(|event| &event.surface == surface)
        .find_map(|event| PointerAction::from_event(&event.kind))
        .map(|PointerAction::Move { serial }| (seat, serial))
}
