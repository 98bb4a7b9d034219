//! Clipboard through `wl_data_device`
//!
//! Publishing: a `wl_data_source` offering [`TEXT_PLAIN`] and [`TEXT_HTML`] is set as the
//! selection, tagged with the serial of the keyboard enter that gave the client focus. When
//! another client pastes, the compositor forwards the write end of a pipe to us through
//! `wl_data_source.send`, and [`serve`] writes the requested representation into it.
//!
//! Receiving: the compositor announces a new selection with a `wl_data_offer`. The client asks
//! the offering side to write `text/plain` into a pipe, makes sure that request reached the
//! compositor with a roundtrip and then [`drain`]s the pipe until the writer closes it.

use std::{
    fs::File,
    io::{self, Read, Write},
    os::unix::io::AsFd,
    sync::Mutex,
};

use rustix::pipe::{pipe_with, PipeFlags};
use smithay_client_toolkit::reexports::client::{
    event_created_child,
    globals::{BindError, GlobalList},
    protocol::{
        wl_data_device::{self, WlDataDevice},
        wl_data_device_manager::{self, WlDataDeviceManager},
        wl_data_offer::{self, WlDataOffer},
        wl_data_source::{self, WlDataSource},
        wl_seat::WlSeat,
    },
    Connection, Dispatch, Proxy, QueueHandle,
};
use tracing::{debug, trace, warn};

/// Plain text MIME type
pub const TEXT_PLAIN: &str = "text/plain";
/// HTML MIME type
pub const TEXT_HTML: &str = "text/html";
/// Every MIME type a published selection offers
pub const MIME_TYPES: [&str; 2] = [TEXT_PLAIN, TEXT_HTML];

/// The representations of a published selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardContent {
    plain: String,
    html: String,
}

impl ClipboardContent {
    /// Content with a plain text and an HTML representation
    pub fn new(plain: impl Into<String>, html: impl Into<String>) -> Self {
        ClipboardContent {
            plain: plain.into(),
            html: html.into(),
        }
    }

    /// Bytes to send for `mime_type`, if it is one we offer
    pub fn payload(&self, mime_type: &str) -> Option<&[u8]> {
        match mime_type {
            TEXT_PLAIN => Some(self.plain.as_bytes()),
            TEXT_HTML => Some(self.html.as_bytes()),
            _ => None,
        }
    }
}

/// Answer a send request for `mime_type` by writing into `sink`
///
/// MIME types that were not offered are declined: nothing is written and `Ok(false)` returned.
/// The sink is dropped in any case, which closes the pipe and signals the end of the transfer.
pub fn serve(content: &ClipboardContent, mime_type: &str, mut sink: impl Write) -> io::Result<bool> {
    match content.payload(mime_type) {
        Some(payload) => {
            sink.write_all(payload)?;
            sink.flush()?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Read `source` until end of file
///
/// Short reads are accumulated, interrupted reads retried.
pub fn drain(mut source: impl Read) -> io::Result<Vec<u8>> {
    let mut data = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match source.read(&mut chunk) {
            Ok(0) => return Ok(data),
            Ok(n) => data.extend_from_slice(&chunk[..n]),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}

/// Read the content of `offer` as `mime_type`
fn receive(conn: &Connection, offer: &WlDataOffer, mime_type: &str) -> io::Result<Vec<u8>> {
    let (read, write) = pipe_with(PipeFlags::CLOEXEC)?;
    offer.receive(mime_type.to_owned(), write.as_fd());
    // only the offering client may hold the write end, or the read never sees EOF
    drop(write);
    conn.roundtrip()
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
    drain(File::from(read))
}

/// User data of the data device manager, data devices and data sources
#[derive(Debug)]
pub struct ClipboardData;

/// User data of a `wl_data_offer`: the MIME types it was announced with
#[derive(Debug, Default)]
pub struct OfferData {
    mime_types: Mutex<Vec<String>>,
}

impl OfferData {
    fn push(&self, mime_type: String) {
        self.mime_types.lock().unwrap().push(mime_type);
    }

    /// Whether the offer announced `mime_type`
    pub fn offers(&self, mime_type: &str) -> bool {
        self.mime_types.lock().unwrap().iter().any(|m| m == mime_type)
    }
}

/// Handler trait for clipboard events
pub trait ClipboardHandler: Sized {
    /// The clipboard state of the application
    fn clipboard(&mut self) -> &mut Clipboard;

    /// The content of a new selection was read
    fn selection_received(&mut self, mime_type: &str, data: Vec<u8>);
}

/// Clipboard of one seat
#[derive(Debug)]
pub struct Clipboard {
    manager: WlDataDeviceManager,
    device: Option<WlDataDevice>,
    source: Option<WlDataSource>,
    content: ClipboardContent,
}

impl Clipboard {
    /// Bind `wl_data_device_manager`, publishing `content` on request
    pub fn bind<D>(
        globals: &GlobalList,
        qh: &QueueHandle<D>,
        content: ClipboardContent,
    ) -> Result<Self, BindError>
    where
        D: Dispatch<WlDataDeviceManager, ClipboardData> + 'static,
    {
        let manager = globals.bind(qh, 1..=3, ClipboardData)?;
        Ok(Clipboard {
            manager,
            device: None,
            source: None,
            content,
        })
    }

    /// Get the data device of `seat`
    ///
    /// Only the first seat is used.
    pub fn attach_seat<D>(&mut self, seat: &WlSeat, qh: &QueueHandle<D>)
    where
        D: Dispatch<WlDataDevice, ClipboardData> + 'static,
    {
        if self.device.is_none() {
            self.device = Some(self.manager.get_data_device(seat, qh, ClipboardData));
        }
    }

    /// Set our content as the selection
    ///
    /// `serial` must be the serial of the keyboard enter event of the current focus.
    pub fn publish<D>(&mut self, serial: u32, qh: &QueueHandle<D>)
    where
        D: Dispatch<WlDataSource, ClipboardData> + 'static,
    {
        let Some(device) = self.device.as_ref() else {
            warn!("no data device, cannot set the selection");
            return;
        };

        let source = self.manager.create_data_source(qh, ClipboardData);
        for mime_type in MIME_TYPES {
            source.offer(mime_type.to_owned());
        }
        device.set_selection(Some(&source), serial);
        debug!(serial, "selection set");

        if let Some(previous) = self.source.replace(source) {
            previous.destroy();
        }
    }

    /// Whether the current selection is ours
    pub fn owns_selection(&self) -> bool {
        self.source.is_some()
    }

    /// The published content
    pub fn content(&self) -> &ClipboardContent {
        &self.content
    }

    fn cancelled(&mut self, source: &WlDataSource) {
        if self.source.as_ref() == Some(source) {
            self.source = None;
        }
        source.destroy();
    }
}

impl Drop for Clipboard {
    fn drop(&mut self) {
        if let Some(source) = self.source.take() {
            source.destroy();
        }
        if let Some(device) = self.device.take() {
            if device.version() >= 2 {
                device.release();
            }
        }
    }
}

impl<D> Dispatch<WlDataDeviceManager, ClipboardData, D> for Clipboard
where
    D: Dispatch<WlDataDeviceManager, ClipboardData>,
{
    fn event(
        _: &mut D,
        _: &WlDataDeviceManager,
        _: wl_data_device_manager::Event,
        _: &ClipboardData,
        _: &Connection,
        _: &QueueHandle<D>,
    ) {
        unreachable!("wl_data_device_manager has no events")
    }
}

impl<D> Dispatch<WlDataDevice, ClipboardData, D> for Clipboard
where
    D: Dispatch<WlDataDevice, ClipboardData> + Dispatch<WlDataOffer, OfferData> + ClipboardHandler + 'static,
{
    fn event(
        state: &mut D,
        _: &WlDataDevice,
        event: wl_data_device::Event,
        _: &ClipboardData,
        conn: &Connection,
        _: &QueueHandle<D>,
    ) {
        match event {
            wl_data_device::Event::DataOffer { id } => trace!(offer = ?id.id(), "new data offer"),
            wl_data_device::Event::Selection { id: Some(offer) } => {
                if state.clipboard().owns_selection() {
                    // the offer wraps our own source, whose send requests cannot be served
                    // while we block on the pipe
                    trace!("ignoring our own selection");
                } else if offer.data::<OfferData>().map_or(false, |data| data.offers(TEXT_PLAIN)) {
                    match receive(conn, &offer, TEXT_PLAIN) {
                        Ok(data) => state.selection_received(TEXT_PLAIN, data),
                        Err(err) => warn!("failed to read the selection: {}", err),
                    }
                } else {
                    debug!("selection has no plain text representation");
                }
                offer.destroy();
            }
            wl_data_device::Event::Selection { id: None } => debug!("selection cleared"),
            // drag and drop is not supported, reject it by dropping the offer
            wl_data_device::Event::Enter { id: Some(offer), .. } => offer.destroy(),
            _ => {}
        }
    }

    event_created_child!(D, WlDataDevice, [
        wl_data_device::EVT_DATA_OFFER_OPCODE => (WlDataOffer, OfferData::default()),
    ]);
}

impl<D> Dispatch<WlDataOffer, OfferData, D> for Clipboard
where
    D: Dispatch<WlDataOffer, OfferData>,
{
    fn event(
        _: &mut D,
        _: &WlDataOffer,
        event: wl_data_offer::Event,
        data: &OfferData,
        _: &Connection,
        _: &QueueHandle<D>,
    ) {
        if let wl_data_offer::Event::Offer { mime_type } = event {
            data.push(mime_type);
        }
    }
}

impl<D> Dispatch<WlDataSource, ClipboardData, D> for Clipboard
where
    D: Dispatch<WlDataSource, ClipboardData> + ClipboardHandler,
{
    fn event(
        state: &mut D,
        source: &WlDataSource,
        event: wl_data_source::Event,
        _: &ClipboardData,
        _: &Connection,
        _: &QueueHandle<D>,
    ) {
        match event {
            wl_data_source::Event::Send { mime_type, fd } => {
                match serve(state.clipboard().content(), &mime_type, File::from(fd)) {
                    Ok(true) => debug!(mime_type, "sent selection"),
                    Ok(false) => debug!(mime_type, "declined selection request"),
                    Err(err) => warn!(mime_type, "failed to send the selection: {}", err),
                }
            }
            wl_data_source::Event::Cancelled => {
                debug!("selection replaced by another client");
                state.clipboard().cancelled(source);
            }
            _ => {}
        }
    }
}

/// Delegate the data device objects of a [`Clipboard`] to the application state
#[macro_export]
macro_rules! delegate_clipboard {
    ($ty: ty) => {
        $crate::reexports::wayland_client::delegate_dispatch!($ty: [
            $crate::reexports::wayland_client::protocol::wl_data_device_manager::WlDataDeviceManager:
                $crate::clipboard::ClipboardData
        ] => $crate::clipboard::Clipboard);
        $crate::reexports::wayland_client::delegate_dispatch!($ty: [
            $crate::reexports::wayland_client::protocol::wl_data_device::WlDataDevice:
                $crate::clipboard::ClipboardData
        ] => $crate::clipboard::Clipboard);
        $crate::reexports::wayland_client::delegate_dispatch!($ty: [
            $crate::reexports::wayland_client::protocol::wl_data_offer::WlDataOffer:
                $crate::clipboard::OfferData
        ] => $crate::clipboard::Clipboard);
        $crate::reexports::wayland_client::delegate_dispatch!($ty: [
            $crate::reexports::wayland_client::protocol::wl_data_source::WlDataSource:
                $crate::clipboard::ClipboardData
        ] => $crate::clipboard::Clipboard);
    };
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn content() -> ClipboardContent {
        ClipboardContent::new("hello wayland", "<h1>hello wayland</h1>")
    }

    /// A reader handing out at most `step` bytes per call, with an interruption in between
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        step: usize,
        interrupted: bool,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(io::Error::new(io::ErrorKind::Interrupted, "signal"));
            }
            let n = self.step.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn offers_exactly_plain_text_and_html() {
        assert_eq!(MIME_TYPES, ["text/plain", "text/html"]);
        let content = content();
        assert_eq!(content.payload(TEXT_PLAIN), Some(&b"hello wayland"[..]));
        assert_eq!(content.payload(TEXT_HTML), Some(&b"<h1>hello wayland</h1>"[..]));
    }

    #[test]
    fn unknown_mime_types_are_declined_without_writing() {
        let mut sink = Vec::new();
        for mime_type in ["image/png", "text/plain;charset=utf-8", "UTF8_STRING", ""] {
            assert!(!serve(&content(), mime_type, &mut sink).unwrap());
        }
        assert!(sink.is_empty());
    }

    #[test]
    fn known_mime_types_are_written_fully() {
        let mut sink = Vec::new();
        assert!(serve(&content(), TEXT_HTML, &mut sink).unwrap());
        assert_eq!(sink, b"<h1>hello wayland</h1>");
    }

    #[test]
    fn drain_accumulates_partial_reads_until_eof() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let trickle = Trickle {
            data: data.clone(),
            pos: 0,
            step: 7,
            interrupted: false,
        };
        assert_eq!(drain(trickle).unwrap(), data);
    }

    #[test]
    fn drain_of_empty_source() {
        assert!(drain(Cursor::new(Vec::new())).unwrap().is_empty());
    }

    #[test]
    fn drain_through_a_pipe() {
        let (read, write) = pipe_with(PipeFlags::CLOEXEC).unwrap();
        let writer = std::thread::spawn(move || {
            let mut write = File::from(write);
            for chunk in [&b"hello "[..], &b"from "[..], &b"the other side"[..]] {
                write.write_all(chunk).unwrap();
            }
        });
        let data = drain(File::from(read)).unwrap();
        writer.join().unwrap();
        assert_eq!(data, b"hello from the other side");
    }

    #[test]
    fn offer_data_tracks_mime_types() {
        let data = OfferData::default();
        data.push(TEXT_HTML.to_owned());
        assert!(!data.offers(TEXT_PLAIN));
        data.push(TEXT_PLAIN.to_owned());
        assert!(data.offers(TEXT_PLAIN));
    }
}
