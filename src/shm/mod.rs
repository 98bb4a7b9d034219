//! Software rendering into `wl_shm` buffers
//!
//! The compositor reads a shm buffer from the moment it is attached and committed until it sends
//! `wl_buffer.release`. Drawing into it in between races with the compositor, so buffers are
//! kept in a [`BufferRing`]: each slot remembers whether it was released, drawing always picks a
//! released slot, and the ring grows by one slot when every buffer is still held.
//!
//! ```ignore
//! let mut buffers = BufferRing::new();
//! if let Some(mut frame) = buffers.acquire(shm.wl_shm(), size, &qh)? {
//!     fill_solid(frame.canvas(), [1.0, 0.0, 0.0]);
//!     frame.attach(window.wl_surface());
//! }
//! window.commit();
//!
//! delegate_shm_buffers!(App);
//! ```
//!
//! Every slot owns a pool of its own, so a resize simply drops the whole ring.

mod pool;

pub use self::pool::{PoolData, ShmPool};

use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use smithay_client_toolkit::reexports::client::{
    protocol::{wl_buffer, wl_shm, wl_shm_pool, wl_surface::WlSurface},
    Connection, Dispatch, Proxy, QueueHandle,
};
use tracing::{debug, trace};

use crate::window::Size;

/// Bytes per ARGB8888 pixel
pub const BYTES_PER_PIXEL: u32 = 4;

/// Slots allocated up front
pub const MIN_SLOTS: usize = 2;

/// Upper bound on slots when the compositor holds on to buffers
pub const MAX_SLOTS: usize = 4;

/// Stride of a tightly packed ARGB8888 row, `None` if it does not fit a `u32`
pub const fn stride(width: u32) -> Option<u32> {
    width.checked_mul(BYTES_PER_PIXEL)
}

/// Stride and byte length of an ARGB8888 buffer of `size`
///
/// Sizes whose stride or length cannot be described on the wire are rejected with
/// [`io::ErrorKind::InvalidInput`].
fn layout(size: Size) -> io::Result<(i32, usize)> {
    let too_large = || {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("shm buffer of {:?} is too large", size),
        )
    };
    let stride = stride(size.width)
        .and_then(|stride| i32::try_from(stride).ok())
        .filter(|_| i32::try_from(size.height).is_ok())
        .ok_or_else(too_large)?;
    let len = (stride as usize)
        .checked_mul(size.height as usize)
        .filter(|&len| i32::try_from(len).is_ok())
        .ok_or_else(too_large)?;
    Ok((stride, len))
}

/// Fill an ARGB8888 canvas with one opaque color
///
/// Channels are given in `0.0..=1.0`; opaque pixels are identical in premultiplied and straight
/// alpha.
pub fn fill_solid(canvas: &mut [u8], rgb: [f32; 3]) {
    let [r, g, b] = rgb.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u32);
    let pixel = ((0xFF << 24) | (r << 16) | (g << 8) | b).to_le_bytes();
    canvas
        .chunks_exact_mut(BYTES_PER_PIXEL as usize)
        .for_each(|chunk| chunk.copy_from_slice(&pixel));
}

/// Release state of one buffer
#[derive(Debug, Default)]
pub struct SlotState {
    busy: AtomicBool,
}

impl SlotState {
    /// Whether the compositor may still read the buffer
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// The buffer was attached and is now owned by the compositor
    pub fn mark_busy(&self) {
        self.busy.store(true, Ordering::Release);
    }

    /// The compositor released the buffer
    pub fn release(&self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// User data of the `wl_buffer` objects of a [`BufferRing`]
#[derive(Debug, Clone)]
pub struct BufferData {
    state: Arc<SlotState>,
}

/// Pick the first slot not held by the compositor, starting at `start`
fn pick_slot(len: usize, start: usize, is_busy: impl Fn(usize) -> bool) -> Option<usize> {
    (0..len).map(|offset| (start + offset) % len).find(|&index| !is_busy(index))
}

/// What [`BufferRing::acquire`] does to hand out a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Plan {
    /// Drop every buffer and allocate [`MIN_SLOTS`] of the wanted size, drawing into the first
    Realloc,
    /// Draw into an existing released buffer
    Reuse(usize),
    /// Every buffer is busy, add one and draw into it
    Grow,
    /// Every one of [`MAX_SLOTS`] buffers is busy
    Full,
}

/// Decide how to serve a buffer of `wanted` from `len` buffers of size `current`
///
/// `free` is the released slot [`pick_slot`] found, if any.
fn plan(current: Option<Size>, wanted: Size, len: usize, free: Option<usize>) -> Plan {
    if current != Some(wanted) || len < MIN_SLOTS {
        return Plan::Realloc;
    }
    match free {
        Some(index) => Plan::Reuse(index),
        None if len < MAX_SLOTS => Plan::Grow,
        None => Plan::Full,
    }
}

#[derive(Debug)]
struct Slot {
    buffer: wl_buffer::WlBuffer,
    state: Arc<SlotState>,
    pool: ShmPool,
}

impl Slot {
    fn new<D>(shm: &wl_shm::WlShm, size: Size, qh: &QueueHandle<D>) -> io::Result<Slot>
    where
        D: Dispatch<wl_shm_pool::WlShmPool, PoolData> + Dispatch<wl_buffer::WlBuffer, BufferData> + 'static,
    {
        let (stride, len) = layout(size)?;
        let pool = ShmPool::new(shm, len, qh)?;
        let state = Arc::new(SlotState::default());
        let buffer = pool.create_buffer(
            0,
            size.width as i32,
            size.height as i32,
            stride,
            wl_shm::Format::Argb8888,
            BufferData { state: state.clone() },
            qh,
        );
        Ok(Slot { buffer, state, pool })
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.buffer.destroy();
    }
}

/// A buffer that is free for drawing
#[derive(Debug)]
pub struct ShmFrame<'a> {
    canvas: &'a mut [u8],
    buffer: &'a wl_buffer::WlBuffer,
    state: &'a SlotState,
    size: Size,
}

impl ShmFrame<'_> {
    /// Pixels of the buffer, `size.height` rows of [`stride`] bytes
    pub fn canvas(&mut self) -> &mut [u8] {
        self.canvas
    }

    /// Size of the buffer
    pub fn size(&self) -> Size {
        self.size
    }

    /// Attach the buffer to `surface` and damage all of it
    ///
    /// The buffer belongs to the compositor until it is released; the next commit of `surface`
    /// hands it over.
    pub fn attach(self, surface: &WlSurface) {
        surface.attach(Some(self.buffer), 0, 0);
        if surface.version() >= 4 {
            surface.damage_buffer(0, 0, self.size.width as i32, self.size.height as i32);
        } else {
            surface.damage(0, 0, self.size.width as i32, self.size.height as i32);
        }
        self.state.mark_busy();
    }
}

/// Shm buffers rotated between client and compositor
#[derive(Debug, Default)]
pub struct BufferRing {
    slots: Vec<Slot>,
    size: Option<Size>,
    next: usize,
}

impl BufferRing {
    /// An empty ring, buffers are allocated on first use
    pub fn new() -> Self {
        Self::default()
    }

    /// Size of the current buffers
    pub fn size(&self) -> Option<Size> {
        self.size
    }

    /// Number of allocated buffers
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no buffer is allocated
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop every buffer
    pub fn clear(&mut self) {
        self.slots.clear();
        self.size = None;
        self.next = 0;
    }

    /// Get a released buffer of `size`
    ///
    /// Buffers of another size are dropped first. Returns `Ok(None)` when all
    /// [`MAX_SLOTS`] buffers are held by the compositor.
    pub fn acquire<D>(
        &mut self,
        shm: &wl_shm::WlShm,
        size: Size,
        qh: &QueueHandle<D>,
    ) -> io::Result<Option<ShmFrame<'_>>>
    where
        D: Dispatch<wl_shm_pool::WlShmPool, PoolData> + Dispatch<wl_buffer::WlBuffer, BufferData> + 'static,
    {
        let slots = &self.slots;
        let free = pick_slot(slots.len(), self.next, |index| slots[index].state.is_busy());
        let next = plan(self.size, size, slots.len(), free);
        let index = match next {
            Plan::Realloc => {
                if let Some(old) = self.size {
                    debug!(?old, new = ?size, "reallocating shm buffers");
                }
                self.clear();
                for _ in 0..MIN_SLOTS {
                    self.slots.push(Slot::new(shm, size, qh)?);
                }
                self.size = Some(size);
                0
            }
            Plan::Reuse(index) => index,
            Plan::Grow => {
                debug!(slots = self.slots.len() + 1, "all shm buffers busy, growing the ring");
                self.slots.push(Slot::new(shm, size, qh)?);
                self.slots.len() - 1
            }
            Plan::Full => return Ok(None),
        };
        self.next = (index + 1) % self.slots.len();
        trace!(index, "drawing into shm buffer");

        let slot = &mut self.slots[index];
        Ok(Some(ShmFrame {
            canvas: slot.pool.mmap(),
            buffer: &slot.buffer,
            state: &slot.state,
            size,
        }))
    }
}

impl<D> Dispatch<wl_shm_pool::WlShmPool, PoolData, D> for BufferRing
where
    D: Dispatch<wl_shm_pool::WlShmPool, PoolData>,
{
    fn event(
        _: &mut D,
        _: &wl_shm_pool::WlShmPool,
        _: wl_shm_pool::Event,
        _: &PoolData,
        _: &Connection,
        _: &QueueHandle<D>,
    ) {
        unreachable!("wl_shm_pool has no events")
    }
}

impl<D> Dispatch<wl_buffer::WlBuffer, BufferData, D> for BufferRing
where
    D: Dispatch<wl_buffer::WlBuffer, BufferData>,
{
    fn event(
        _: &mut D,
        _: &wl_buffer::WlBuffer,
        event: wl_buffer::Event,
        data: &BufferData,
        _: &Connection,
        _: &QueueHandle<D>,
    ) {
        if let wl_buffer::Event::Release = event {
            data.state.release();
        }
    }
}

/// Delegate the shm pools and buffers of a [`BufferRing`] to the application state
#[macro_export]
macro_rules! delegate_shm_buffers {
    ($ty: ty) => {
        $crate::reexports::wayland_client::delegate_dispatch!($ty: [
            $crate::reexports::wayland_client::protocol::wl_shm_pool::WlShmPool: $crate::shm::PoolData
        ] => $crate::shm::BufferRing);
        $crate::reexports::wayland_client::delegate_dispatch!($ty: [
            $crate::reexports::wayland_client::protocol::wl_buffer::WlBuffer: $crate::shm::BufferData
        ] => $crate::shm::BufferRing);
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_has_no_padding() {
        assert_eq!(stride(128), Some(512));
        assert_eq!(stride(1), Some(4));
        assert_eq!(layout(Size::new(128, 64)).unwrap(), (512, 512 * 64));
    }

    #[test]
    fn oversized_buffers_are_rejected() {
        assert_eq!(stride(1 << 30), None);
        for size in [
            Size::new(1 << 30, 1),
            Size::new(1 << 29, 1),
            Size::new(1 << 15, 1 << 15),
            Size::new(1, u32::MAX),
        ] {
            let err = layout(size).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{:?}", size);
        }
    }

    #[test]
    fn solid_fill_is_little_endian_argb() {
        let mut canvas = vec![0u8; 4 * 3];
        fill_solid(&mut canvas, [1.0, 0.5, 0.0]);
        for pixel in canvas.chunks_exact(4) {
            // B, G, R, A in memory
            assert_eq!(pixel, &[0x00, 0x80, 0xFF, 0xFF]);
        }
    }

    #[test]
    fn solid_fill_clamps_channels() {
        let mut canvas = vec![0u8; 4];
        fill_solid(&mut canvas, [1.5, -0.25, 0.0]);
        assert_eq!(canvas, [0x00, 0x00, 0xFF, 0xFF]);
    }

    #[test]
    fn released_slot_is_reused() {
        let slot = SlotState::default();
        assert!(!slot.is_busy());
        slot.mark_busy();
        assert!(slot.is_busy());
        slot.release();
        assert!(!slot.is_busy());
    }

    #[test]
    fn busy_slots_are_never_picked() {
        let slots: Vec<SlotState> = (0..3).map(|_| SlotState::default()).collect();
        let busy = |index: usize| slots[index].is_busy();

        assert_eq!(pick_slot(slots.len(), 0, busy), Some(0));
        slots[0].mark_busy();
        assert_eq!(pick_slot(slots.len(), 0, busy), Some(1));
        assert_eq!(pick_slot(slots.len(), 2, busy), Some(2));

        slots[1].mark_busy();
        slots[2].mark_busy();
        assert_eq!(pick_slot(slots.len(), 1, busy), None);

        slots[0].release();
        assert_eq!(pick_slot(slots.len(), 1, busy), Some(0));
    }

    #[test]
    fn rotation_starts_after_the_last_buffer() {
        let slots: Vec<SlotState> = (0..2).map(|_| SlotState::default()).collect();
        assert_eq!(pick_slot(slots.len(), 1, |index| slots[index].is_busy()), Some(1));
    }

    const SIZE: Size = Size::new(64, 32);

    #[test]
    fn first_buffer_allocates_the_ring() {
        assert_eq!(plan(None, SIZE, 0, None), Plan::Realloc);
    }

    #[test]
    fn resize_drops_every_buffer() {
        let old = Size::new(32, 32);
        assert_eq!(plan(Some(old), SIZE, MIN_SLOTS, Some(0)), Plan::Realloc);
        assert_eq!(plan(Some(old), SIZE, MAX_SLOTS, None), Plan::Realloc);
    }

    #[test]
    fn released_buffer_is_drawn_into() {
        assert_eq!(plan(Some(SIZE), SIZE, MIN_SLOTS, Some(1)), Plan::Reuse(1));
        assert_eq!(plan(Some(SIZE), SIZE, MAX_SLOTS, Some(3)), Plan::Reuse(3));
    }

    #[test]
    fn ring_grows_up_to_the_limit() {
        let mut len = MIN_SLOTS;
        while plan(Some(SIZE), SIZE, len, None) == Plan::Grow {
            len += 1;
        }
        assert_eq!(len, MAX_SLOTS);
        assert_eq!(plan(Some(SIZE), SIZE, MAX_SLOTS, None), Plan::Full);
    }
}
