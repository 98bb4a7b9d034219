use std::{
    io,
    os::unix::io::{AsFd, OwnedFd},
    ptr::{self, NonNull},
    slice,
};

use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use smithay_client_toolkit::reexports::client::{
    protocol::{wl_buffer::WlBuffer, wl_shm, wl_shm_pool::WlShmPool},
    Dispatch, QueueHandle,
};
use tracing::trace;

use super::BufferData;
use crate::os;

/// User data of the `wl_shm_pool` objects created by this crate
#[derive(Debug)]
pub struct PoolData;

/// A shared mapping of a whole anonymous file
#[derive(Debug)]
struct MemMap {
    ptr: NonNull<u8>,
    len: usize,
}

impl MemMap {
    fn new(fd: &OwnedFd, len: usize) -> io::Result<MemMap> {
        // SAFETY: a fresh shared mapping, nothing else in this process references that memory
        let ptr = unsafe {
            mmap(
                ptr::null_mut(),
                len,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                fd,
                0,
            )?
        };
        let ptr = NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "mmap returned a null mapping"))?;
        Ok(MemMap { ptr, len })
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: the mapping is `len` bytes long and lives as long as `self`
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for MemMap {
    fn drop(&mut self) {
        // unmapping a mapping we created cannot fail
        let _ = unsafe { munmap(self.ptr.as_ptr().cast(), self.len) };
    }
}

/// A `wl_shm_pool` together with the client side mapping of its memory
#[derive(Debug)]
pub struct ShmPool {
    pool: WlShmPool,
    map: MemMap,
}

impl ShmPool {
    /// Allocate a pool of `len` bytes
    pub fn new<D>(shm: &wl_shm::WlShm, len: usize, qh: &QueueHandle<D>) -> io::Result<ShmPool>
    where
        D: Dispatch<WlShmPool, PoolData> + 'static,
    {
        let wire_len = i32::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "shm pool larger than 2GiB"))?;
        let fd = os::create_anonymous_file(len as u64)?;
        let map = MemMap::new(&fd, len)?;
        // the compositor keeps its own reference to the file, ours is closed on return
        let pool = shm.create_pool(fd.as_fd(), wire_len, qh, PoolData);
        trace!(len, "created shm pool");
        Ok(ShmPool { pool, map })
    }

    /// Create a buffer covering part of the pool
    #[allow(clippy::too_many_arguments)]
    pub fn create_buffer<D>(
        &self,
        offset: i32,
        width: i32,
        height: i32,
        stride: i32,
        format: wl_shm::Format,
        data: BufferData,
        qh: &QueueHandle<D>,
    ) -> WlBuffer
    where
        D: Dispatch<WlBuffer, BufferData> + 'static,
    {
        self.pool
            .create_buffer(offset, width, height, stride, format, qh, data)
    }

    /// The pool memory
    pub fn mmap(&mut self) -> &mut [u8] {
        self.map.as_mut_slice()
    }

    /// Size of the pool in bytes
    pub fn len(&self) -> usize {
        self.map.len
    }

    /// Whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.map.len == 0
    }
}

impl Drop for ShmPool {
    fn drop(&mut self) {
        self.pool.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_is_shared_with_the_file() {
        use std::{
            fs::File,
            io::{Read, Seek, SeekFrom},
        };

        let fd = os::create_anonymous_file(64).unwrap();
        let mut map = MemMap::new(&fd, 64).unwrap();
        map.as_mut_slice()[..4].copy_from_slice(&[1, 2, 3, 4]);

        let mut file = File::from(fd);
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).unwrap();
        assert_eq!(contents.len(), 64);
        assert_eq!(&contents[..4], &[1, 2, 3, 4]);
    }
}
