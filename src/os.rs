//! Anonymous files for shared memory
//!
//! The compositor maps the file descriptors handed to `wl_shm.create_pool`, so they have to
//! point at files of the exact pool size that no other process can reach by name.
//!
//! Where `memfd_create` is available the file lives only in memory and is sealed against
//! shrinking, so the compositor can trust the size it maps. Elsewhere, or if the kernel refuses
//! memfds, a temporary file is created in `$XDG_RUNTIME_DIR` and unlinked right away.

use std::{
    env,
    fs::File,
    io,
    os::unix::io::OwnedFd,
    path::{Path, PathBuf},
};

use tracing::{debug, trace};

const TEMPLATE_PREFIX: &str = "hello-wayland-shared-";

/// Create an anonymous file of exactly `size` bytes
///
/// The returned descriptor is close-on-exec.
pub fn create_anonymous_file(size: u64) -> io::Result<OwnedFd> {
    #[cfg(any(target_os = "linux", target_os = "freebsd", target_os = "android"))]
    {
        match create_memfd(size) {
            Ok(fd) => return Ok(fd),
            Err(err) => debug!("memfd_create failed, falling back to XDG_RUNTIME_DIR: {}", err),
        }
    }

    create_in_runtime_dir(size)
}

/// Create a sealed memory-backed file of exactly `size` bytes
#[cfg(any(target_os = "linux", target_os = "freebsd", target_os = "android"))]
pub fn create_memfd(size: u64) -> io::Result<OwnedFd> {
    use rustix::fs::{MemfdFlags, SealFlags};

    let fd = rustix::fs::memfd_create("hello-wayland-shm", MemfdFlags::CLOEXEC | MemfdFlags::ALLOW_SEALING)?;
    rustix::fs::ftruncate(&fd, size)?;
    // pools may still grow, but never shrink under the compositor's mapping
    rustix::fs::fcntl_add_seals(&fd, SealFlags::SHRINK)?;
    trace!(size, "created memfd");
    Ok(fd)
}

/// Create an unlinked file of exactly `size` bytes in `$XDG_RUNTIME_DIR`
///
/// Fails with [`io::ErrorKind::NotFound`] if the variable is not set.
pub fn create_in_runtime_dir(size: u64) -> io::Result<OwnedFd> {
    let dir = env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "XDG_RUNTIME_DIR is not set"))?;
    create_unlinked_in(&dir, size)
}

/// Create a named file in `dir`, unlink it and size it to `size` bytes
///
/// The file is opened by name rather than with `O_TMPFILE`, which not every filesystem
/// backing a runtime directory supports.
pub fn create_unlinked_in(dir: &Path, size: u64) -> io::Result<OwnedFd> {
    let named = tempfile::Builder::new().prefix(TEMPLATE_PREFIX).tempfile_in(dir)?;
    trace!(path = ?named.path(), size, "created runtime dir file");
    // removes the name, the descriptor keeps the file alive
    let file: File = named.into_file();
    file.set_len(size)?;
    Ok(file.into())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn file_size(fd: OwnedFd) -> u64 {
        File::from(fd).metadata().unwrap().len()
    }

    #[test]
    fn unlinked_file_has_exact_size_and_no_name() {
        let dir = tempfile::tempdir().unwrap();
        let fd = create_unlinked_in(dir.path(), 128 * 128 * 4).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(file_size(fd), 128 * 128 * 4);
    }

    #[test]
    fn unlinked_file_is_close_on_exec() {
        let dir = tempfile::tempdir().unwrap();
        let fd = create_unlinked_in(dir.path(), 16).unwrap();
        let flags = rustix::io::fcntl_getfd(&fd).unwrap();
        assert!(flags.contains(rustix::io::FdFlags::CLOEXEC));
    }

    #[cfg(any(target_os = "linux", target_os = "freebsd", target_os = "android"))]
    #[test]
    fn memfd_is_sized_and_cannot_shrink() {
        let fd = create_memfd(4096).unwrap();
        let seals = rustix::fs::fcntl_get_seals(&fd).unwrap();
        assert!(seals.contains(rustix::fs::SealFlags::SHRINK));
        assert!(rustix::fs::ftruncate(&fd, 1024).is_err());
        assert_eq!(file_size(fd), 4096);
    }

    #[test]
    fn anonymous_file_has_exact_size() {
        let fd = create_anonymous_file(640 * 480 * 4).unwrap();
        assert_eq!(file_size(fd), 640 * 480 * 4);
    }

    #[test]
    fn runtime_dir_file_follows_the_environment() {
        let saved = env::var_os("XDG_RUNTIME_DIR");
        let dir = tempfile::tempdir().unwrap();

        env::set_var("XDG_RUNTIME_DIR", dir.path());
        let created = create_in_runtime_dir(32);
        env::remove_var("XDG_RUNTIME_DIR");
        let missing = create_in_runtime_dir(32);
        if let Some(saved) = saved {
            env::set_var("XDG_RUNTIME_DIR", saved);
        }

        assert_eq!(file_size(created.unwrap()), 32);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(missing.unwrap_err().kind(), io::ErrorKind::NotFound);
    }
}
