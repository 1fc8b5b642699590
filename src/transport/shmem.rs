// Shared memory backing for the mailbox region.
// Uses a /dev/shm file + mmap so the firmware side can map the same bytes.

use std::fs::OpenOptions;
use std::io;
use std::os::fd::{AsRawFd, IntoRawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::ptr::NonNull;

/// A mapped shared memory region.
///
/// `mmap` returns page-aligned memory, which satisfies every alignment
/// requirement in `layout`; no manual alignment fixup is needed.
#[derive(Debug)]
pub struct ShmRegion {
    ptr: NonNull<u8>,
    size: usize,
    fd: i32,
}

unsafe impl Send for ShmRegion {}
unsafe impl Sync for ShmRegion {}

impl ShmRegion {
    /// Create (or truncate) a named region of `size` bytes under /dev/shm.
    pub fn create(name: &str, size: usize) -> io::Result<Self> {
        let path = format!("/dev/shm/{}", name);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&path)
            .map_err(|e| {
                io::Error::new(
                    e.kind(),
                    format!("failed to create mailbox region at {}: {}", path, e),
                )
            })?;

        if unsafe { libc::ftruncate(file.as_raw_fd(), size as libc::off_t) } != 0 {
            return Err(io::Error::last_os_error());
        }

        Self::map(file.into_raw_fd(), size)
    }

    /// Attach to an existing named region, requiring at least `min_size` bytes.
    pub fn attach(name: &str, min_size: usize) -> io::Result<Self> {
        let path = format!("/dev/shm/{}", name);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("failed to open mailbox region at {}: {}", path, e),
                )
            })?;

        let file_size = file.metadata()?.len() as usize;
        if file_size < min_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "mailbox region too small: expected at least {} bytes, got {}",
                    min_size, file_size
                ),
            ));
        }

        Self::map(file.into_raw_fd(), file_size)
    }

    fn map(fd: i32, size: usize) -> io::Result<Self> {
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        Ok(Self {
            // mmap never returns null on success
            ptr: NonNull::new(ptr as *mut u8)
                .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "mmap returned null"))?,
            size,
            fd,
        })
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Remove the backing /dev/shm file for a region created earlier.
    /// Live mappings stay valid until unmapped.
    pub fn unlink(name: &str) -> io::Result<()> {
        std::fs::remove_file(format!("/dev/shm/{}", name))
    }
}

impl Drop for ShmRegion {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size);
            libc::close(self.fd);
        }
    }
}
