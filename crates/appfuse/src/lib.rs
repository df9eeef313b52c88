//! Userspace FUSE loop serving a synthetic read-only filesystem.
//!
//! The root directory holds regular files named by positive integers. Their
//! sizes and contents are fetched on demand from a [`ContentProvider`]. The
//! host mounts the filesystem, opens the FUSE device and hands the
//! descriptor to [`start_app_fuse_loop`], which serves requests until the
//! kernel sends FORGET or the device disappears.
//!
//! ```no_run
//! use std::os::fd::AsFd;
//! use appfuse::{ContentProvider, start_app_fuse_loop};
//!
//! struct Hello;
//!
//! impl ContentProvider for Hello {
//!     fn get_file_size(&self, inode: u32) -> i64 {
//!         if inode == 2 { 5 } else { -1 }
//!     }
//!
//!     fn get_object_bytes(&self, _inode: u32, offset: u64, size: u32) -> Option<Vec<u8>> {
//!         let start = offset as usize;
//!         b"hello".get(start..start + size as usize).map(<[u8]>::to_vec)
//!     }
//! }
//!
//! # fn device() -> std::fs::File { unimplemented!() }
//! let device = device();
//! let clean = start_app_fuse_loop(device.as_fd(), Hello);
//! ```

use std::os::fd::BorrowedFd;

mod buffer;
mod device;
mod error;
pub mod fuse;
mod provider;
mod session;

pub use buffer::{MAX_REQUEST_SIZE, Payload, RequestBuffer};
pub use device::FuseDevice;
pub use error::{Error, Result};
pub use provider::{ContentProvider, ProviderAdapter};
pub use session::{ATTR_VALID_SECS, Dispatch, MAX_READ, MAX_WRITE, ROOT_INODE, Session};

/// A FUSE session bound to one device descriptor.
pub struct AppFuse<P> {
    device: FuseDevice,
    session: Session<P>,
    buffer: RequestBuffer,
}

impl<P: ContentProvider> AppFuse<P> {
    /// Creates a session on a duplicate of `fd`.
    pub fn new(fd: BorrowedFd<'_>, provider: P) -> Result<Self> {
        Ok(Self::with_device(FuseDevice::from_borrowed(fd)?, provider))
    }

    pub fn with_device(device: FuseDevice, provider: P) -> Self {
        Self {
            device,
            session: Session::new(provider),
            buffer: RequestBuffer::new(),
        }
    }

    pub fn session(&self) -> &Session<P> {
        &self.session
    }

    /// Serves requests one at a time.
    ///
    /// Returns `Ok(())` when the kernel sends FORGET and
    /// `Err(Error::DeviceGone)` when the device stops delivering requests.
    pub fn run(&mut self) -> Result<()> {
        tracing::debug!("[appfuse] start fuse loop");

        loop {
            let Some(header) = self.device.receive(&mut self.buffer)? else {
                continue;
            };

            let payload = self.buffer.payload(session::input_len(&header));
            match self.session.dispatch(&header, payload) {
                Dispatch::Reply { error, len } => {
                    let reply = self.buffer.reply_bytes(len);
                    if let Err(e) = self.device.send_reply(header.unique, error, reply) {
                        tracing::error!(
                            "[appfuse] reply failed: unique={} errno={}",
                            header.unique,
                            e
                        );
                    }
                }
                Dispatch::Exit => {
                    tracing::debug!("[appfuse] fuse loop finished");
                    return Ok(());
                }
            }
        }
    }
}

/// Serves the filesystem on `fd` until shutdown.
///
/// Returns `true` after a clean shutdown (FORGET) and `false` when the
/// device went away or could not be duplicated.
pub fn start_app_fuse_loop<P: ContentProvider>(fd: BorrowedFd<'_>, provider: P) -> bool {
    let mut fuse = match AppFuse::new(fd, provider) {
        Ok(fuse) => fuse,
        Err(e) => {
            tracing::error!("[appfuse] failed to set up FUSE session: {}", e);
            return false;
        }
    };

    match fuse.run() {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("[appfuse] fuse loop stopped: {}", e);
            false
        }
    }
}
