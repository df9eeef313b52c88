//! Per-connection request dispatch.
//!
//! A [`Session`] holds the open handle table and the content provider, and
//! turns each decoded request into a reply payload (or the decision to stop).

use nix::errno::Errno;
use nix::libc;

use crate::buffer::Payload;
use crate::fuse::{
    FUSE_ATOMIC_O_TRUNC, FUSE_BIG_WRITES, FUSE_COMPAT_22_INIT_OUT_SIZE, FUSE_IN_HEADER_SIZE,
    FUSE_INIT_OUT_SIZE, FUSE_KERNEL_VERSION, FuseAttr, FuseAttrOut, FuseEntryOut, FuseForgetIn,
    FuseInHeader, FuseInitIn, FuseInitOut, FuseOpcode, FuseOpenOut, FuseReadIn, FuseReleaseIn,
    HandleTable, extract_name,
};
use crate::provider::{ContentProvider, ProviderAdapter};

pub const ROOT_INODE: u64 = 1;

/// Largest READ reply, in bytes.
pub const MAX_READ: u32 = 128 * 1024;
/// Largest WRITE the kernel is told it may send.
pub const MAX_WRITE: u32 = 256 * 1024;

/// Seconds the kernel may cache entries and attributes.
pub const ATTR_VALID_SECS: u64 = 10;

const MAX_BACKGROUND: u16 = 32;
const CONGESTION_THRESHOLD: u16 = 32;

/// 7.6 is the first version with the current `fuse_init_out` layout.
const MIN_KERNEL_MINOR: u32 = 6;
/// BATCH_FORGET arrives with 7.16 and is not handled.
const MAX_NEGOTIATED_MINOR: u32 = 15;
/// Last minor version using the truncated `fuse_init_out`.
const COMPAT_22_MINOR: u32 = 22;

const FILE_MODE: u32 = libc::S_IFREG | 0o777;
const DIR_MODE: u32 = libc::S_IFDIR | 0o777;

/// What the loop should do after a request was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Send a reply: `error` is 0 or a negative errno, `len` the payload size.
    Reply { error: i32, len: usize },
    /// Stop serving without replying.
    Exit,
}

pub struct Session<P> {
    provider: ProviderAdapter<P>,
    handles: HandleTable,
}

impl<P: ContentProvider> Session<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider: ProviderAdapter::new(provider),
            handles: HandleTable::new(),
        }
    }

    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    pub fn provider(&self) -> &P {
        self.provider.get_ref()
    }

    /// Handles one request whose body sits at the start of `payload`.
    pub fn dispatch(&mut self, header: &FuseInHeader, payload: Payload<'_>) -> Dispatch {
        tracing::trace!(
            "[appfuse] request op={} unique={} nodeid={}",
            header.opcode,
            header.unique,
            header.nodeid
        );

        let result = match FuseOpcode::try_from(header.opcode) {
            Ok(FuseOpcode::Init) => self.handle_init(payload),
            Ok(FuseOpcode::Lookup) => self.handle_lookup(header, payload),
            Ok(FuseOpcode::Getattr) => self.handle_getattr(header, payload),
            Ok(FuseOpcode::Open) => self.handle_open(header, payload),
            Ok(FuseOpcode::Read) => self.handle_read(payload),
            Ok(FuseOpcode::Release) => self.handle_release(payload),
            Ok(FuseOpcode::Flush) => self.handle_flush(),
            Ok(FuseOpcode::Forget) => {
                // The kernel sends FORGET once it drops the last reference,
                // which for this filesystem means the session is over.
                let nlookup = FuseForgetIn::from_bytes(payload.input()).map(|f| f.nlookup);
                tracing::debug!(
                    "[appfuse] forget nodeid={} nlookup={:?}, stopping",
                    header.nodeid,
                    nlookup
                );
                return Dispatch::Exit;
            }
            Ok(opcode) => {
                tracing::debug!(
                    "[appfuse] unimplemented FUSE opcode: {:?} unique={} nodeid={}",
                    opcode,
                    header.unique,
                    header.nodeid
                );
                Err(Errno::ENOSYS)
            }
            Err(()) => {
                tracing::debug!(
                    "[appfuse] unknown FUSE opcode: {} unique={} nodeid={}",
                    header.opcode,
                    header.unique,
                    header.nodeid
                );
                Err(Errno::ENOSYS)
            }
        };

        match result {
            Ok(len) => Dispatch::Reply { error: 0, len },
            Err(errno) => Dispatch::Reply {
                error: -(errno as i32),
                len: 0,
            },
        }
    }

    fn handle_init(&mut self, payload: Payload<'_>) -> Result<usize, Errno> {
        let init_in = payload.decode(FuseInitIn::from_bytes)?;

        if init_in.major != FUSE_KERNEL_VERSION || init_in.minor < MIN_KERNEL_MINOR {
            tracing::error!(
                "[appfuse] FUSE kernel version mismatch: kernel {}.{}, expected at least {}.{}",
                init_in.major,
                init_in.minor,
                FUSE_KERNEL_VERSION,
                MIN_KERNEL_MINOR
            );
            return Err(Errno::EPROTO);
        }

        let out = FuseInitOut {
            major: FUSE_KERNEL_VERSION,
            minor: init_in.minor.min(MAX_NEGOTIATED_MINOR),
            max_readahead: init_in.max_readahead,
            flags: FUSE_ATOMIC_O_TRUNC | FUSE_BIG_WRITES,
            max_background: MAX_BACKGROUND,
            congestion_threshold: CONGESTION_THRESHOLD,
            max_write: MAX_WRITE,
            ..Default::default()
        };

        let size = if init_in.minor <= COMPAT_22_MINOR {
            FUSE_COMPAT_22_INIT_OUT_SIZE
        } else {
            FUSE_INIT_OUT_SIZE
        };

        tracing::debug!(
            "[appfuse] init: kernel {}.{}, negotiated {}.{}",
            init_in.major,
            init_in.minor,
            out.major,
            out.minor
        );

        payload.write(&out.to_bytes()[..size])
    }

    fn handle_lookup(
        &mut self,
        header: &FuseInHeader,
        payload: Payload<'_>,
    ) -> Result<usize, Errno> {
        if header.nodeid != ROOT_INODE {
            return Err(Errno::ENOENT);
        }

        let ino = extract_name(payload.input())
            .and_then(parse_entry_name)
            .ok_or(Errno::ENOENT)?;
        let size = self.provider.file_size(ino).ok_or(Errno::ENOENT)?;

        let out = FuseEntryOut {
            nodeid: ino,
            generation: 0,
            entry_valid: ATTR_VALID_SECS,
            attr_valid: ATTR_VALID_SECS,
            entry_valid_nsec: 0,
            attr_valid_nsec: 0,
            attr: file_attr(ino, size),
        };

        payload.write(&out.to_bytes())
    }

    fn handle_getattr(
        &mut self,
        header: &FuseInHeader,
        payload: Payload<'_>,
    ) -> Result<usize, Errno> {
        let attr = if header.nodeid == ROOT_INODE {
            FuseAttr {
                ino: ROOT_INODE,
                mode: DIR_MODE,
                size: 0,
                ..Default::default()
            }
        } else {
            let size = self
                .provider
                .file_size(header.nodeid)
                .ok_or(Errno::ENOENT)?;
            file_attr(header.nodeid, size)
        };

        let out = FuseAttrOut {
            attr_valid: ATTR_VALID_SECS,
            attr_valid_nsec: 0,
            dummy: 0,
            attr,
        };

        payload.write(&out.to_bytes())
    }

    fn handle_open(&mut self, header: &FuseInHeader, payload: Payload<'_>) -> Result<usize, Errno> {
        let fh = match self.handles.insert(header.nodeid) {
            Some(fh) => fh,
            None => {
                tracing::warn!(
                    "[appfuse] too many open files, refusing open of nodeid {}",
                    header.nodeid
                );
                return Err(Errno::EMFILE);
            }
        };

        let out = FuseOpenOut {
            fh: u64::from(fh),
            open_flags: 0,
            padding: 0,
        };

        payload.write(&out.to_bytes())
    }

    fn handle_read(&mut self, payload: Payload<'_>) -> Result<usize, Errno> {
        let read_in = payload.decode(FuseReadIn::from_bytes)?;

        if read_in.size > MAX_READ {
            return Err(Errno::EINVAL);
        }

        let ino = u32::try_from(read_in.fh)
            .ok()
            .and_then(|fh| self.handles.get(fh))
            .ok_or(Errno::EBADF)?;

        // The size is asked for again on every read; the provider may change it.
        let file_size = self.provider.file_size(ino).unwrap_or(0);
        let remaining = file_size.saturating_sub(read_in.offset);
        let size = u64::from(read_in.size).min(remaining) as usize;

        if size == 0 {
            return Ok(0);
        }

        let dest = payload.output(size)?;
        self.provider.read_into(ino, read_in.offset, dest)
    }

    fn handle_release(&mut self, payload: Payload<'_>) -> Result<usize, Errno> {
        let fh = FuseReleaseIn::from_bytes(payload.input())
            .and_then(|release_in| u32::try_from(release_in.fh).ok());
        if let Some(fh) = fh {
            self.handles.remove(fh);
        }

        Ok(0)
    }

    fn handle_flush(&mut self) -> Result<usize, Errno> {
        // Read-only contents: nothing is ever buffered.
        Ok(0)
    }
}

/// Entry names under the root are the decimal inode ids of the files.
fn parse_entry_name(name: &str) -> Option<u64> {
    name.parse::<u32>()
        .ok()
        .filter(|&n| n != 0)
        .map(u64::from)
}

fn file_attr(ino: u64, size: u64) -> FuseAttr {
    FuseAttr {
        ino,
        size,
        mode: FILE_MODE,
        ..Default::default()
    }
}

/// Request body length announced by `header`.
pub(crate) fn input_len(header: &FuseInHeader) -> usize {
    (header.len as usize).saturating_sub(FUSE_IN_HEADER_SIZE)
}
