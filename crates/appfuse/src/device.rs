//! FUSE device framing.
//!
//! Every `read(2)` on a FUSE device returns exactly one request; every reply
//! goes out as a single `writev(2)` of header and payload.

use std::io::IoSlice;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};

use nix::errno::Errno;
use nix::sys::uio::writev;

use crate::buffer::RequestBuffer;
use crate::error::{Error, Result};
use crate::fuse::{FUSE_IN_HEADER_SIZE, FUSE_OUT_HEADER_SIZE, FuseInHeader, FuseOutHeader};

/// What a failed `read(2)` on the device means for the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadOutcome {
    /// Interrupted before any data arrived; read again.
    Retry,
    /// The filesystem was unmounted or the connection aborted.
    Gone,
    /// Drop this attempt and keep serving.
    Skip,
}

fn read_outcome(errno: Errno) -> ReadOutcome {
    match errno {
        Errno::EINTR => ReadOutcome::Retry,
        Errno::ENODEV => ReadOutcome::Gone,
        _ => ReadOutcome::Skip,
    }
}

pub struct FuseDevice {
    fd: OwnedFd,
}

impl FuseDevice {
    pub fn new(fd: OwnedFd) -> Self {
        Self { fd }
    }

    /// Duplicates `fd` so the caller keeps ownership of the original.
    pub fn from_borrowed(fd: BorrowedFd<'_>) -> Result<Self> {
        Ok(Self::new(fd.try_clone_to_owned()?))
    }

    /// Reads the next request into `buffer`.
    ///
    /// Returns `Ok(None)` when nothing usable arrived (interrupted, short or
    /// malformed frame, transient error) and `Err(Error::DeviceGone)` once
    /// the device can no longer deliver requests.
    pub fn receive(&self, buffer: &mut RequestBuffer) -> Result<Option<FuseInHeader>> {
        let length = loop {
            match nix::unistd::read(self.fd.as_raw_fd(), buffer.as_mut_bytes()) {
                Ok(n) => break n,
                Err(e) => match read_outcome(e) {
                    ReadOutcome::Retry => continue,
                    ReadOutcome::Gone => {
                        tracing::error!("[appfuse] FUSE device went away");
                        return Err(Error::DeviceGone);
                    }
                    ReadOutcome::Skip => {
                        tracing::error!("[appfuse] failed to read from FUSE device: {}", e);
                        return Ok(None);
                    }
                },
            }
        };

        if length == 0 {
            tracing::error!("[appfuse] FUSE device closed");
            return Err(Error::DeviceGone);
        }

        if length < FUSE_IN_HEADER_SIZE {
            tracing::warn!("[appfuse] request too short: len={}", length);
            return Ok(None);
        }

        let Some(header) = FuseInHeader::from_bytes(buffer.header_bytes()) else {
            return Ok(None);
        };

        if header.len as usize != length {
            tracing::warn!(
                "[appfuse] malformed header: len={}, hdr.len={}",
                length,
                header.len
            );
            return Ok(None);
        }

        Ok(Some(header))
    }

    /// Sends a reply to request `unique`.
    ///
    /// Error replies (`error != 0`) never carry a payload.
    pub fn send_reply(&self, unique: u64, error: i32, payload: &[u8]) -> nix::Result<usize> {
        let payload = if error != 0 { &[][..] } else { payload };

        let header = FuseOutHeader {
            len: (FUSE_OUT_HEADER_SIZE + payload.len()) as u32,
            error,
            unique,
        }
        .to_bytes();

        let iov = [IoSlice::new(&header), IoSlice::new(payload)];
        let segments = if payload.is_empty() { 1 } else { 2 };

        loop {
            match writev(&self.fd, &iov[..segments]) {
                Err(Errno::EINTR) => continue,
                result => return result,
            }
        }
    }
}

impl AsFd for FuseDevice {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::socket::{AddressFamily, SockFlag, SockType, socketpair};

    fn device_pair() -> (FuseDevice, OwnedFd) {
        let (ours, theirs) = socketpair(
            AddressFamily::Unix,
            SockType::SeqPacket,
            None,
            SockFlag::empty(),
        )
        .unwrap();
        (FuseDevice::new(ours), theirs)
    }

    fn frame(len: u32, opcode: u32, unique: u64, body: &[u8]) -> Vec<u8> {
        let header = FuseInHeader {
            len,
            opcode,
            unique,
            nodeid: 1,
            ..Default::default()
        };
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend_from_slice(body);
        bytes
    }

    fn read_reply(fd: &OwnedFd) -> Vec<u8> {
        let mut buf = vec![0u8; 4096];
        let n = nix::unistd::read(fd.as_raw_fd(), &mut buf).unwrap();
        buf.truncate(n);
        buf
    }

    #[test]
    fn receives_well_formed_request() {
        let (device, peer) = device_pair();
        let mut buffer = RequestBuffer::new();
        nix::unistd::write(&peer, &frame(43, 1, 7, b"42\0")).unwrap();

        let header = device.receive(&mut buffer).unwrap().unwrap();
        assert_eq!(header.unique, 7);
        assert_eq!(header.len, 43);
        assert_eq!(buffer.payload(3).input(), b"42\0");
    }

    #[test]
    fn short_request_is_dropped() {
        let (device, peer) = device_pair();
        let mut buffer = RequestBuffer::new();
        nix::unistd::write(&peer, &[1u8; 12]).unwrap();

        assert!(device.receive(&mut buffer).unwrap().is_none());
    }

    #[test]
    fn length_mismatch_is_dropped() {
        let (device, peer) = device_pair();
        let mut buffer = RequestBuffer::new();
        nix::unistd::write(&peer, &frame(100, 1, 7, b"42\0")).unwrap();

        assert!(device.receive(&mut buffer).unwrap().is_none());
    }

    #[test]
    fn read_errors_map_to_outcomes() {
        assert_eq!(read_outcome(Errno::EINTR), ReadOutcome::Retry);
        assert_eq!(read_outcome(Errno::ENODEV), ReadOutcome::Gone);
        assert_eq!(read_outcome(Errno::EAGAIN), ReadOutcome::Skip);
        assert_eq!(read_outcome(Errno::ENOENT), ReadOutcome::Skip);
        assert_eq!(read_outcome(Errno::EIO), ReadOutcome::Skip);
    }

    #[test]
    fn transient_read_error_is_skipped() {
        let (ours, peer) = socketpair(
            AddressFamily::Unix,
            SockType::SeqPacket,
            None,
            SockFlag::SOCK_NONBLOCK,
        )
        .unwrap();
        let device = FuseDevice::new(ours);
        let mut buffer = RequestBuffer::new();

        assert!(device.receive(&mut buffer).unwrap().is_none());

        nix::unistd::write(&peer, &frame(43, 1, 8, b"42\0")).unwrap();
        let header = device.receive(&mut buffer).unwrap().unwrap();
        assert_eq!(header.unique, 8);
    }

    #[test]
    fn closed_peer_is_device_gone() {
        let (device, peer) = device_pair();
        let mut buffer = RequestBuffer::new();
        drop(peer);

        assert!(matches!(
            device.receive(&mut buffer),
            Err(Error::DeviceGone)
        ));
    }

    #[test]
    fn success_reply_carries_payload() {
        let (device, peer) = device_pair();
        assert_eq!(device.send_reply(9, 0, b"abcd").unwrap(), 20);

        let reply = read_reply(&peer);
        let header = FuseOutHeader::from_bytes(&reply).unwrap();
        assert_eq!(header.len, 20);
        assert_eq!(header.error, 0);
        assert_eq!(header.unique, 9);
        assert_eq!(&reply[16..], b"abcd");
    }

    #[test]
    fn error_reply_drops_payload() {
        let (device, peer) = device_pair();
        let enoent = -(Errno::ENOENT as i32);
        device.send_reply(3, enoent, b"ignored").unwrap();

        let reply = read_reply(&peer);
        assert_eq!(reply.len(), FUSE_OUT_HEADER_SIZE);
        let header = FuseOutHeader::from_bytes(&reply).unwrap();
        assert_eq!(header.len, 16);
        assert_eq!(header.error, enoent);
        assert_eq!(header.unique, 3);
    }

    #[test]
    fn empty_success_reply_is_header_only() {
        let (device, peer) = device_pair();
        device.send_reply(4, 0, &[]).unwrap();
        assert_eq!(read_reply(&peer).len(), FUSE_OUT_HEADER_SIZE);
    }

    #[test]
    fn borrowed_fd_is_duplicated() {
        let (ours, _theirs) = socketpair(
            AddressFamily::Unix,
            SockType::SeqPacket,
            None,
            SockFlag::empty(),
        )
        .unwrap();
        let device = FuseDevice::from_borrowed(ours.as_fd()).unwrap();
        assert_ne!(device.as_fd().as_raw_fd(), ours.as_raw_fd());
    }
}
