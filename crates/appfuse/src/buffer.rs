//! Request/reply buffer.
//!
//! One allocation holds the incoming request; its payload region is reused
//! for the outgoing reply payload. [`Payload`] gives handlers read access to
//! the request body until they start producing a reply: the methods that
//! write reply bytes consume the view, so input can no longer be read.

use nix::errno::Errno;

use crate::fuse::{FUSE_IN_HEADER_SIZE, FUSE_WRITE_IN_SIZE};
use crate::session::{MAX_READ, MAX_WRITE};

/// Largest request the kernel can send: a WRITE carrying `max_write` bytes.
pub const MAX_REQUEST_SIZE: usize = FUSE_IN_HEADER_SIZE
    + FUSE_WRITE_IN_SIZE
    + if MAX_WRITE > MAX_READ {
        MAX_WRITE as usize
    } else {
        MAX_READ as usize
    };

pub struct RequestBuffer {
    data: Box<[u8]>,
}

impl RequestBuffer {
    pub fn new() -> Self {
        Self {
            data: vec![0u8; MAX_REQUEST_SIZE].into_boxed_slice(),
        }
    }

    /// The whole buffer, as handed to `read(2)`.
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Copies a complete request frame into the buffer and returns its length.
    pub fn fill(&mut self, frame: &[u8]) -> usize {
        let len = frame.len().min(self.data.len());
        self.data[..len].copy_from_slice(&frame[..len]);
        len
    }

    pub fn header_bytes(&self) -> &[u8] {
        &self.data[..FUSE_IN_HEADER_SIZE]
    }

    /// View of the payload region holding `input_len` bytes of request body.
    pub fn payload(&mut self, input_len: usize) -> Payload<'_> {
        Payload::new(&mut self.data[FUSE_IN_HEADER_SIZE..], input_len)
    }

    /// The first `len` bytes of the payload region, i.e. a written reply.
    pub fn reply_bytes(&self, len: usize) -> &[u8] {
        let start = FUSE_IN_HEADER_SIZE;
        let end = (start + len).min(self.data.len());
        &self.data[start..end]
    }
}

impl Default for RequestBuffer {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Payload<'a> {
    buf: &'a mut [u8],
    input_len: usize,
}

impl<'a> Payload<'a> {
    pub fn new(buf: &'a mut [u8], input_len: usize) -> Self {
        let input_len = input_len.min(buf.len());
        Self { buf, input_len }
    }

    /// Request body bytes.
    pub fn input(&self) -> &[u8] {
        &self.buf[..self.input_len]
    }

    /// Decodes a fixed-size input struct; a truncated body is `EINVAL`.
    pub fn decode<T>(&self, parse: fn(&[u8]) -> Option<T>) -> Result<T, Errno> {
        parse(self.input()).ok_or(Errno::EINVAL)
    }

    /// Writes a reply payload and returns its length.
    pub fn write(self, bytes: &[u8]) -> Result<usize, Errno> {
        let dest = self.buf.get_mut(..bytes.len()).ok_or(Errno::EIO)?;
        dest.copy_from_slice(bytes);
        Ok(bytes.len())
    }

    /// Hands out the first `len` bytes of the region for the reply to be filled in place.
    pub fn output(self, len: usize) -> Result<&'a mut [u8], Errno> {
        self.buf.get_mut(..len).ok_or(Errno::EIO)
    }
}
