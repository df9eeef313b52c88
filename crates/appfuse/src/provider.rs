//! Content provider capability.
//!
//! The filesystem owns no data. File sizes and bytes come from a host
//! supplied [`ContentProvider`], reached through [`ProviderAdapter`] which
//! turns the provider's loosely typed results into errno values.

use std::rc::Rc;
use std::sync::Arc;

use nix::errno::Errno;

/// Source of file sizes and contents, called synchronously from the loop.
pub trait ContentProvider {
    /// Size in bytes of `inode`, or a negative value if it does not exist.
    fn get_file_size(&self, inode: u32) -> i64;

    /// Exactly `size` bytes of `inode` starting at `offset`.
    ///
    /// Returning `None`, or a buffer of any other length, fails the read.
    fn get_object_bytes(&self, inode: u32, offset: u64, size: u32) -> Option<Vec<u8>>;
}

impl<P: ContentProvider + ?Sized> ContentProvider for &P {
    fn get_file_size(&self, inode: u32) -> i64 {
        (**self).get_file_size(inode)
    }

    fn get_object_bytes(&self, inode: u32, offset: u64, size: u32) -> Option<Vec<u8>> {
        (**self).get_object_bytes(inode, offset, size)
    }
}

impl<P: ContentProvider + ?Sized> ContentProvider for Box<P> {
    fn get_file_size(&self, inode: u32) -> i64 {
        (**self).get_file_size(inode)
    }

    fn get_object_bytes(&self, inode: u32, offset: u64, size: u32) -> Option<Vec<u8>> {
        (**self).get_object_bytes(inode, offset, size)
    }
}

impl<P: ContentProvider + ?Sized> ContentProvider for Rc<P> {
    fn get_file_size(&self, inode: u32) -> i64 {
        (**self).get_file_size(inode)
    }

    fn get_object_bytes(&self, inode: u32, offset: u64, size: u32) -> Option<Vec<u8>> {
        (**self).get_object_bytes(inode, offset, size)
    }
}

impl<P: ContentProvider + ?Sized> ContentProvider for Arc<P> {
    fn get_file_size(&self, inode: u32) -> i64 {
        (**self).get_file_size(inode)
    }

    fn get_object_bytes(&self, inode: u32, offset: u64, size: u32) -> Option<Vec<u8>> {
        (**self).get_object_bytes(inode, offset, size)
    }
}

pub struct ProviderAdapter<P> {
    provider: P,
}

impl<P: ContentProvider> ProviderAdapter<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn get_ref(&self) -> &P {
        &self.provider
    }

    /// Size of `inode`, or `None` if the provider does not know it.
    ///
    /// Inode ids wider than the provider's 32-bit ids never exist.
    pub fn file_size(&self, inode: u64) -> Option<u64> {
        let inode = u32::try_from(inode).ok()?;
        let size = self.provider.get_file_size(inode);
        u64::try_from(size).ok()
    }

    /// Fills all of `dest` with the bytes of `inode` at `offset`.
    pub fn read_into(&self, inode: u64, offset: u64, dest: &mut [u8]) -> Result<usize, Errno> {
        let inode = u32::try_from(inode).map_err(|_| Errno::EIO)?;
        let size = u32::try_from(dest.len()).map_err(|_| Errno::EIO)?;

        let bytes = self
            .provider
            .get_object_bytes(inode, offset, size)
            .ok_or(Errno::EIO)?;

        if bytes.len() != dest.len() {
            tracing::warn!(
                "[appfuse] provider returned {} bytes for inode {}, expected {}",
                bytes.len(),
                inode,
                dest.len()
            );
            return Err(Errno::EIO);
        }

        dest.copy_from_slice(&bytes);
        Ok(bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Fixed {
        size: i64,
        reply_len: Option<usize>,
        calls: Cell<u32>,
    }

    impl ContentProvider for Fixed {
        fn get_file_size(&self, _inode: u32) -> i64 {
            self.size
        }

        fn get_object_bytes(&self, _inode: u32, offset: u64, _size: u32) -> Option<Vec<u8>> {
            self.calls.set(self.calls.get() + 1);
            let len = self.reply_len?;
            Some((0..len).map(|i| (offset as usize + i) as u8).collect())
        }
    }

    fn fixed(size: i64, reply_len: Option<usize>) -> Fixed {
        Fixed {
            size,
            reply_len,
            calls: Cell::new(0),
        }
    }

    #[test]
    fn negative_size_is_absent() {
        let adapter = ProviderAdapter::new(fixed(-1, None));
        assert_eq!(adapter.file_size(5), None);
    }

    #[test]
    fn wide_inode_is_absent() {
        let adapter = ProviderAdapter::new(fixed(10, None));
        assert_eq!(adapter.file_size(u64::from(u32::MAX) + 1), None);
        assert_eq!(adapter.file_size(5), Some(10));
    }

    #[test]
    fn read_copies_exact_length() {
        let adapter = ProviderAdapter::new(fixed(10, Some(4)));
        let mut dest = [0u8; 4];

        assert_eq!(adapter.read_into(5, 2, &mut dest), Ok(4));
        assert_eq!(dest, [2, 3, 4, 5]);
    }

    #[test]
    fn short_reply_is_io_error() {
        let adapter = ProviderAdapter::new(fixed(10, Some(3)));
        let mut dest = [0u8; 4];

        assert_eq!(adapter.read_into(5, 0, &mut dest), Err(Errno::EIO));
    }

    #[test]
    fn missing_reply_is_io_error() {
        let adapter = ProviderAdapter::new(fixed(10, None));
        let mut dest = [0u8; 4];

        assert_eq!(adapter.read_into(5, 0, &mut dest), Err(Errno::EIO));
        assert_eq!(adapter.get_ref().calls.get(), 1);
    }

    #[test]
    fn shared_provider_is_a_provider() {
        let provider = Arc::new(fixed(3, None));
        let adapter = ProviderAdapter::new(Arc::clone(&provider));
        assert_eq!(adapter.file_size(1), Some(3));

        let borrowed = ProviderAdapter::new(&*provider);
        assert_eq!(borrowed.file_size(1), Some(3));
    }
}
