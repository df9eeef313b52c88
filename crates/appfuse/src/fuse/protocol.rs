//! FUSE protocol types and parsing.
//!
//! Byte-exact views of the structures exchanged with the kernel over the
//! FUSE device. Based on Linux include/uapi/linux/fuse.h (ABI 7.31).
//! All multi-byte fields are host-endian.

use std::ffi::CStr;

pub const FUSE_KERNEL_VERSION: u32 = 7;

/// Size of `fuse_init_out` as understood by kernels speaking 7.22 or older.
pub const FUSE_COMPAT_22_INIT_OUT_SIZE: usize = 24;

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuseOpcode {
    Lookup = 1,
    Forget = 2,
    Getattr = 3,
    Setattr = 4,
    Readlink = 5,
    Symlink = 6,
    Mknod = 8,
    Mkdir = 9,
    Unlink = 10,
    Rmdir = 11,
    Rename = 12,
    Link = 13,
    Open = 14,
    Read = 15,
    Write = 16,
    Statfs = 17,
    Release = 18,
    Fsync = 20,
    Setxattr = 21,
    Getxattr = 22,
    Listxattr = 23,
    Removexattr = 24,
    Flush = 25,
    Init = 26,
    Opendir = 27,
    Readdir = 28,
    Releasedir = 29,
    Fsyncdir = 30,
    Getlk = 31,
    Setlk = 32,
    Setlkw = 33,
    Access = 34,
    Create = 35,
    Interrupt = 36,
    Bmap = 37,
    Destroy = 38,
    Ioctl = 39,
    Poll = 40,
    NotifyReply = 41,
    BatchForget = 42,
    Fallocate = 43,
    Readdirplus = 44,
    Rename2 = 45,
    Lseek = 46,
    CopyFileRange = 47,
}

impl TryFrom<u32> for FuseOpcode {
    type Error = ();

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Lookup),
            2 => Ok(Self::Forget),
            3 => Ok(Self::Getattr),
            4 => Ok(Self::Setattr),
            5 => Ok(Self::Readlink),
            6 => Ok(Self::Symlink),
            8 => Ok(Self::Mknod),
            9 => Ok(Self::Mkdir),
            10 => Ok(Self::Unlink),
            11 => Ok(Self::Rmdir),
            12 => Ok(Self::Rename),
            13 => Ok(Self::Link),
            14 => Ok(Self::Open),
            15 => Ok(Self::Read),
            16 => Ok(Self::Write),
            17 => Ok(Self::Statfs),
            18 => Ok(Self::Release),
            20 => Ok(Self::Fsync),
            21 => Ok(Self::Setxattr),
            22 => Ok(Self::Getxattr),
            23 => Ok(Self::Listxattr),
            24 => Ok(Self::Removexattr),
            25 => Ok(Self::Flush),
            26 => Ok(Self::Init),
            27 => Ok(Self::Opendir),
            28 => Ok(Self::Readdir),
            29 => Ok(Self::Releasedir),
            30 => Ok(Self::Fsyncdir),
            31 => Ok(Self::Getlk),
            32 => Ok(Self::Setlk),
            33 => Ok(Self::Setlkw),
            34 => Ok(Self::Access),
            35 => Ok(Self::Create),
            36 => Ok(Self::Interrupt),
            37 => Ok(Self::Bmap),
            38 => Ok(Self::Destroy),
            39 => Ok(Self::Ioctl),
            40 => Ok(Self::Poll),
            41 => Ok(Self::NotifyReply),
            42 => Ok(Self::BatchForget),
            43 => Ok(Self::Fallocate),
            44 => Ok(Self::Readdirplus),
            45 => Ok(Self::Rename2),
            46 => Ok(Self::Lseek),
            47 => Ok(Self::CopyFileRange),
            _ => Err(()),
        }
    }
}

fn ne_u16(data: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_ne_bytes(data.get(at..at + 2)?.try_into().ok()?))
}

fn ne_u32(data: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_ne_bytes(data.get(at..at + 4)?.try_into().ok()?))
}

fn ne_u64(data: &[u8], at: usize) -> Option<u64> {
    Some(u64::from_ne_bytes(data.get(at..at + 8)?.try_into().ok()?))
}

/// FUSE request header (40 bytes).
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct FuseInHeader {
    pub len: u32,
    pub opcode: u32,
    pub unique: u64,
    pub nodeid: u64,
    pub uid: u32,
    pub gid: u32,
    pub pid: u32,
    pub padding: u32,
}

pub const FUSE_IN_HEADER_SIZE: usize = std::mem::size_of::<FuseInHeader>();

impl FuseInHeader {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < FUSE_IN_HEADER_SIZE {
            return None;
        }
        Some(Self {
            len: ne_u32(data, 0)?,
            opcode: ne_u32(data, 4)?,
            unique: ne_u64(data, 8)?,
            nodeid: ne_u64(data, 16)?,
            uid: ne_u32(data, 24)?,
            gid: ne_u32(data, 28)?,
            pid: ne_u32(data, 32)?,
            padding: ne_u32(data, 36)?,
        })
    }

    pub fn to_bytes(self) -> [u8; FUSE_IN_HEADER_SIZE] {
        let mut buf = [0u8; FUSE_IN_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.len.to_ne_bytes());
        buf[4..8].copy_from_slice(&self.opcode.to_ne_bytes());
        buf[8..16].copy_from_slice(&self.unique.to_ne_bytes());
        buf[16..24].copy_from_slice(&self.nodeid.to_ne_bytes());
        buf[24..28].copy_from_slice(&self.uid.to_ne_bytes());
        buf[28..32].copy_from_slice(&self.gid.to_ne_bytes());
        buf[32..36].copy_from_slice(&self.pid.to_ne_bytes());
        buf[36..40].copy_from_slice(&self.padding.to_ne_bytes());
        buf
    }
}

/// FUSE response header (16 bytes).
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct FuseOutHeader {
    pub len: u32,
    pub error: i32,
    pub unique: u64,
}

pub const FUSE_OUT_HEADER_SIZE: usize = std::mem::size_of::<FuseOutHeader>();

impl FuseOutHeader {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < FUSE_OUT_HEADER_SIZE {
            return None;
        }
        Some(Self {
            len: ne_u32(data, 0)?,
            error: ne_u32(data, 4)? as i32,
            unique: ne_u64(data, 8)?,
        })
    }

    pub fn to_bytes(self) -> [u8; FUSE_OUT_HEADER_SIZE] {
        let mut buf = [0u8; FUSE_OUT_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.len.to_ne_bytes());
        buf[4..8].copy_from_slice(&self.error.to_ne_bytes());
        buf[8..16].copy_from_slice(&self.unique.to_ne_bytes());
        buf
    }
}

/// File attributes.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct FuseAttr {
    pub ino: u64,
    pub size: u64,
    pub blocks: u64,
    pub atime: u64,
    pub mtime: u64,
    pub ctime: u64,
    pub atimensec: u32,
    pub mtimensec: u32,
    pub ctimensec: u32,
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u32,
    pub blksize: u32,
    pub padding: u32,
}

pub const FUSE_ATTR_SIZE: usize = std::mem::size_of::<FuseAttr>();

impl FuseAttr {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < FUSE_ATTR_SIZE {
            return None;
        }
        Some(Self {
            ino: ne_u64(data, 0)?,
            size: ne_u64(data, 8)?,
            blocks: ne_u64(data, 16)?,
            atime: ne_u64(data, 24)?,
            mtime: ne_u64(data, 32)?,
            ctime: ne_u64(data, 40)?,
            atimensec: ne_u32(data, 48)?,
            mtimensec: ne_u32(data, 52)?,
            ctimensec: ne_u32(data, 56)?,
            mode: ne_u32(data, 60)?,
            nlink: ne_u32(data, 64)?,
            uid: ne_u32(data, 68)?,
            gid: ne_u32(data, 72)?,
            rdev: ne_u32(data, 76)?,
            blksize: ne_u32(data, 80)?,
            padding: ne_u32(data, 84)?,
        })
    }

    pub fn to_bytes(self) -> [u8; FUSE_ATTR_SIZE] {
        let mut buf = [0u8; FUSE_ATTR_SIZE];
        buf[0..8].copy_from_slice(&self.ino.to_ne_bytes());
        buf[8..16].copy_from_slice(&self.size.to_ne_bytes());
        buf[16..24].copy_from_slice(&self.blocks.to_ne_bytes());
        buf[24..32].copy_from_slice(&self.atime.to_ne_bytes());
        buf[32..40].copy_from_slice(&self.mtime.to_ne_bytes());
        buf[40..48].copy_from_slice(&self.ctime.to_ne_bytes());
        buf[48..52].copy_from_slice(&self.atimensec.to_ne_bytes());
        buf[52..56].copy_from_slice(&self.mtimensec.to_ne_bytes());
        buf[56..60].copy_from_slice(&self.ctimensec.to_ne_bytes());
        buf[60..64].copy_from_slice(&self.mode.to_ne_bytes());
        buf[64..68].copy_from_slice(&self.nlink.to_ne_bytes());
        buf[68..72].copy_from_slice(&self.uid.to_ne_bytes());
        buf[72..76].copy_from_slice(&self.gid.to_ne_bytes());
        buf[76..80].copy_from_slice(&self.rdev.to_ne_bytes());
        buf[80..84].copy_from_slice(&self.blksize.to_ne_bytes());
        buf[84..88].copy_from_slice(&self.padding.to_ne_bytes());
        buf
    }
}

/// Entry response (lookup).
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct FuseEntryOut {
    pub nodeid: u64,
    pub generation: u64,
    pub entry_valid: u64,
    pub attr_valid: u64,
    pub entry_valid_nsec: u32,
    pub attr_valid_nsec: u32,
    pub attr: FuseAttr,
}

pub const FUSE_ENTRY_OUT_SIZE: usize = std::mem::size_of::<FuseEntryOut>();

impl FuseEntryOut {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < FUSE_ENTRY_OUT_SIZE {
            return None;
        }
        Some(Self {
            nodeid: ne_u64(data, 0)?,
            generation: ne_u64(data, 8)?,
            entry_valid: ne_u64(data, 16)?,
            attr_valid: ne_u64(data, 24)?,
            entry_valid_nsec: ne_u32(data, 32)?,
            attr_valid_nsec: ne_u32(data, 36)?,
            attr: FuseAttr::from_bytes(&data[40..])?,
        })
    }

    pub fn to_bytes(self) -> [u8; FUSE_ENTRY_OUT_SIZE] {
        let mut buf = [0u8; FUSE_ENTRY_OUT_SIZE];
        buf[0..8].copy_from_slice(&self.nodeid.to_ne_bytes());
        buf[8..16].copy_from_slice(&self.generation.to_ne_bytes());
        buf[16..24].copy_from_slice(&self.entry_valid.to_ne_bytes());
        buf[24..32].copy_from_slice(&self.attr_valid.to_ne_bytes());
        buf[32..36].copy_from_slice(&self.entry_valid_nsec.to_ne_bytes());
        buf[36..40].copy_from_slice(&self.attr_valid_nsec.to_ne_bytes());
        buf[40..].copy_from_slice(&self.attr.to_bytes());
        buf
    }
}

/// Getattr output.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct FuseAttrOut {
    pub attr_valid: u64,
    pub attr_valid_nsec: u32,
    pub dummy: u32,
    pub attr: FuseAttr,
}

pub const FUSE_ATTR_OUT_SIZE: usize = std::mem::size_of::<FuseAttrOut>();

impl FuseAttrOut {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < FUSE_ATTR_OUT_SIZE {
            return None;
        }
        Some(Self {
            attr_valid: ne_u64(data, 0)?,
            attr_valid_nsec: ne_u32(data, 8)?,
            dummy: ne_u32(data, 12)?,
            attr: FuseAttr::from_bytes(&data[16..])?,
        })
    }

    pub fn to_bytes(self) -> [u8; FUSE_ATTR_OUT_SIZE] {
        let mut buf = [0u8; FUSE_ATTR_OUT_SIZE];
        buf[0..8].copy_from_slice(&self.attr_valid.to_ne_bytes());
        buf[8..12].copy_from_slice(&self.attr_valid_nsec.to_ne_bytes());
        buf[12..16].copy_from_slice(&self.dummy.to_ne_bytes());
        buf[16..].copy_from_slice(&self.attr.to_bytes());
        buf
    }
}

/// Init input.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct FuseInitIn {
    pub major: u32,
    pub minor: u32,
    pub max_readahead: u32,
    pub flags: u32,
}

pub const FUSE_INIT_IN_SIZE: usize = std::mem::size_of::<FuseInitIn>();

impl FuseInitIn {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < FUSE_INIT_IN_SIZE {
            return None;
        }
        Some(Self {
            major: ne_u32(data, 0)?,
            minor: ne_u32(data, 4)?,
            max_readahead: ne_u32(data, 8)?,
            flags: ne_u32(data, 12)?,
        })
    }

    pub fn to_bytes(self) -> [u8; FUSE_INIT_IN_SIZE] {
        let mut buf = [0u8; FUSE_INIT_IN_SIZE];
        buf[0..4].copy_from_slice(&self.major.to_ne_bytes());
        buf[4..8].copy_from_slice(&self.minor.to_ne_bytes());
        buf[8..12].copy_from_slice(&self.max_readahead.to_ne_bytes());
        buf[12..16].copy_from_slice(&self.flags.to_ne_bytes());
        buf
    }
}

/// Init output.
///
/// Fields past `max_write` only exist from 7.23 on; older kernels get the
/// first [`FUSE_COMPAT_22_INIT_OUT_SIZE`] bytes.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct FuseInitOut {
    pub major: u32,
    pub minor: u32,
    pub max_readahead: u32,
    pub flags: u32,
    pub max_background: u16,
    pub congestion_threshold: u16,
    pub max_write: u32,
    pub time_gran: u32,
    pub max_pages: u16,
    pub map_alignment: u16,
    pub unused: [u32; 8],
}

pub const FUSE_INIT_OUT_SIZE: usize = std::mem::size_of::<FuseInitOut>();

impl FuseInitOut {
    /// Decodes a (possibly 7.22-truncated) init reply; missing tail fields read as zero.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < FUSE_COMPAT_22_INIT_OUT_SIZE {
            return None;
        }
        Some(Self {
            major: ne_u32(data, 0)?,
            minor: ne_u32(data, 4)?,
            max_readahead: ne_u32(data, 8)?,
            flags: ne_u32(data, 12)?,
            max_background: ne_u16(data, 16)?,
            congestion_threshold: ne_u16(data, 18)?,
            max_write: ne_u32(data, 20)?,
            time_gran: ne_u32(data, 24).unwrap_or(0),
            max_pages: ne_u16(data, 28).unwrap_or(0),
            map_alignment: ne_u16(data, 30).unwrap_or(0),
            unused: [0; 8],
        })
    }

    pub fn to_bytes(self) -> [u8; FUSE_INIT_OUT_SIZE] {
        let mut buf = [0u8; FUSE_INIT_OUT_SIZE];
        buf[0..4].copy_from_slice(&self.major.to_ne_bytes());
        buf[4..8].copy_from_slice(&self.minor.to_ne_bytes());
        buf[8..12].copy_from_slice(&self.max_readahead.to_ne_bytes());
        buf[12..16].copy_from_slice(&self.flags.to_ne_bytes());
        buf[16..18].copy_from_slice(&self.max_background.to_ne_bytes());
        buf[18..20].copy_from_slice(&self.congestion_threshold.to_ne_bytes());
        buf[20..24].copy_from_slice(&self.max_write.to_ne_bytes());
        buf[24..28].copy_from_slice(&self.time_gran.to_ne_bytes());
        buf[28..30].copy_from_slice(&self.max_pages.to_ne_bytes());
        buf[30..32].copy_from_slice(&self.map_alignment.to_ne_bytes());
        // unused[8] stays zero
        buf
    }
}

// FUSE init flags
pub const FUSE_ATOMIC_O_TRUNC: u32 = 1 << 3;
pub const FUSE_BIG_WRITES: u32 = 1 << 5;

/// Forget input.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct FuseForgetIn {
    pub nlookup: u64,
}

pub const FUSE_FORGET_IN_SIZE: usize = std::mem::size_of::<FuseForgetIn>();

impl FuseForgetIn {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < FUSE_FORGET_IN_SIZE {
            return None;
        }
        Some(Self {
            nlookup: ne_u64(data, 0)?,
        })
    }
}

/// Open output.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct FuseOpenOut {
    pub fh: u64,
    pub open_flags: u32,
    pub padding: u32,
}

pub const FUSE_OPEN_OUT_SIZE: usize = std::mem::size_of::<FuseOpenOut>();

impl FuseOpenOut {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < FUSE_OPEN_OUT_SIZE {
            return None;
        }
        Some(Self {
            fh: ne_u64(data, 0)?,
            open_flags: ne_u32(data, 8)?,
            padding: ne_u32(data, 12)?,
        })
    }

    pub fn to_bytes(self) -> [u8; FUSE_OPEN_OUT_SIZE] {
        let mut buf = [0u8; FUSE_OPEN_OUT_SIZE];
        buf[0..8].copy_from_slice(&self.fh.to_ne_bytes());
        buf[8..12].copy_from_slice(&self.open_flags.to_ne_bytes());
        buf[12..16].copy_from_slice(&self.padding.to_ne_bytes());
        buf
    }
}

/// Read input.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct FuseReadIn {
    pub fh: u64,
    pub offset: u64,
    pub size: u32,
    pub read_flags: u32,
    pub lock_owner: u64,
    pub flags: u32,
    pub padding: u32,
}

pub const FUSE_READ_IN_SIZE: usize = std::mem::size_of::<FuseReadIn>();

impl FuseReadIn {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < FUSE_READ_IN_SIZE {
            return None;
        }
        Some(Self {
            fh: ne_u64(data, 0)?,
            offset: ne_u64(data, 8)?,
            size: ne_u32(data, 16)?,
            read_flags: ne_u32(data, 20)?,
            lock_owner: ne_u64(data, 24)?,
            flags: ne_u32(data, 32)?,
            padding: ne_u32(data, 36)?,
        })
    }

    pub fn to_bytes(self) -> [u8; FUSE_READ_IN_SIZE] {
        let mut buf = [0u8; FUSE_READ_IN_SIZE];
        buf[0..8].copy_from_slice(&self.fh.to_ne_bytes());
        buf[8..16].copy_from_slice(&self.offset.to_ne_bytes());
        buf[16..20].copy_from_slice(&self.size.to_ne_bytes());
        buf[20..24].copy_from_slice(&self.read_flags.to_ne_bytes());
        buf[24..32].copy_from_slice(&self.lock_owner.to_ne_bytes());
        buf[32..36].copy_from_slice(&self.flags.to_ne_bytes());
        buf[36..40].copy_from_slice(&self.padding.to_ne_bytes());
        buf
    }
}

/// Write input. Never decoded; it only bounds the request buffer size.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug)]
pub struct FuseWriteIn {
    pub fh: u64,
    pub offset: u64,
    pub size: u32,
    pub write_flags: u32,
    pub lock_owner: u64,
    pub flags: u32,
    pub padding: u32,
}

pub const FUSE_WRITE_IN_SIZE: usize = std::mem::size_of::<FuseWriteIn>();

/// Release input.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct FuseReleaseIn {
    pub fh: u64,
    pub flags: u32,
    pub release_flags: u32,
    pub lock_owner: u64,
}

pub const FUSE_RELEASE_IN_SIZE: usize = std::mem::size_of::<FuseReleaseIn>();

impl FuseReleaseIn {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < FUSE_RELEASE_IN_SIZE {
            return None;
        }
        Some(Self {
            fh: ne_u64(data, 0)?,
            flags: ne_u32(data, 8)?,
            release_flags: ne_u32(data, 12)?,
            lock_owner: ne_u64(data, 16)?,
        })
    }

    pub fn to_bytes(self) -> [u8; FUSE_RELEASE_IN_SIZE] {
        let mut buf = [0u8; FUSE_RELEASE_IN_SIZE];
        buf[0..8].copy_from_slice(&self.fh.to_ne_bytes());
        buf[8..12].copy_from_slice(&self.flags.to_ne_bytes());
        buf[12..16].copy_from_slice(&self.release_flags.to_ne_bytes());
        buf[16..24].copy_from_slice(&self.lock_owner.to_ne_bytes());
        buf
    }
}

/// Extract a null-terminated string from a byte slice.
pub fn extract_name(data: &[u8]) -> Option<&str> {
    CStr::from_bytes_until_nul(data)
        .ok()
        .and_then(|s| s.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuse_in_header_size() {
        assert_eq!(FUSE_IN_HEADER_SIZE, 40);
    }

    #[test]
    fn fuse_out_header_size() {
        assert_eq!(FUSE_OUT_HEADER_SIZE, 16);
    }

    #[test]
    fn reply_struct_sizes_match_kernel_abi() {
        assert_eq!(FUSE_ATTR_SIZE, 88);
        assert_eq!(FUSE_ENTRY_OUT_SIZE, 128);
        assert_eq!(FUSE_ATTR_OUT_SIZE, 104);
        assert_eq!(FUSE_OPEN_OUT_SIZE, 16);
        assert_eq!(FUSE_INIT_OUT_SIZE, 64);
    }

    #[test]
    fn request_struct_sizes_match_kernel_abi() {
        assert_eq!(FUSE_INIT_IN_SIZE, 16);
        assert_eq!(FUSE_READ_IN_SIZE, 40);
        assert_eq!(FUSE_WRITE_IN_SIZE, 40);
        assert_eq!(FUSE_RELEASE_IN_SIZE, 24);
        assert_eq!(FUSE_FORGET_IN_SIZE, 8);
    }

    #[test]
    fn parse_fuse_in_header() {
        let mut data = [0u8; 40];
        data[0..4].copy_from_slice(&100u32.to_ne_bytes()); // len
        data[4..8].copy_from_slice(&26u32.to_ne_bytes()); // opcode (INIT)
        data[8..16].copy_from_slice(&12345u64.to_ne_bytes()); // unique
        data[16..24].copy_from_slice(&1u64.to_ne_bytes()); // nodeid

        let header = FuseInHeader::from_bytes(&data).unwrap();
        assert_eq!(header.len, 100);
        assert_eq!(header.opcode, 26);
        assert_eq!(header.unique, 12345);
        assert_eq!(header.nodeid, 1);
    }

    #[test]
    fn short_header_is_rejected() {
        assert!(FuseInHeader::from_bytes(&[0u8; 39]).is_none());
    }

    #[test]
    fn serialize_fuse_out_header() {
        let header = FuseOutHeader {
            len: 16,
            error: -2,
            unique: 12345,
        };
        let bytes = header.to_bytes();
        assert_eq!(u32::from_ne_bytes(bytes[0..4].try_into().unwrap()), 16);
        assert_eq!(i32::from_ne_bytes(bytes[4..8].try_into().unwrap()), -2);
        assert_eq!(u64::from_ne_bytes(bytes[8..16].try_into().unwrap()), 12345);
    }

    #[test]
    fn entry_out_places_attr_after_timeouts() {
        let out = FuseEntryOut {
            nodeid: 42,
            entry_valid: 10,
            attr_valid: 10,
            attr: FuseAttr {
                ino: 42,
                size: 1000,
                mode: 0o100777,
                ..Default::default()
            },
            ..Default::default()
        };
        let bytes = out.to_bytes();
        assert_eq!(u64::from_ne_bytes(bytes[40..48].try_into().unwrap()), 42);
        assert_eq!(u64::from_ne_bytes(bytes[48..56].try_into().unwrap()), 1000);
        assert_eq!(
            u32::from_ne_bytes(bytes[100..104].try_into().unwrap()),
            0o100777
        );
    }

    #[test]
    fn init_out_compat_prefix_decodes() {
        let out = FuseInitOut {
            major: 7,
            minor: 15,
            max_readahead: 4096,
            flags: FUSE_ATOMIC_O_TRUNC | FUSE_BIG_WRITES,
            max_background: 32,
            congestion_threshold: 32,
            max_write: 262144,
            time_gran: 1,
            ..Default::default()
        };
        let bytes = out.to_bytes();
        let decoded = FuseInitOut::from_bytes(&bytes[..FUSE_COMPAT_22_INIT_OUT_SIZE]).unwrap();
        assert_eq!(decoded.max_write, 262144);
        assert_eq!(decoded.max_background, 32);
        assert_eq!(decoded.time_gran, 0);
    }

    #[test]
    fn opcode_from_u32() {
        assert_eq!(FuseOpcode::try_from(26), Ok(FuseOpcode::Init));
        assert_eq!(FuseOpcode::try_from(2), Ok(FuseOpcode::Forget));
        assert_eq!(FuseOpcode::try_from(7), Err(()));
        assert_eq!(FuseOpcode::try_from(4096), Err(()));
    }

    #[test]
    fn extract_name_requires_terminator() {
        assert_eq!(extract_name(b"42\0"), Some("42"));
        assert_eq!(extract_name(b"42\0junk"), Some("42"));
        assert_eq!(extract_name(b"42"), None);
        assert_eq!(extract_name(b"\xff\0"), None);
    }
}
