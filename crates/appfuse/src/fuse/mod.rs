//! FUSE kernel protocol.
//!
//! Wire structures for the subset of the protocol this filesystem speaks,
//! and the table of open file handles.

mod handle;
mod protocol;

pub use handle::{HandleTable, MAX_HANDLES};
pub use protocol::*;
