//! Open file handle tracking.
//!
//! Maps the opaque `fh` tokens handed to the kernel on OPEN back to the
//! inode they were opened against.

use std::collections::HashMap;

pub const MAX_HANDLES: usize = 1024;

pub struct HandleTable {
    handles: HashMap<u32, u64>,
    next_fh: u32,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            handles: HashMap::new(),
            next_fh: 0,
        }
    }

    /// Allocates a token for `ino`, or `None` once [`MAX_HANDLES`] are live.
    ///
    /// Tokens come from a wrapping counter; values still live are skipped.
    pub fn insert(&mut self, ino: u64) -> Option<u32> {
        if self.is_full() {
            return None;
        }

        let mut fh = self.next_fh;
        while self.handles.contains_key(&fh) {
            fh = fh.wrapping_add(1);
        }
        self.next_fh = fh.wrapping_add(1);

        self.handles.insert(fh, ino);
        Some(fh)
    }

    pub fn get(&self, fh: u32) -> Option<u64> {
        self.handles.get(&fh).copied()
    }

    pub fn remove(&mut self, fh: u32) -> Option<u64> {
        self.handles.remove(&fh)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.handles.len() >= MAX_HANDLES
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn insert_and_get() {
        let mut table = HandleTable::new();
        let fh = table.insert(42).unwrap();

        assert_eq!(table.get(fh), Some(42));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut table = HandleTable::new();
        let fh = table.insert(7).unwrap();

        assert_eq!(table.remove(fh), Some(7));
        assert_eq!(table.remove(fh), None);
        assert!(table.get(fh).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn handle_limit_enforced() {
        let mut table = HandleTable::new();
        let mut seen = HashSet::new();

        for i in 0..MAX_HANDLES {
            let fh = table.insert(i as u64 + 2);
            assert!(fh.is_some(), "failed at {}", i);
            assert!(seen.insert(fh.unwrap()), "duplicate token at {}", i);
        }

        assert!(table.is_full());
        assert_eq!(table.insert(99999), None);
        assert_eq!(table.len(), MAX_HANDLES);
    }

    #[test]
    fn release_frees_a_slot() {
        let mut table = HandleTable::new();
        let tokens: Vec<u32> = (0..MAX_HANDLES)
            .map(|i| table.insert(i as u64).unwrap())
            .collect();

        table.remove(tokens[10]);
        let fh = table.insert(5000).unwrap();
        assert_eq!(table.get(fh), Some(5000));
        assert!(table.insert(5001).is_none());
    }

    #[test]
    fn counter_skips_live_tokens_after_wrap() {
        let mut table = HandleTable::new();
        let first = table.insert(1).unwrap();
        let second = table.insert(2).unwrap();

        table.next_fh = u32::MAX;
        assert_eq!(table.insert(3), Some(u32::MAX));

        // Counter wrapped to 0, which is still live, as is 1.
        let fh = table.insert(4).unwrap();
        assert_ne!(fh, first);
        assert_ne!(fh, second);
        assert_eq!(table.get(first), Some(1));
        assert_eq!(table.get(second), Some(2));
        assert_eq!(table.get(fh), Some(4));
    }
}
