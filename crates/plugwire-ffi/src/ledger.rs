//! Bookkeeping for every buffer handed to the host
//!
//! The ledger owns the backing memory of each owned buffer until the host
//! releases it. Keys are data addresses, so a release of an address that is
//! not live (a second release, or a pointer the plugin never produced) is
//! detected instead of corrupting the allocator.

use dashmap::DashMap;
use once_cell::sync::Lazy;

static GLOBAL: Lazy<AllocationLedger> = Lazy::new(AllocationLedger::new);

/// Word-aligned storage so response payloads can be cast to host structs.
struct Block {
    words: Vec<u64>,
}

/// A live allocation as seen by the boundary types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub data: *mut u8,
    /// Bytes the caller asked for
    pub len: usize,
    /// Bytes actually reserved (multiple of 8, at least 8)
    pub capacity: usize,
}

/// Registry of live owned buffers, keyed by data address
pub struct AllocationLedger {
    blocks: DashMap<usize, Block>,
}

impl AllocationLedger {
    pub fn new() -> Self {
        Self {
            blocks: DashMap::new(),
        }
    }

    /// Ledger backing the exported free functions
    pub fn global() -> &'static AllocationLedger {
        &GLOBAL
    }

    /// Copy `bytes` into a fresh 8-byte aligned allocation
    ///
    /// Even an empty slice gets a distinct non-null address, so present-empty
    /// stays distinguishable from absent.
    pub fn allocate(&self, bytes: &[u8]) -> Allocation {
        self.allocate_with_terminator(bytes, false)
    }

    /// Like [`AllocationLedger::allocate`] but followed by a NUL byte that is
    /// not counted in `len`
    pub fn allocate_c_string(&self, bytes: &[u8]) -> Allocation {
        self.allocate_with_terminator(bytes, true)
    }

    fn allocate_with_terminator(&self, bytes: &[u8], nul: bool) -> Allocation {
        let needed = bytes.len() + usize::from(nul);
        let word_count = needed.div_ceil(8).max(1);
        let mut words = vec![0u64; word_count];
        let data = words.as_mut_ptr().cast::<u8>();
        // SAFETY: `words` spans word_count * 8 >= bytes.len() bytes and does not
        // overlap `bytes`. The zero fill already provides the terminator.
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), data, bytes.len()) };

        let allocation = Allocation {
            data,
            len: bytes.len(),
            capacity: word_count * 8,
        };
        // Moving the Vec into the map keeps its heap buffer in place.
        self.blocks.insert(data as usize, Block { words });
        allocation
    }

    /// Drop the allocation at `data`
    ///
    /// Returns false, without touching memory, when `data` is not live.
    pub fn release(&self, data: *const u8) -> bool {
        match self.blocks.remove(&(data as usize)) {
            Some((_, block)) => {
                drop(block.words);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, data: *const u8) -> bool {
        self.blocks.contains_key(&(data as usize))
    }

    /// Number of buffers still waiting for the host to release them
    pub fn live_count(&self) -> usize {
        self.blocks.len()
    }

    /// Total reserved bytes of live buffers
    pub fn live_bytes(&self) -> usize {
        self.blocks
            .iter()
            .map(|entry| entry.value().words.len() * 8)
            .sum()
    }
}

impl Default for AllocationLedger {
    fn default() -> Self {
        Self::new()
    }
}
