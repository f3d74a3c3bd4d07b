//! Generational registry behind the opaque handles given to the host
//!
//! A handle encodes a slot index and the generation of the slot at insertion
//! time. Removing an entry bumps the generation, so a stale handle is rejected
//! by comparison instead of reaching freed memory.

use parking_lot::RwLock;
use std::sync::Arc;

/// Opaque, non-zero handle value
///
/// Layout: `(generation << 32) | (index + 1)`. Zero is never produced, so the
/// host can use a null pointer for "no handle".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(u64);

impl HandleId {
    fn new(index: usize, generation: u32) -> Option<Self> {
        let slot = u32::try_from(index).ok()?.checked_add(1)?;
        Some(Self((u64::from(generation) << 32) | u64::from(slot)))
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }

    /// Slot index, or `None` for the null handle
    fn index(self) -> Option<usize> {
        let slot = (self.0 & u64::from(u32::MAX)) as u32;
        slot.checked_sub(1).map(|i| i as usize)
    }

    fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

struct Slot<T> {
    generation: u32,
    entry: Option<Arc<T>>,
}

struct Slots<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
}

/// Arena of `Arc<T>` addressed by [`HandleId`]
pub struct HandleRegistry<T> {
    inner: RwLock<Slots<T>>,
}

impl<T> HandleRegistry<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Slots {
                slots: Vec::new(),
                free: Vec::new(),
            }),
        }
    }

    /// Store `value`, reusing a free slot when one exists
    ///
    /// Returns `None` only when the index space is exhausted.
    pub fn insert(&self, value: Arc<T>) -> Option<HandleId> {
        let mut inner = self.inner.write();
        if let Some(index) = inner.free.pop() {
            let slot = &mut inner.slots[index];
            slot.entry = Some(value);
            return HandleId::new(index, slot.generation);
        }
        let index = inner.slots.len();
        let id = HandleId::new(index, 0)?;
        inner.slots.push(Slot {
            generation: 0,
            entry: Some(value),
        });
        Some(id)
    }

    /// Resolve a handle; stale, unknown and null handles yield `None`
    pub fn get(&self, id: HandleId) -> Option<Arc<T>> {
        let index = id.index()?;
        let inner = self.inner.read();
        let slot = inner.slots.get(index)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.entry.clone()
    }

    /// Retire a handle and return its entry
    ///
    /// The slot generation moves on, so `id` stays invalid even after the
    /// slot is reused.
    pub fn remove(&self, id: HandleId) -> Option<Arc<T>> {
        let index = id.index()?;
        let mut inner = self.inner.write();
        let slot = inner.slots.get_mut(index)?;
        if slot.generation != id.generation() {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        inner.free.push(index);
        Some(entry)
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let inner = self.inner.read();
        inner.slots.len() - inner.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
