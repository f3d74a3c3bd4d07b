//! In-flight call limit

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counts in-flight calls and rejects those above `max`
///
/// A `max` of 0 disables the limit.
#[derive(Debug)]
pub struct ConcurrencyLimit {
    max: usize,
    in_flight: AtomicUsize,
    rejected: AtomicU64,
}

impl ConcurrencyLimit {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            in_flight: AtomicUsize::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Claim a slot, or record a rejection and return `None`
    pub fn try_acquire(&self) -> Option<Permit<'_>> {
        if self.max == 0 {
            self.in_flight.fetch_add(1, Ordering::AcqRel);
            return Some(Permit { limit: self });
        }
        let claimed = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max).then_some(n + 1)
            });
        match claimed {
            Ok(_) => Some(Permit { limit: self }),
            Err(_) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

/// Releases its slot on drop
#[derive(Debug)]
pub struct Permit<'a> {
    limit: &'a ConcurrencyLimit,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.limit.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
