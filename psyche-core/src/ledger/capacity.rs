//! Capacity ledger.
//!
//! `allocated + available == total` holds after every mutation.

use serde::{Deserialize, Serialize};

/// Units of simulated memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryCapacity {
    /// Total units.
    pub total: u64,
    /// Units in use.
    pub allocated: u64,
    /// Units free.
    pub available: u64,
    /// Free units below which the ledger is under pressure.
    pub reserved: u64,
}

impl MemoryCapacity {
    /// An empty ledger of `total` units.
    #[must_use]
    pub fn new(total: u64, reserved: u64) -> Self {
        Self {
            total,
            allocated: 0,
            available: total,
            reserved: reserved.min(total),
        }
    }

    /// Whether `size` units are free.
    #[must_use]
    pub fn can_fit(&self, size: u64) -> bool {
        self.available >= size
    }

    /// Take `size` units. Returns `false` and changes nothing if they are not free.
    pub fn allocate(&mut self, size: u64) -> bool {
        if !self.can_fit(size) {
            return false;
        }
        self.allocated += size;
        self.available -= size;
        true
    }

    /// Return `size` units.
    pub fn release(&mut self, size: u64) {
        let size = size.min(self.allocated);
        self.allocated -= size;
        self.available += size;
    }

    /// Whether free space is below the reserve.
    #[must_use]
    pub fn is_under_pressure(&self) -> bool {
        self.available < self.reserved
    }

    /// Fraction of capacity in use.
    #[must_use]
    pub fn usage_ratio(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.allocated as f32 / self.total as f32
        }
    }

    /// Whether the accounting invariant holds.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.allocated + self.available == self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_and_release_keep_invariant() {
        let mut cap = MemoryCapacity::new(1_000, 100);
        assert!(cap.allocate(400));
        assert!(cap.is_consistent());
        assert!(!cap.allocate(601));
        assert_eq!(cap.available, 600);
        cap.release(1_000);
        assert_eq!(cap.allocated, 0);
        assert!(cap.is_consistent());
    }

    #[test]
    fn pressure_is_below_reserve() {
        let mut cap = MemoryCapacity::new(1_000, 100);
        assert!(cap.allocate(900));
        assert!(!cap.is_under_pressure());
        assert!(cap.allocate(1));
        assert!(cap.is_under_pressure());
    }
}
