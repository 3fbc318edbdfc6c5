//! Striped node locks
//!
//! A fixed pool of mutexes shared by all node indices. Many indices map to
//! the same stripe; the root's stripe sits on every insert/remove path.

use parking_lot::{Mutex, MutexGuard};

pub(crate) struct Stripes<const L: usize> {
    locks: [Mutex<()>; L],
}

impl<const L: usize> Stripes<L> {
    const NON_EMPTY: () = assert!(L > 0, "lock stripe count must be positive");

    pub fn new() -> Self {
        let () = Self::NON_EMPTY;
        Stripes {
            locks: std::array::from_fn(|_| Mutex::new(())),
        }
    }

    /// Stripe used for node `index`
    pub fn stripe_of(index: usize) -> usize {
        // Fibonacci hashing spreads sibling indices over different stripes.
        let mixed = (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        ((mixed >> 32) % L as u64) as usize
    }

    pub fn lock(&self, index: usize) -> MutexGuard<'_, ()> {
        self.locks[Self::stripe_of(index)].lock()
    }

    /// Lock every stripe touched by `indices`, in ascending stripe order
    ///
    /// Shared stripes are locked once; the global order keeps concurrent
    /// callers from deadlocking against each other.
    pub fn lock_many(&self, indices: &[usize]) -> Vec<MutexGuard<'_, ()>> {
        let mut stripes: Vec<usize> = indices.iter().map(|&i| Self::stripe_of(i)).collect();
        stripes.sort_unstable();
        stripes.dedup();
        stripes.into_iter().map(|s| self.locks[s].lock()).collect()
    }

    /// Lock the whole pool, for consistent snapshots
    pub fn lock_all(&self) -> Vec<MutexGuard<'_, ()>> {
        self.locks.iter().map(|lock| lock.lock()).collect()
    }
}
