//! GC bridge (C6): forwards reachable-root sets to the chunk store's own
//! sweep. The core adds no sweep policy, only a serialization point so no
//! concurrent root update overlaps a sweep.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Serializes [`crate::dataset::Datasets::gc`] against
/// [`crate::root_update::update`]-driven root swaps: updates hold the read
/// side (many may proceed concurrently), GC holds the write side (exclusive,
/// and waits for in-flight updates to finish first). A single process-wide
/// lock; multi-process coordination is out of scope.
#[derive(Default)]
pub struct PruningLock(RwLock<()>);

impl PruningLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.0.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, ()> {
        self.0.write()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_reads_coexist() {
        let lock = PruningLock::new();
        let a = lock.read();
        let b = lock.read();
        drop(a);
        drop(b);
    }

    #[test]
    fn write_is_exclusive_of_reads() {
        let lock = PruningLock::new();
        let read = lock.read();
        assert!(lock.0.try_write().is_none());
        drop(read);
        assert!(lock.0.try_write().is_some());
    }
}
