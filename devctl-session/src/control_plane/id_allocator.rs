//! Session-id allocation owned by an explicit allocator object.

use std::sync::atomic::{AtomicU64, Ordering};

pub type SessionId = u64;

/// Hands out unique, increasing session ids.
///
/// Share one allocator (by reference or `Arc`) between every session that must have
/// distinct ids.
#[derive(Debug)]
pub struct SessionIdAllocator {
    next: AtomicU64,
}

impl SessionIdAllocator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: SessionId) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    pub fn allocate(&self) -> SessionId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for SessionIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::SessionIdAllocator;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn allocate_is_sequential_from_start() {
        let allocator = SessionIdAllocator::starting_at(10);
        assert_eq!(allocator.allocate(), 10);
        assert_eq!(allocator.allocate(), 11);
    }

    #[test]
    fn independent_allocators_do_not_share_state() {
        let a = SessionIdAllocator::new();
        let b = SessionIdAllocator::new();
        assert_eq!(a.allocate(), 1);
        assert_eq!(b.allocate(), 1);
    }

    #[test]
    fn concurrent_allocation_yields_unique_ids() {
        let allocator = Arc::new(SessionIdAllocator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let allocator = allocator.clone();
                std::thread::spawn(move || {
                    (0..100).map(|_| allocator.allocate()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().expect("allocator thread") {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 400);
    }
}
