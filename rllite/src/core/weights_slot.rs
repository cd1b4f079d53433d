//! Versioned slot for serialized policy weights.
//!
//! The trainer records the trained model to bytes once per iteration and
//! publishes them here; remote rollout workers load the bytes before their
//! next fragment if the version moved.
//!
//! ```text
//! Trainer thread                          Rollout thread
//! ┌──────────────────┐                     ┌──────────────────┐
//! │ optimizer.step() │                     │ inference model  │
//! │       ↓          │                     │       ↑          │
//! │ recorder.record()│                     │ recorder.load()  │
//! │       ↓          │                     │       ↑          │
//! │   Vec<u8>  ────────WeightsSlot───────→ │  Arc<Vec<u8>>    │
//! └──────────────────┘                     └──────────────────┘
//! ```

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Latest serialized weights plus a monotonically increasing version.
///
/// Bytes are shared behind an `Arc`, so every worker reads the same buffer.
pub struct WeightsSlot {
    bytes: Mutex<Option<Arc<Vec<u8>>>>,
    version: AtomicU64,
}

impl WeightsSlot {
    /// Empty slot at version 0.
    pub fn new() -> Self {
        Self {
            bytes: Mutex::new(None),
            version: AtomicU64::new(0),
        }
    }

    /// Current version. 0 means nothing was published yet.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Publish new weights and return the new version.
    pub fn publish(&self, bytes: Vec<u8>) -> u64 {
        let mut guard = self.bytes.lock();
        *guard = Some(Arc::new(bytes));
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Latest weights with their version.
    pub fn get(&self) -> Option<(u64, Arc<Vec<u8>>)> {
        let guard = self.bytes.lock();
        guard.as_ref().map(|b| (self.version(), Arc::clone(b)))
    }

    /// Weights newer than `seen`, if any.
    pub fn get_if_newer(&self, seen: u64) -> Option<(u64, Arc<Vec<u8>>)> {
        if self.version() <= seen {
            return None;
        }
        self.get()
    }
}

impl Default for WeightsSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared weights slot.
pub type SharedWeightsSlot = Arc<WeightsSlot>;

/// Create a shared, empty weights slot.
pub fn weights_slot() -> SharedWeightsSlot {
    Arc::new(WeightsSlot::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_publish_and_get() {
        let slot = WeightsSlot::new();
        assert!(slot.get().is_none());
        assert_eq!(slot.version(), 0);

        assert_eq!(slot.publish(vec![1, 2, 3]), 1);
        let (version, bytes) = slot.get().unwrap();
        assert_eq!(version, 1);
        assert_eq!(bytes.as_slice(), &[1, 2, 3]);

        // Reading does not consume.
        assert!(slot.get().is_some());
    }

    #[test]
    fn test_get_if_newer() {
        let slot = WeightsSlot::new();
        assert!(slot.get_if_newer(0).is_none());

        slot.publish(vec![1]);
        assert!(slot.get_if_newer(0).is_some());
        assert!(slot.get_if_newer(1).is_none());

        slot.publish(vec![2]);
        let (version, bytes) = slot.get_if_newer(1).unwrap();
        assert_eq!(version, 2);
        assert_eq!(bytes.as_slice(), &[2]);
    }

    #[test]
    fn test_concurrent_readers() {
        let slot = weights_slot();
        slot.publish(vec![7; 64]);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let slot = Arc::clone(&slot);
                thread::spawn(move || slot.get().map(|(_, b)| b.len()))
            })
            .collect();

        for h in handles {
            assert_eq!(h.join().unwrap(), Some(64));
        }
    }
}
