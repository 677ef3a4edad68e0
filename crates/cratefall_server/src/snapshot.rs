//! # Shared World Snapshot Slot
//!
//! A single-slot buffer between the simulation driver (writer) and the
//! broadcast-path stream producer (reader). Writers replace, readers copy
//! out; the mutex is held only for the assignment or the copy. There is
//! no queue: a missed read means the frame was superseded, which is the
//! intended freshness semantics.

use parking_lot::Mutex;

#[derive(Default)]
struct Slot {
    payload: Vec<u8>,
    fresh: bool,
}

/// Latest-snapshot container shared between producer and consumer threads.
#[derive(Default)]
pub struct SharedSnapshot {
    slot: Mutex<Slot>,
}

impl SharedSnapshot {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stored payload with `payload`.
    pub fn publish(&self, payload: Vec<u8>) {
        let mut slot = self.slot.lock();
        slot.payload = payload;
        slot.fresh = true;
    }

    /// Copies out the latest payload without blocking.
    ///
    /// Returns `None` when the slot has never been written or when the
    /// writer currently holds the lock; the caller treats both as
    /// "nothing to send this tick". The pump must never wait here.
    #[must_use]
    pub fn try_read(&self) -> Option<Vec<u8>> {
        let slot = self.slot.try_lock()?;
        if slot.fresh {
            Some(slot.payload.clone())
        } else {
            None
        }
    }

    /// Blocking copy of the latest payload, for request/response callers.
    #[must_use]
    pub fn read(&self) -> Option<Vec<u8>> {
        let slot = self.slot.lock();
        if slot.fresh {
            Some(slot.payload.clone())
        } else {
            None
        }
    }

    /// Returns true until the first publish.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.slot.lock().fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_until_first_publish() {
        let snap = SharedSnapshot::new();
        assert!(snap.is_empty());
        assert_eq!(snap.try_read(), None);
        assert_eq!(snap.read(), None);
    }

    #[test]
    fn test_publish_replaces() {
        let snap = SharedSnapshot::new();
        snap.publish(vec![1, 2, 3]);
        assert_eq!(snap.try_read(), Some(vec![1, 2, 3]));

        snap.publish(vec![9]);
        assert_eq!(snap.try_read(), Some(vec![9]));
        assert!(!snap.is_empty());
    }

    #[test]
    fn test_try_read_skips_while_writer_holds_lock() {
        let snap = SharedSnapshot::new();
        snap.publish(vec![1]);
        let guard = snap.slot.lock();
        assert_eq!(snap.try_read(), None);
        drop(guard);
        assert_eq!(snap.try_read(), Some(vec![1]));
    }
}
