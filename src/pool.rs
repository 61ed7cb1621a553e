// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Bounded pool of named shared-memory segments. A segment is handed to a
// caller on allocation, moves to the in-use set, and only returns to the
// free list when the peer explicitly restores it (`SM_RESTORE`) — there is
// no garbage collection based on scope or refcount, matching the protocol's
// explicit ownership handoff.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Result, SmipcError};
use crate::shm::{ShmHandle, ShmOpenMode};

static SEGMENT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A shared-memory segment owned by the pool.
pub struct Segment {
    name: String,
    handle: ShmHandle,
}

impl Segment {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.handle.user_size()
    }

    pub fn write(&self, data: &[u8]) {
        self.handle.write(data);
    }

    pub fn read(&self, len: usize) -> Vec<u8> {
        self.handle.read(len)
    }
}

/// A segment whose restore notification failed to reach the peer. The local
/// shared-memory mapping is still released; the entry exists purely so a
/// caller can observe and log the loss, per the pool's non-fatal zombie
/// policy.
#[derive(Debug, Clone)]
pub struct ZombieSegment {
    pub name: String,
    pub capacity: usize,
}

/// Bounded free-list pool of shared-memory segments for one channel
/// direction.
pub struct SegmentPool {
    prefix: String,
    max_queue: i64,
    free: Vec<Segment>,
    in_use: HashMap<String, Segment>,
    zombies: Vec<ZombieSegment>,
}

impl SegmentPool {
    /// `prefix` namespaces segment names so two pools never collide, e.g.
    /// `"<root>/<key>.c2s"`.
    pub fn new(prefix: impl Into<String>, max_queue: i64) -> Self {
        Self {
            prefix: prefix.into(),
            max_queue,
            free: Vec::new(),
            in_use: HashMap::new(),
            zombies: Vec::new(),
        }
    }

    fn total_segments(&self) -> usize {
        self.free.len() + self.in_use.len()
    }

    fn at_capacity(&self) -> bool {
        self.max_queue >= 0 && self.total_segments() as i64 >= self.max_queue
    }

    fn next_name(&self) -> String {
        let n = SEGMENT_COUNTER.fetch_add(1, Ordering::Relaxed);
        format!("{}.{}.{}", self.prefix, std::process::id(), n)
    }

    /// Borrow (or create) a segment able to hold `size` bytes, moving it
    /// into the in-use set. First-fit over the free list, matching the
    /// reuse rule: a free segment is only reused if its capacity is already
    /// `>= size`, otherwise it is destroyed and a fresh one allocated in
    /// its place.
    pub fn acquire(&mut self, size: usize) -> Result<&Segment> {
        if let Some(idx) = self.free.iter().position(|s| s.capacity() >= size) {
            let seg = self.free.swap_remove(idx);
            let name = seg.name.clone();
            self.in_use.insert(name.clone(), seg);
            return Ok(self.in_use.get(&name).expect("just inserted"));
        }

        // No free segment big enough. If a free segment exists at all it is
        // too small for `size` and gets dropped (unlinked) to make room
        // within the bound before allocating its replacement.
        if self.at_capacity() {
            if let Some(seg) = self.free.pop() {
                drop(seg);
            } else {
                return Err(SmipcError::QueueExhausted(self.max_queue));
            }
        }

        let name = self.next_name();
        let handle = ShmHandle::acquire(&name, size, ShmOpenMode::Create)?;
        let seg = Segment { name: name.clone(), handle };
        self.in_use.insert(name.clone(), seg);
        Ok(self.in_use.get(&name).expect("just inserted"))
    }

    pub fn get(&self, name: &str) -> Result<&Segment> {
        self.in_use
            .get(name)
            .or_else(|| self.free.iter().find(|s| s.name == name))
            .ok_or_else(|| SmipcError::SegmentNotFound(name.to_string()))
    }

    /// Move a segment back to the free list after the peer has finished
    /// reading it and sent `SM_RESTORE`.
    pub fn restore(&mut self, name: &str) -> Result<()> {
        let seg = self
            .in_use
            .remove(name)
            .ok_or_else(|| SmipcError::SegmentNotFound(name.to_string()))?;
        self.free.push(seg);
        Ok(())
    }

    /// Record a segment as lost because the `SM_RESTORE` notification
    /// failed to reach the peer. This is called on the *receiving* side's
    /// pool for a segment the peer allocated — it was never tracked in
    /// this pool's own free/in-use lists, so `capacity` (the segment's
    /// `sm_data_size` from the frame header) is supplied by the caller. If
    /// the name happens to already be tracked here (the sender-owned case),
    /// it is removed from in-use tracking and its own capacity is used
    /// instead of the caller-supplied one.
    pub fn mark_zombie(&mut self, name: &str, capacity: usize) {
        let capacity = match self.in_use.remove(name) {
            Some(seg) => seg.capacity(),
            None => capacity,
        };
        tracing::warn!(segment = %name, "segment restore failed, marking zombie");
        self.zombies.push(ZombieSegment {
            name: name.to_string(),
            capacity,
        });
    }

    pub fn zombies(&self) -> &[ZombieSegment] {
        &self.zombies
    }

    pub fn in_use_count(&self) -> usize {
        self.in_use.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Drop every tracked segment, free and in-use alike, unlinking their
    /// backing storage.
    pub fn clear(&mut self) {
        self.free.clear();
        self.in_use.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_then_restore_reuses_segment() {
        let mut pool = SegmentPool::new("/smipc-pool-test-a", -1);
        let name = pool.acquire(64).unwrap().name().to_string();
        pool.restore(&name).unwrap();
        assert_eq!(pool.free_count(), 1);
        assert_eq!(pool.in_use_count(), 0);
        let reused = pool.acquire(32).unwrap();
        assert_eq!(reused.name(), name);
    }

    #[test]
    fn acquire_rejects_restore_of_unknown_name() {
        let mut pool = SegmentPool::new("/smipc-pool-test-b", -1);
        assert!(pool.restore("/does-not-exist").is_err());
    }

    #[test]
    fn bounded_pool_exhausts_at_max_queue() {
        let mut pool = SegmentPool::new("/smipc-pool-test-c", 1);
        pool.acquire(16).unwrap();
        let err = pool.acquire(16);
        assert!(matches!(err, Err(SmipcError::QueueExhausted(1))));
    }

    #[test]
    fn zombie_segment_is_recorded_and_not_reusable() {
        let mut pool = SegmentPool::new("/smipc-pool-test-d", -1);
        let name = pool.acquire(16).unwrap().name().to_string();
        pool.mark_zombie(&name, 16);
        assert_eq!(pool.zombies().len(), 1);
        assert_eq!(pool.zombies()[0].name, name);
        assert_eq!(pool.in_use_count(), 0);
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn zombie_for_peer_owned_name_uses_caller_supplied_capacity() {
        // The receiving side's pool never allocated the peer's segment, so
        // it has no entry for it under `name` at all; `mark_zombie` must
        // still record it using the size carried in the frame header.
        let mut pool = SegmentPool::new("/smipc-pool-test-f", -1);
        pool.mark_zombie("/peer-owned-segment", 4096);
        assert_eq!(pool.zombies().len(), 1);
        assert_eq!(pool.zombies()[0].name, "/peer-owned-segment");
        assert_eq!(pool.zombies()[0].capacity, 4096);
    }

    #[test]
    fn too_small_free_segment_is_replaced_not_reused() {
        let mut pool = SegmentPool::new("/smipc-pool-test-e", -1);
        let small = pool.acquire(8).unwrap().name().to_string();
        pool.restore(&small).unwrap();
        let seg = pool.acquire(4096).unwrap();
        assert_ne!(seg.name(), small);
    }
}
