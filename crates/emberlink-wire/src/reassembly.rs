//! Collecting part frames back into the bytes they were split from.
//!
//! Parts can arrive in any order, interleaved with other groups, and a
//! datagram transport may lose some of them entirely. The [`Reassembler`]
//! keeps one slot table per open `group_id`:
//!
//! ```text
//! group 7, total_parts = 4
//!   slots: [ Some(c0) | None | Some(c2) | None ]   filled = 2
//!                         ↑ part 1 arrives
//!   slots: [ Some(c0) | Some(c1) | Some(c2) | None ]   filled = 3
//!                                              ↑ part 3 arrives → complete
//!   → c0 ++ c1 ++ c2 ++ c3, group removed
//! ```
//!
//! Groups that never complete are bounded two ways: a cap on how many can
//! be open at once, and [`Reassembler::evict_idle`] for groups that stopped
//! receiving parts.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};

use crate::{FragmentationFault, PartFrame, WireError, WireLimits};

/// An incomplete group: one slot per expected part.
#[derive(Debug)]
struct ReassemblyGroup {
    slots: Vec<Option<Bytes>>,
    /// Number of `Some` entries in `slots`.
    filled: usize,
    created_at: Instant,
    last_seen: Instant,
}

impl ReassemblyGroup {
    fn new(total_parts: u16, now: Instant) -> Self {
        Self {
            slots: vec![None; usize::from(total_parts)],
            filled: 0,
            created_at: now,
            last_seen: now,
        }
    }

    fn total_parts(&self) -> usize {
        self.slots.len()
    }

    fn is_complete(&self) -> bool {
        self.filled == self.slots.len()
    }

    /// Stores a chunk. A duplicate index overwrites the earlier chunk and
    /// does not count twice.
    fn insert(&mut self, index: usize, chunk: Bytes, now: Instant) {
        if self.slots[index].replace(chunk).is_none() {
            self.filled += 1;
        }
        self.last_seen = now;
    }

    /// Concatenates every chunk in index order.
    fn assemble(self) -> Bytes {
        let len = self.slots.iter().flatten().map(Bytes::len).sum();
        let mut out = BytesMut::with_capacity(len);
        for chunk in self.slots.into_iter().flatten() {
            out.extend_from_slice(&chunk);
        }
        out.freeze()
    }
}

/// Reassembles multipart groups for a single connection.
#[derive(Debug)]
pub struct Reassembler {
    groups: HashMap<u32, ReassemblyGroup>,
    max_parts: usize,
    max_open_groups: usize,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::with_limits(&WireLimits::default())
    }

    pub fn with_limits(limits: &WireLimits) -> Self {
        Self {
            groups: HashMap::new(),
            max_parts: limits.max_parts,
            max_open_groups: limits.max_open_groups.max(1),
        }
    }

    /// Accepts one part, using the current time for idle tracking.
    ///
    /// See [`accept_part_at`](Self::accept_part_at).
    pub fn accept_part(&mut self, part: PartFrame) -> Result<Option<Bytes>, WireError> {
        self.accept_part_at(part, Instant::now())
    }

    /// Accepts one part received at `now`.
    ///
    /// Returns `Ok(Some(bytes))` when this part completes its group. The
    /// bytes are every chunk concatenated in `part_index` order and the
    /// group is forgotten. Returns `Ok(None)` while parts are still missing.
    ///
    /// # Errors
    /// [`WireError::InconsistentFragmentation`] when:
    /// - `total_parts` is 0 or above the configured limit
    /// - `part_index >= total_parts`
    /// - `total_parts` disagrees with the group's first part
    ///
    /// Any group already open under the same `group_id` is discarded, and
    /// no group is created for the faulty part.
    pub fn accept_part_at(
        &mut self,
        part: PartFrame,
        now: Instant,
    ) -> Result<Option<Bytes>, WireError> {
        let PartFrame {
            part_index,
            group_id,
            total_parts,
            chunk,
        } = part;

        if let Err(fault) = self.check_part(group_id, part_index, total_parts) {
            let discarded = self.groups.remove(&group_id).is_some();
            tracing::debug!(group_id, %fault, discarded, "rejected part");
            return Err(WireError::InconsistentFragmentation { group_id, fault });
        }

        if !self.groups.contains_key(&group_id) {
            if self.groups.len() >= self.max_open_groups {
                self.evict_oldest();
            }
            self.groups
                .insert(group_id, ReassemblyGroup::new(total_parts, now));
        }

        // Present: either found above or just inserted.
        let Some(group) = self.groups.get_mut(&group_id) else {
            return Ok(None);
        };
        group.insert(usize::from(part_index), chunk, now);

        if !group.is_complete() {
            tracing::trace!(
                group_id,
                filled = group.filled,
                total_parts,
                "part stored"
            );
            return Ok(None);
        }

        let assembled = self.groups.remove(&group_id).map(ReassemblyGroup::assemble);
        if let Some(bytes) = &assembled {
            tracing::trace!(group_id, len = bytes.len(), "group complete");
        }
        Ok(assembled)
    }

    /// Drops every group that hasn't received a part for `max_idle`.
    ///
    /// Returns the evicted group ids.
    pub fn evict_idle(&mut self, now: Instant, max_idle: Duration) -> Vec<u32> {
        let stale: Vec<u32> = self
            .groups
            .iter()
            .filter(|(_, group)| now.saturating_duration_since(group.last_seen) >= max_idle)
            .map(|(&id, _)| id)
            .collect();

        for id in &stale {
            if let Some(group) = self.groups.remove(id) {
                tracing::debug!(
                    group_id = id,
                    filled = group.filled,
                    total_parts = group.total_parts(),
                    "evicted idle reassembly group"
                );
            }
        }
        stale
    }

    fn check_part(
        &self,
        group_id: u32,
        part_index: u16,
        total_parts: u16,
    ) -> Result<(), FragmentationFault> {
        if total_parts == 0 {
            return Err(FragmentationFault::ZeroParts);
        }
        if usize::from(total_parts) > self.max_parts {
            return Err(FragmentationFault::TooManyParts {
                total_parts,
                max: self.max_parts,
            });
        }
        if part_index >= total_parts {
            return Err(FragmentationFault::PartIndexOutOfRange {
                part_index,
                total_parts,
            });
        }
        if let Some(group) = self.groups.get(&group_id) {
            let expected = group.total_parts();
            if expected != usize::from(total_parts) {
                return Err(FragmentationFault::TotalPartsMismatch {
                    // The group was built from a valid u16.
                    expected: expected as u16,
                    found: total_parts,
                });
            }
        }
        Ok(())
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .groups
            .iter()
            .min_by_key(|(_, group)| group.created_at)
            .map(|(&id, _)| id);

        if let Some(id) = oldest {
            self.groups.remove(&id);
            tracing::warn!(
                group_id = id,
                limit = self.max_open_groups,
                "too many open reassembly groups, evicted oldest"
            );
        }
    }

    /// Number of incomplete groups being held.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn contains(&self, group_id: u32) -> bool {
        self.groups.contains_key(&group_id)
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}
