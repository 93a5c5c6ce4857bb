// Copyright 2026 hibernal Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use hibernal_common::{
    clock::Timestamp,
    entry::{CacheEntry, Version},
};

use crate::lock::SoftLock;

/// What a region records for a key.
///
/// A key with no slot is ABSENT. Only [`Slot::Entry`] is readable.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// A readable cached entry.
    Entry(CacheEntry),
    /// A soft lock held by one or more writers.
    Locked(SoftLock),
    /// The trace a released lock leaves behind.
    ///
    /// Puts-from-load whose transaction started before `unlocked_at` are refused, unless they carry a version newer
    /// than `version`.
    Fenced(Fence),
}

/// Trace of a released soft lock or of an invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fence {
    /// When the key was last released or invalidated.
    pub unlocked_at: Timestamp,
    /// Version of the state that was locked, if known.
    pub version: Option<Version>,
}

impl Fence {
    /// Decide whether a load started at `tx_ts` carrying `version` may pass the fence.
    pub fn admits(&self, tx_ts: Timestamp, version: Option<&Version>) -> bool {
        if let (Some(fenced), Some(version)) = (self.version.as_ref(), version) {
            if version.is_newer_than(fenced) {
                return true;
            }
        }
        self.unlocked_at < tx_ts
    }
}

/// Region-wide invalidation state of a backend namespace.
///
/// While any bulk operation is in progress the region is unreadable. Once the last one ends, loads whose transaction
/// started at or before `fenced_at` are refused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegionFence {
    /// Bulk operations in progress on the region, across the cluster.
    pub invalidators: usize,
    /// When the last bulk operation ended.
    pub fenced_at: Option<Timestamp>,
}

impl RegionFence {
    /// Returns `true` while a bulk operation is in progress.
    pub fn is_invalidating(&self) -> bool {
        self.invalidators > 0
    }

    /// Decide whether a load started at `tx_ts` may be cached.
    pub fn admits(&self, tx_ts: Timestamp) -> bool {
        !self.is_invalidating() && !matches!(self.fenced_at, Some(fenced_at) if fenced_at >= tx_ts)
    }

    pub(crate) fn begin(&mut self) {
        self.invalidators += 1;
    }

    pub(crate) fn end(&mut self, at: Timestamp) {
        self.invalidators = self.invalidators.saturating_sub(1);
        self.fenced_at = self.fenced_at.max(Some(at));
    }
}

impl Slot {
    /// The readable entry, if any.
    pub fn entry(&self) -> Option<&CacheEntry> {
        match self {
            Slot::Entry(entry) => Some(entry),
            _ => None,
        }
    }

    /// The soft lock, if any.
    pub fn lock(&self) -> Option<&SoftLock> {
        match self {
            Slot::Locked(lock) => Some(lock),
            _ => None,
        }
    }
}
