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

use std::{
    fmt::Display,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use hibernal_common::{clock::Timestamp, entry::Version, key::CacheKey, strict_assert};

static NEXT_LOCK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique identifier of a soft lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LockId(u64);

impl LockId {
    /// Allocate a fresh lock id.
    pub fn next() -> Self {
        Self(NEXT_LOCK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for LockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lock-{}", self.0)
    }
}

/// The unit of work a soft lock was first acquired for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockOwner(u64);

impl LockOwner {
    /// Create an owner marker from a raw unit-of-work id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw id of the owner.
    pub const fn id(&self) -> u64 {
        self.0
    }
}

/// Proof of holding a soft lock on a key.
///
/// Handed out by [`crate::region::Region::lock`] and surrendered on release.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockHandle {
    key: CacheKey,
    id: LockId,
}

impl LockHandle {
    pub(crate) fn new(key: CacheKey, id: LockId) -> Self {
        Self { key, id }
    }

    /// Key the lock was acquired on.
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Id of the lock.
    pub fn id(&self) -> LockId {
        self.id
    }
}

/// Proof of holding the region-wide invalidation lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionLock {
    id: LockId,
}

impl RegionLock {
    pub(crate) fn new(id: LockId) -> Self {
        Self { id }
    }

    /// Id of the lock.
    pub fn id(&self) -> LockId {
        self.id
    }
}

/// Reasons a lock handle is refused.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LockStateError {
    /// The key holds no soft lock, e.g. it was evicted or its lock expired and was cleaned up.
    #[error("key {key} is not soft-locked, {presented} cannot be released")]
    NotLocked {
        /// Key the handle refers to.
        key: String,
        /// Lock id of the presented handle.
        presented: LockId,
    },
    /// The key holds a different soft lock.
    #[error("key {key} is soft-locked by {current}, {presented} cannot be released")]
    Mismatch {
        /// Key the handle refers to.
        key: String,
        /// Lock id of the presented handle.
        presented: LockId,
        /// Lock id currently recorded for the key.
        current: LockId,
    },
    /// The region-wide lock is not held by the presented handle.
    #[error("region is not locked by {presented}")]
    RegionNotLocked {
        /// Lock id of the presented handle.
        presented: LockId,
    },
}

/// Outcome of releasing one hold on a soft lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Other holders remain.
    Held,
    /// The last hold was released.
    Unlocked,
}

/// The lock-state record a writer leaves in place of the cached entry.
///
/// While any soft lock is present, readers miss and puts-from-load are refused unless the lock has timed out before
/// the loading transaction started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftLock {
    id: LockId,
    owner: LockOwner,
    acquired_at: Timestamp,
    timeout_at: Timestamp,
    multiplicity: u32,
    concurrent: bool,
    version: Option<Version>,
    unlocked_at: Option<Timestamp>,
}

impl SoftLock {
    pub(crate) fn new(owner: LockOwner, now: Timestamp, timeout: Duration, version: Option<Version>) -> Self {
        Self {
            id: LockId::next(),
            owner,
            acquired_at: now,
            timeout_at: now.saturating_add(timeout),
            multiplicity: 1,
            concurrent: false,
            version,
            unlocked_at: None,
        }
    }

    /// Take another hold on the lock. The timeout is refreshed.
    pub(crate) fn reenter(&mut self, now: Timestamp, timeout: Duration) {
        self.multiplicity += 1;
        self.concurrent = true;
        self.timeout_at = now.saturating_add(timeout);
    }

    /// Release one hold on the lock.
    pub(crate) fn release(&mut self, now: Timestamp) -> Release {
        strict_assert!(self.multiplicity > 0, "soft lock {} released more often than acquired", self.id);
        self.multiplicity = self.multiplicity.saturating_sub(1);
        if self.multiplicity == 0 {
            self.unlocked_at = Some(now);
            Release::Unlocked
        } else {
            Release::Held
        }
    }

    /// Returns `true` if the lock timed out before `ts`.
    pub fn is_expired(&self, ts: Timestamp) -> bool {
        self.timeout_at < ts
    }

    /// Id of the lock.
    pub fn id(&self) -> LockId {
        self.id
    }

    /// The unit of work that first acquired the lock.
    pub fn owner(&self) -> LockOwner {
        self.owner
    }

    /// When the lock was first acquired.
    pub fn acquired_at(&self) -> Timestamp {
        self.acquired_at
    }

    /// When the lock times out.
    pub fn timeout_at(&self) -> Timestamp {
        self.timeout_at
    }

    /// Number of outstanding holds.
    pub fn multiplicity(&self) -> u32 {
        self.multiplicity
    }

    /// Returns `true` once more than one hold has been taken.
    pub fn is_concurrent(&self) -> bool {
        self.concurrent
    }

    /// Version of the state the lock replaced.
    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    /// When the last hold was released.
    pub fn unlocked_at(&self) -> Option<Timestamp> {
        self.unlocked_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reentrant_release() {
        let now = Timestamp::from_millis(10);
        let mut lock = SoftLock::new(LockOwner::new(1), now, Duration::from_millis(100), Some(Version::from(1)));
        assert_eq!(lock.multiplicity(), 1);
        assert!(!lock.is_concurrent());
        assert_eq!(lock.timeout_at(), Timestamp::from_millis(110));

        lock.reenter(Timestamp::from_millis(20), Duration::from_millis(100));
        assert_eq!(lock.multiplicity(), 2);
        assert!(lock.is_concurrent());
        assert_eq!(lock.timeout_at(), Timestamp::from_millis(120));

        assert_eq!(lock.release(Timestamp::from_millis(30)), Release::Held);
        assert_eq!(lock.unlocked_at(), None);
        assert_eq!(lock.release(Timestamp::from_millis(40)), Release::Unlocked);
        assert_eq!(lock.unlocked_at(), Some(Timestamp::from_millis(40)));
        assert!(lock.is_concurrent());
    }

    #[test]
    fn test_expiry() {
        let lock = SoftLock::new(LockOwner::new(1), Timestamp::from_millis(0), Duration::from_millis(5), None);
        assert!(!lock.is_expired(Timestamp::from_millis(5)));
        assert!(lock.is_expired(Timestamp::from_millis(6)));
    }

    #[test]
    fn test_lock_ids_unique() {
        let a = LockId::next();
        let b = LockId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_lock_state_error_display() {
        let presented = LockId(7);
        let err = LockStateError::NotLocked {
            key: "Person#1".to_string(),
            presented,
        };
        assert_eq!(err.to_string(), "key Person#1 is not soft-locked, lock-7 cannot be released");
    }
}
