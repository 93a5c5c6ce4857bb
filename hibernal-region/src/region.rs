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
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use hashbrown::HashMap;
use hibernal_common::{
    clock::{Clock, Timestamp},
    entry::{CacheEntry, Version},
    error::{Error, ErrorKind, Result},
    key::CacheKey,
    metrics::Metrics,
};
use parking_lot::Mutex;

use crate::{
    backend::{Backend, Compute, Propagation},
    lock::{LockHandle, LockId, LockOwner, LockStateError, RegionLock, Release, SoftLock},
    slot::{Fence, Slot},
    statistics::{RegionStatistics, Statistics},
};

/// Default soft lock timeout.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// Everything needed to open a [`Region`].
#[derive(Debug)]
pub struct RegionConfig {
    /// Fully qualified region name.
    pub name: String,
    /// How long a soft lock protects a key before it may be replaced.
    pub lock_timeout: Duration,
    /// Storage of the region.
    pub backend: Arc<dyn Backend>,
    /// Source of lock and unlock timestamps.
    pub clock: Arc<dyn Clock>,
    /// Metrics of the region.
    pub metrics: Arc<Metrics>,
}

/// A named segment of a backend holding cached entries and soft locks.
///
/// Every operation is a single atomic step on the slot of one key. No operation ever waits for another writer: a
/// contended key is simply reported as a miss or a refused put.
#[derive(Debug)]
pub struct Region {
    name: String,
    lock_timeout: Duration,
    backend: Arc<dyn Backend>,
    clock: Arc<dyn Clock>,
    metrics: Arc<Metrics>,
    statistics: Statistics,
    region_lock: Mutex<Option<LockId>>,
    destroyed: AtomicBool,
}

/// Keep the newer of two versions, preferring `current` when they are not comparable.
fn newest(candidate: Option<Version>, current: Option<Version>) -> Option<Version> {
    match (candidate, current) {
        (Some(c), Some(o)) if c.is_newer_than(&o) => Some(c),
        (_, Some(o)) => Some(o),
        (c, None) => c,
    }
}

fn lock_state_error(handle: &LockHandle, slot: Option<&Slot>) -> LockStateError {
    match slot {
        Some(Slot::Locked(current)) => LockStateError::Mismatch {
            key: handle.key().to_string(),
            presented: handle.id(),
            current: current.id(),
        },
        _ => LockStateError::NotLocked {
            key: handle.key().to_string(),
            presented: handle.id(),
        },
    }
}

/// Leave a key unreadable after a rejected lock handle. A lock held by someone else already is.
fn force_absent(slot: Option<&Slot>, now: Timestamp) -> Compute {
    match slot {
        Some(Slot::Locked(_)) => Compute::Keep,
        _ => Compute::Set(Slot::Fenced(Fence {
            unlocked_at: now,
            version: None,
        })),
    }
}

impl Region {
    /// Open a region on its backend.
    pub fn open(config: RegionConfig) -> Result<Self> {
        config.backend.start_region(&config.name)?;
        tracing::info!(
            "[region]: region {} started, lock timeout {:?}",
            config.name,
            config.lock_timeout
        );
        Ok(Self {
            name: config.name,
            lock_timeout: config.lock_timeout,
            backend: config.backend,
            clock: config.clock,
            metrics: config.metrics,
            statistics: Statistics::default(),
            region_lock: Mutex::new(None),
            destroyed: AtomicBool::new(false),
        })
    }

    /// Fully qualified name of the region.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Soft lock timeout of the region.
    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Clock of the region.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Returns `true` once the region has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::closed(&self.name));
        }
        Ok(())
    }

    fn is_invalidating(&self) -> Result<bool> {
        Ok(self.backend.region_fence(&self.name)?.is_invalidating())
    }

    fn illegal_lock(&self, handle: &LockHandle, source: LockStateError) -> Error {
        self.metrics.region_illegal_lock.increase(1);
        tracing::warn!("[region]: region {} rejected soft lock handle: {source}", self.name);
        Error::new(ErrorKind::IllegalLockState, "soft lock handle rejected")
            .with_context("region", &self.name)
            .with_context("key", handle.key())
            .with_source(source)
    }

    /// Read the entry cached for `key`.
    ///
    /// Locked and fenced keys read as a miss.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "hibernal::region::get"))]
    pub fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        self.ensure_open()?;

        let entry = if self.is_invalidating()? {
            None
        } else {
            match self.backend.get(&self.name, key)? {
                Some(Slot::Entry(entry)) => Some(entry),
                _ => None,
            }
        };

        if entry.is_some() {
            self.statistics.record_hit();
            self.metrics.region_hit.increase(1);
        } else {
            self.statistics.record_miss();
            self.metrics.region_miss.increase(1);
        }
        Ok(entry)
    }

    /// Returns `true` if `key` holds a readable entry. Unlike [`Region::get`], nothing is counted.
    pub fn contains(&self, key: &CacheKey) -> Result<bool> {
        self.ensure_open()?;
        Ok(matches!(self.backend.get(&self.name, key)?, Some(Slot::Entry(_))))
    }

    /// Cache `entry` for `key` unconditionally, replacing whatever the key holds.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "hibernal::region::put"))]
    pub fn put(&self, key: &CacheKey, entry: CacheEntry) -> Result<()> {
        self.ensure_open()?;
        let now = self.clock.now();
        self.backend
            .compute(&self.name, key, Propagation::Invalidate(now), &mut |_| {
                Compute::Set(Slot::Entry(entry.clone()))
            })?;
        self.statistics.record_put();
        self.metrics.region_put.increase(1);
        Ok(())
    }

    /// Cache state just loaded from the database by a transaction started at `tx_ts`.
    ///
    /// The put is refused if:
    ///
    /// - the key holds a soft lock that had not timed out when the transaction started,
    /// - the key or the whole region was released or invalidated at or after `tx_ts`, unless `version` is newer than
    ///   the released one,
    /// - the key is already cached and `minimal_put` is set,
    /// - the key is already cached with a version not older than `version`, or either side is unversioned.
    ///
    /// Puts-from-load never propagate to other nodes.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "hibernal::region::put_from_load"))]
    pub fn put_from_load(
        &self,
        key: &CacheKey,
        entry: CacheEntry,
        tx_ts: Timestamp,
        version: Option<Version>,
        minimal_put: bool,
    ) -> Result<bool> {
        self.ensure_open()?;

        if !self.backend.region_fence(&self.name)?.admits(tx_ts) {
            tracing::debug!(
                "[region]: region {} refused put from load of {key}, region invalidated after {tx_ts}",
                self.name
            );
            self.metrics.region_stale.increase(1);
            return Ok(false);
        }

        let entry = entry.versioned(version);
        let mut stale = false;
        let put = self
            .backend
            .compute(&self.name, key, Propagation::Local, &mut |slot| {
                let puttable = match slot {
                    None => true,
                    Some(Slot::Entry(_)) if minimal_put => false,
                    Some(Slot::Entry(cached)) => {
                        matches!((entry.version(), cached.version()), (Some(v), Some(c)) if v.is_newer_than(c))
                    }
                    Some(Slot::Locked(lock)) => lock.is_expired(tx_ts),
                    Some(Slot::Fenced(fence)) => fence.admits(tx_ts, entry.version()),
                };
                if puttable {
                    Compute::Set(Slot::Entry(entry.clone()))
                } else {
                    stale = !(minimal_put && matches!(slot, Some(Slot::Entry(_))));
                    Compute::Keep
                }
            })?;

        if put {
            self.statistics.record_put();
            self.metrics.region_put.increase(1);
        } else if stale {
            tracing::debug!(
                "[region]: region {} dropped stale put from load of {key} at {tx_ts}",
                self.name
            );
            self.metrics.region_stale.increase(1);
        }
        Ok(put)
    }

    fn acquire(
        &self,
        key: &CacheKey,
        owner: LockOwner,
        version: Option<Version>,
        proposed: Option<Option<&Version>>,
    ) -> Result<Option<LockHandle>> {
        self.ensure_open()?;
        let now = self.clock.now();
        let timeout = self.lock_timeout;

        let mut handle = None;
        self.backend
            .compute(&self.name, key, Propagation::Invalidate(now), &mut |slot| {
                let lock = match slot {
                    Some(Slot::Entry(cached))
                        if proposed.is_some_and(|proposed| !Version::supersedes(proposed, cached.version())) =>
                    {
                        return Compute::Keep;
                    }
                    Some(Slot::Locked(lock)) if !lock.is_expired(now) => {
                        let mut lock = lock.clone();
                        lock.reenter(now, timeout);
                        lock
                    }
                    Some(Slot::Locked(expired)) => {
                        tracing::debug!(
                            "[region]: region {} replaces soft lock {} on {key} expired at {}",
                            self.name,
                            expired.id(),
                            expired.timeout_at()
                        );
                        SoftLock::new(owner, now, timeout, newest(version, expired.version().copied()))
                    }
                    Some(Slot::Entry(cached)) => SoftLock::new(owner, now, timeout, newest(version, cached.version().copied())),
                    Some(Slot::Fenced(fence)) => SoftLock::new(owner, now, timeout, newest(version, fence.version)),
                    None => SoftLock::new(owner, now, timeout, version),
                };
                tracing::trace!(
                    "[region]: region {} soft-locked {key} with {}, multiplicity {}",
                    self.name,
                    lock.id(),
                    lock.multiplicity()
                );
                handle = Some(LockHandle::new(key.clone(), lock.id()));
                Compute::Set(Slot::Locked(lock))
            })?;

        match handle {
            Some(_) => self.metrics.region_lock.increase(1),
            None => {
                tracing::debug!("[region]: region {} refused stale write lock on {key}", self.name);
                self.metrics.region_stale.increase(1);
            }
        }
        Ok(handle)
    }

    /// Soft-lock `key` for a writer that saw `version`.
    ///
    /// Re-entrant: if an unexpired lock exists, its multiplicity is incremented and the same lock id is returned. An
    /// expired lock is replaced by a fresh one. Never blocks.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "hibernal::region::lock"))]
    pub fn lock(&self, key: &CacheKey, owner: LockOwner, version: Option<Version>) -> Result<LockHandle> {
        self.acquire(key, owner, version, None)?.ok_or_else(|| {
            Error::new(ErrorKind::IllegalLockState, "soft lock was not recorded")
                .with_context("region", &self.name)
                .with_context("key", key)
        })
    }

    /// Soft-lock `key` unless it caches a version that `proposed` does not supersede.
    ///
    /// Returns `None` when the write is stale, leaving the cached entry in place.
    pub fn lock_if_newer(
        &self,
        key: &CacheKey,
        owner: LockOwner,
        previous: Option<Version>,
        proposed: Option<&Version>,
    ) -> Result<Option<LockHandle>> {
        self.acquire(key, owner, previous, Some(proposed))
    }

    /// Release one hold on a soft lock.
    ///
    /// When the last hold is released, the key is fenced at the current time on this node and invalidated on every
    /// other node. A handle that does not match the recorded lock fails with [`ErrorKind::IllegalLockState`] and leaves
    /// the key unreadable.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "hibernal::region::unlock"))]
    pub fn unlock(&self, handle: &LockHandle) -> Result<()> {
        self.ensure_open()?;
        let now = self.clock.now();

        let mut outcome = Ok(Release::Held);
        self.backend
            .compute(&self.name, handle.key(), Propagation::Invalidate(now), &mut |slot| match slot {
                Some(Slot::Locked(lock)) if lock.id() == handle.id() => {
                    let mut lock = lock.clone();
                    let release = lock.release(now);
                    outcome = Ok(release);
                    match release {
                        Release::Held => Compute::Set(Slot::Locked(lock)),
                        Release::Unlocked => Compute::Set(Slot::Fenced(Fence {
                            unlocked_at: now,
                            version: lock.version().copied(),
                        })),
                    }
                }
                other => {
                    outcome = Err(lock_state_error(handle, other));
                    force_absent(other, now)
                }
            })?;

        match outcome {
            Ok(release) => {
                tracing::trace!(
                    "[region]: region {} released {} on {}, {release:?}",
                    self.name,
                    handle.id(),
                    handle.key()
                );
                self.metrics.region_unlock.increase(1);
                Ok(())
            }
            Err(e) => Err(self.illegal_lock(handle, e)),
        }
    }

    /// Release one hold on a soft lock after the holder wrote `entry` to the database.
    ///
    /// `entry` is published only if the lock was never held concurrently, this release is the last one and `version`
    /// supersedes the version the lock replaced. Otherwise the release behaves like [`Region::unlock`]: which writer
    /// won cannot be known, so the key is left unreadable rather than risk caching a loser's state.
    ///
    /// Returns `true` if the entry was published.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "hibernal::region::release_with_entry"))]
    pub fn release_with_entry(&self, handle: &LockHandle, entry: CacheEntry, version: Option<Version>) -> Result<bool> {
        self.ensure_open()?;
        let now = self.clock.now();
        let entry = entry.versioned(version);
        let invalidating = self.is_invalidating()?;

        let mut outcome = Ok(Release::Held);
        let mut published = false;
        let mut stale = false;
        self.backend
            .compute(&self.name, handle.key(), Propagation::Invalidate(now), &mut |slot| match slot {
                Some(Slot::Locked(lock)) if lock.id() == handle.id() => {
                    let mut lock = lock.clone();
                    let release = lock.release(now);
                    outcome = Ok(release);
                    match release {
                        Release::Held => Compute::Set(Slot::Locked(lock)),
                        Release::Unlocked
                            if !lock.is_concurrent()
                                && !invalidating
                                && Version::supersedes(entry.version(), lock.version()) =>
                        {
                            published = true;
                            Compute::Set(Slot::Entry(entry.clone()))
                        }
                        Release::Unlocked => {
                            stale = !lock.is_concurrent() && !invalidating;
                            Compute::Set(Slot::Fenced(Fence {
                                unlocked_at: now,
                                version: lock.version().copied(),
                            }))
                        }
                    }
                }
                other => {
                    outcome = Err(lock_state_error(handle, other));
                    force_absent(other, now)
                }
            })?;

        if let Err(e) = outcome {
            return Err(self.illegal_lock(handle, e));
        }

        self.metrics.region_unlock.increase(1);
        if published {
            self.statistics.record_put();
            self.metrics.region_put.increase(1);
        } else if stale {
            tracing::debug!(
                "[region]: region {} dropped stale update of {}, version {:?}",
                self.name,
                handle.key(),
                entry.version()
            );
            self.metrics.region_stale.increase(1);
        } else {
            tracing::debug!(
                "[region]: region {} did not cache update of {}, lock was held concurrently",
                self.name,
                handle.key()
            );
        }
        Ok(published)
    }

    /// Cache a freshly inserted entry, only if the key holds nothing readable or locked.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "hibernal::region::insert_if_absent"))]
    pub fn insert_if_absent(&self, key: &CacheKey, entry: CacheEntry) -> Result<bool> {
        self.ensure_open()?;
        if self.is_invalidating()? {
            return Ok(false);
        }
        let now = self.clock.now();
        let inserted = self
            .backend
            .compute(&self.name, key, Propagation::Invalidate(now), &mut |slot| match slot {
                None | Some(Slot::Fenced(_)) => Compute::Set(Slot::Entry(entry.clone())),
                Some(Slot::Entry(_)) | Some(Slot::Locked(_)) => Compute::Keep,
            })?;
        if inserted {
            self.statistics.record_put();
            self.metrics.region_put.increase(1);
        }
        Ok(inserted)
    }

    /// Make `key` unreadable, keeping any soft lock on it intact.
    ///
    /// Loads that started before now are fenced off.
    pub fn remove(&self, key: &CacheKey) -> Result<()> {
        self.ensure_open()?;
        let now = self.clock.now();
        self.backend
            .compute(&self.name, key, Propagation::Invalidate(now), &mut |slot| match slot {
                Some(Slot::Locked(_)) => Compute::Keep,
                Some(Slot::Entry(cached)) => Compute::Set(Slot::Fenced(Fence {
                    unlocked_at: now,
                    version: cached.version().copied(),
                })),
                _ => Compute::Set(Slot::Fenced(Fence {
                    unlocked_at: now,
                    version: None,
                })),
            })?;
        Ok(())
    }

    /// Forcibly drop whatever `key` holds, soft locks included.
    pub fn evict(&self, key: &CacheKey) -> Result<()> {
        self.ensure_open()?;
        let now = self.clock.now();
        self.backend
            .compute(&self.name, key, Propagation::Invalidate(now), &mut |_| Compute::Remove)?;
        self.metrics.region_evict.increase(1);
        Ok(())
    }

    /// Forcibly drop every key of the region.
    pub fn evict_all(&self) -> Result<()> {
        self.ensure_open()?;
        let now = self.clock.now();
        self.backend.clear(&self.name, Propagation::Invalidate(now))?;
        self.metrics.region_evict.increase(1);
        tracing::debug!("[region]: region {} evicted", self.name);
        Ok(())
    }

    /// Invalidate the whole region for a bulk operation.
    ///
    /// Until [`Region::unlock_all`], reads miss and nothing is cached on any node of the cluster. Taking the lock
    /// again while it is held returns the same lock.
    pub fn lock_all(&self) -> Result<RegionLock> {
        self.ensure_open()?;
        let mut holder = self.region_lock.lock();
        let id = match *holder {
            Some(id) => {
                let now = self.clock.now();
                self.backend.clear(&self.name, Propagation::Invalidate(now))?;
                id
            }
            None => {
                let id = LockId::next();
                self.backend.begin_invalidation(&self.name)?;
                *holder = Some(id);
                id
            }
        };
        tracing::debug!("[region]: region {} invalidated by {id}", self.name);
        Ok(RegionLock::new(id))
    }

    /// Release the region-wide lock.
    ///
    /// Loads whose transaction started before now stay fenced off on every node of the cluster.
    pub fn unlock_all(&self, lock: &RegionLock) -> Result<()> {
        self.ensure_open()?;
        let mut holder = self.region_lock.lock();
        if *holder != Some(lock.id()) {
            drop(holder);
            self.metrics.region_illegal_lock.increase(1);
            return Err(Error::new(ErrorKind::IllegalLockState, "region lock handle rejected")
                .with_context("region", &self.name)
                .with_source(LockStateError::RegionNotLocked { presented: lock.id() }));
        }
        let now = self.clock.now();
        self.backend.end_invalidation(&self.name, now)?;
        *holder = None;
        tracing::debug!("[region]: region {} released by {}", self.name, lock.id());
        Ok(())
    }

    /// Release the backend resources of the region.
    ///
    /// Idempotent. Every later operation fails with [`ErrorKind::Closed`].
    pub fn destroy(&self) -> Result<()> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.backend.stop_region(&self.name)?;
        tracing::info!("[region]: region {} destroyed", self.name);
        Ok(())
    }

    /// Counters of the region as seen by this node.
    pub fn statistics(&self) -> Result<RegionStatistics> {
        self.ensure_open()?;
        let element_count = self
            .backend
            .snapshot(&self.name)?
            .iter()
            .filter(|(_, slot)| slot.entry().is_some())
            .count() as u64;
        self.metrics.region_entries.absolute(element_count);
        Ok(self.statistics.snapshot(element_count))
    }

    /// Copy out every readable entry of the region.
    pub fn entries(&self) -> Result<HashMap<CacheKey, CacheEntry>> {
        self.ensure_open()?;
        let entries = self
            .backend
            .snapshot(&self.name)?
            .into_iter()
            .filter_map(|(key, slot)| match slot {
                Slot::Entry(entry) => Some((key, entry)),
                _ => None,
            })
            .collect();
        Ok(entries)
    }
}
