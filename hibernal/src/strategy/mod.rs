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

mod nonstrict;
mod read_only;
mod read_write;
mod transactional;

use std::{fmt::Debug, sync::Arc};

use hibernal_common::{
    entry::{CacheEntry, Version},
    error::Result,
    key::CacheKey,
};
use hibernal_region::{
    lock::{LockHandle, RegionLock},
    region::Region,
};

pub use self::{
    nonstrict::NonstrictReadWriteAccess, read_only::ReadOnlyAccess, read_write::ReadWriteAccess,
    transactional::TransactionalAccess,
};
use crate::{access::AccessType, guard::SoftLockGuard, transaction::Transaction};

/// Swallow a backend outage, logging it and answering with `fallback`. Every other error is propagated.
pub(crate) fn absorb<T>(region: &Region, op: &'static str, result: Result<T>, fallback: T) -> Result<T> {
    match result {
        Err(e) if e.is_backend_unavailable() => {
            tracing::warn!(
                "[strategy]: region {} {op} skipped, backend unavailable: {e}",
                region.name()
            );
            Ok(fallback)
        }
        result => result,
    }
}

/// The contract every concurrency strategy fulfils on top of a [`Region`].
///
/// Reads, puts-from-load, evictions and region locks behave the same for every strategy and come with default
/// implementations. Backend outages are absorbed: reads miss and writes report `false`.
pub trait RegionAccess: Send + Sync + 'static + Debug {
    /// The region the strategy works on.
    fn region(&self) -> &Arc<Region>;

    /// Access type implemented by the strategy.
    fn access_type(&self) -> AccessType;

    /// Read the entry cached for `key`.
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        absorb(self.region(), "get", self.region().get(key), None)
    }

    /// Cache state loaded from the database inside `tx`.
    fn put_from_load(
        &self,
        tx: &Transaction,
        key: &CacheKey,
        entry: CacheEntry,
        version: Option<Version>,
        minimal_put: bool,
    ) -> Result<bool> {
        let region = self.region();
        absorb(
            region,
            "put from load",
            region.put_from_load(key, entry, tx.timestamp(), version, minimal_put),
            false,
        )
    }

    /// Prepare `key` for an update or delete by `tx`.
    fn lock_item(&self, tx: &Transaction, key: &CacheKey, version: Option<Version>) -> Result<Option<LockHandle>>;

    /// Give up a lock taken with [`RegionAccess::lock_item`] without publishing anything.
    fn unlock_item(&self, key: &CacheKey, handle: Option<LockHandle>) -> Result<()>;

    /// Called while `tx` inserts a new entity. Returns `true` if the cache took part in the insert.
    fn insert(&self, tx: &Transaction, key: &CacheKey, entry: CacheEntry, version: Option<Version>) -> Result<bool>;

    /// Called after the insert committed. Returns `true` if the entry was cached.
    fn after_insert(&self, key: &CacheKey, entry: CacheEntry, version: Option<Version>) -> Result<bool>;

    /// Called while `tx` updates an entity. Returns `true` if the cache took part in the update.
    fn update(
        &self,
        tx: &Transaction,
        key: &CacheKey,
        entry: CacheEntry,
        current: Option<Version>,
        previous: Option<Version>,
    ) -> Result<bool>;

    /// Called after the update committed. Returns `true` if the entry was cached.
    fn after_update(
        &self,
        key: &CacheKey,
        entry: CacheEntry,
        current: Option<Version>,
        previous: Option<Version>,
        handle: Option<LockHandle>,
    ) -> Result<bool>;

    /// Called while `tx` deletes an entity.
    fn remove(&self, tx: &Transaction, key: &CacheKey) -> Result<()>;

    /// Drop every entry of the region.
    fn remove_all(&self) -> Result<()> {
        self.evict_all()
    }

    /// Forcibly drop `key`.
    fn evict(&self, key: &CacheKey) -> Result<()> {
        absorb(self.region(), "evict", self.region().evict(key), ())
    }

    /// Forcibly drop every key.
    fn evict_all(&self) -> Result<()> {
        absorb(self.region(), "evict all", self.region().evict_all(), ())
    }

    /// Invalidate the whole region for a bulk operation.
    fn lock_region(&self) -> Result<RegionLock> {
        self.region().lock_all()
    }

    /// End a bulk operation.
    fn unlock_region(&self, lock: &RegionLock) -> Result<()> {
        self.region().unlock_all(lock)
    }
}

/// A concurrency strategy bound to a region.
///
/// Cloning is cheap, every clone works on the same region.
#[derive(Clone)]
pub enum AccessStrategy {
    /// See [`ReadOnlyAccess`].
    ReadOnly(Arc<ReadOnlyAccess>),
    /// See [`NonstrictReadWriteAccess`].
    NonstrictReadWrite(Arc<NonstrictReadWriteAccess>),
    /// See [`ReadWriteAccess`].
    ReadWrite(Arc<ReadWriteAccess>),
    /// See [`TransactionalAccess`].
    Transactional(Arc<TransactionalAccess>),
}

impl Debug for AccessStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadOnly(s) => f.debug_tuple("AccessStrategy::ReadOnly").field(&s.region().name()).finish(),
            Self::NonstrictReadWrite(s) => f
                .debug_tuple("AccessStrategy::NonstrictReadWrite")
                .field(&s.region().name())
                .finish(),
            Self::ReadWrite(s) => f.debug_tuple("AccessStrategy::ReadWrite").field(&s.region().name()).finish(),
            Self::Transactional(s) => f
                .debug_tuple("AccessStrategy::Transactional")
                .field(&s.region().name())
                .finish(),
        }
    }
}

impl AccessStrategy {
    /// Build the strategy for `access` over `region`.
    pub fn new(access: AccessType, region: Arc<Region>) -> Self {
        match access {
            AccessType::ReadOnly => Self::ReadOnly(Arc::new(ReadOnlyAccess::new(region))),
            AccessType::NonstrictReadWrite => Self::NonstrictReadWrite(Arc::new(NonstrictReadWriteAccess::new(region))),
            AccessType::ReadWrite => Self::ReadWrite(Arc::new(ReadWriteAccess::new(region))),
            AccessType::Transactional => Self::Transactional(Arc::new(TransactionalAccess::new(region))),
        }
    }

    fn access(&self) -> &dyn RegionAccess {
        match self {
            Self::ReadOnly(s) => s.as_ref(),
            Self::NonstrictReadWrite(s) => s.as_ref(),
            Self::ReadWrite(s) => s.as_ref(),
            Self::Transactional(s) => s.as_ref(),
        }
    }

    /// Access type of the strategy.
    pub fn access_type(&self) -> AccessType {
        self.access().access_type()
    }

    /// The region the strategy works on.
    pub fn region(&self) -> &Arc<Region> {
        self.access().region()
    }

    /// Read the entry cached for `key`. Locked keys and backend outages read as a miss.
    pub fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        self.access().get(key)
    }

    /// Cache state loaded from the database inside `tx`.
    ///
    /// With `minimal_put`, an already cached entry is never replaced.
    pub fn put_from_load(
        &self,
        tx: &Transaction,
        key: &CacheKey,
        entry: CacheEntry,
        version: Option<Version>,
        minimal_put: bool,
    ) -> Result<bool> {
        self.access().put_from_load(tx, key, entry, version, minimal_put)
    }

    /// Prepare `key` for an update or delete by `tx`.
    ///
    /// Returns the lock to hand back to [`AccessStrategy::after_update`] or [`AccessStrategy::unlock_item`]. Only
    /// strategies that soft-lock return one.
    pub fn lock_item(&self, tx: &Transaction, key: &CacheKey, version: Option<Version>) -> Result<Option<LockHandle>> {
        self.access().lock_item(tx, key, version)
    }

    /// Like [`AccessStrategy::lock_item`], but the lock is released when the guard drops.
    pub fn lock_scoped(&self, tx: &Transaction, key: &CacheKey, version: Option<Version>) -> Result<SoftLockGuard> {
        let handle = self.lock_item(tx, key, version)?;
        Ok(SoftLockGuard::new(self.clone(), key.clone(), handle))
    }

    /// Give up a lock taken with [`AccessStrategy::lock_item`], e.g. on rollback.
    pub fn unlock_item(&self, key: &CacheKey, handle: Option<LockHandle>) -> Result<()> {
        self.access().unlock_item(key, handle)
    }

    /// Called while `tx` inserts a new entity.
    pub fn insert(&self, tx: &Transaction, key: &CacheKey, entry: CacheEntry, version: Option<Version>) -> Result<bool> {
        self.access().insert(tx, key, entry, version)
    }

    /// Called after the insert committed. Returns `true` if the entry was cached.
    pub fn after_insert(&self, key: &CacheKey, entry: CacheEntry, version: Option<Version>) -> Result<bool> {
        self.access().after_insert(key, entry, version)
    }

    /// Called while `tx` updates an entity from `previous` to `current`.
    pub fn update(
        &self,
        tx: &Transaction,
        key: &CacheKey,
        entry: CacheEntry,
        current: Option<Version>,
        previous: Option<Version>,
    ) -> Result<bool> {
        self.access().update(tx, key, entry, current, previous)
    }

    /// Called after the update committed, with the lock returned by [`AccessStrategy::lock_item`].
    pub fn after_update(
        &self,
        key: &CacheKey,
        entry: CacheEntry,
        current: Option<Version>,
        previous: Option<Version>,
        handle: Option<LockHandle>,
    ) -> Result<bool> {
        self.access().after_update(key, entry, current, previous, handle)
    }

    /// Called while `tx` deletes an entity.
    pub fn remove(&self, tx: &Transaction, key: &CacheKey) -> Result<()> {
        self.access().remove(tx, key)
    }

    /// Drop every entry of the region.
    pub fn remove_all(&self) -> Result<()> {
        self.access().remove_all()
    }

    /// Forcibly drop `key`, whoever holds it.
    pub fn evict(&self, key: &CacheKey) -> Result<()> {
        self.access().evict(key)
    }

    /// Forcibly drop every key.
    pub fn evict_all(&self) -> Result<()> {
        self.access().evict_all()
    }

    /// Invalidate the whole region for a bulk operation.
    pub fn lock_region(&self) -> Result<RegionLock> {
        self.access().lock_region()
    }

    /// End a bulk operation.
    pub fn unlock_region(&self, lock: &RegionLock) -> Result<()> {
        self.access().unlock_region(lock)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hibernal_common::{
        clock::{ManualClock, Timestamp},
        error::ErrorKind,
        metrics::Metrics,
    };
    use hibernal_region::{
        backend::Backend,
        local::LocalBackend,
        region::{Region, RegionConfig},
        test_utils::FlakyBackend,
    };

    use super::*;

    fn is_send_sync_static<T: Send + Sync + 'static>() {}

    #[test]
    fn test_send_sync_static() {
        is_send_sync_static::<AccessStrategy>();
        is_send_sync_static::<SoftLockGuard>();
    }

    fn strategy_with(access: AccessType, backend: Arc<dyn Backend>) -> (AccessStrategy, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Timestamp::from_millis(1000)));
        let region = Region::open(RegionConfig {
            name: format!("hibernate.test.{access}"),
            lock_timeout: Duration::from_secs(60),
            backend,
            clock: clock.clone(),
            metrics: Arc::new(Metrics::noop()),
        })
        .unwrap();
        (AccessStrategy::new(access, Arc::new(region)), clock)
    }

    fn strategy(access: AccessType) -> (AccessStrategy, Arc<ManualClock>) {
        strategy_with(access, Arc::new(LocalBackend::new(4)))
    }

    fn key(id: i64) -> CacheKey {
        CacheKey::new("Person", id)
    }

    fn person(name: &str) -> CacheEntry {
        CacheEntry::entity([name])
    }

    fn v(version: i64) -> Option<Version> {
        Some(Version::from(version))
    }

    fn name_of(entry: Option<CacheEntry>) -> Option<String> {
        entry.and_then(|entry| match entry.values() {
            Some([hibernal_common::entry::Datum::Text(name)]) => Some(name.to_string()),
            _ => None,
        })
    }

    #[test_log::test]
    fn test_read_write_update_flow() {
        let (strategy, clock) = strategy(AccessType::ReadWrite);
        assert_eq!(strategy.access_type(), AccessType::ReadWrite);

        let tx = Transaction::begin(clock.as_ref());
        assert!(strategy.put_from_load(&tx, &key(1), person("Alice"), v(1), false).unwrap());
        assert_eq!(name_of(strategy.get(&key(1)).unwrap()), Some("Alice".to_string()));

        let writer = Transaction::begin(clock.as_ref());
        let handle = strategy.lock_item(&writer, &key(1), v(1)).unwrap();
        assert!(handle.is_some());
        assert_eq!(strategy.get(&key(1)).unwrap(), None);

        // A load racing with the writer must not cache the state it read.
        let loader = Transaction::begin(clock.as_ref());
        assert!(!strategy.put_from_load(&loader, &key(1), person("Alice"), v(1), false).unwrap());

        assert!(!strategy.update(&writer, &key(1), person("Bob"), v(2), v(1)).unwrap());
        assert!(strategy.after_update(&key(1), person("Bob"), v(2), v(1), handle).unwrap());
        writer.commit().unwrap();
        assert_eq!(name_of(strategy.get(&key(1)).unwrap()), Some("Bob".to_string()));

        assert!(!strategy.put_from_load(&loader, &key(1), person("Alice"), v(1), false).unwrap());
        assert_eq!(name_of(strategy.get(&key(1)).unwrap()), Some("Bob".to_string()));
    }

    #[test_log::test]
    fn test_read_write_concurrent_writers() {
        let (strategy, clock) = strategy(AccessType::ReadWrite);
        let tx = Transaction::begin(clock.as_ref());
        strategy.put_from_load(&tx, &key(1), person("Alice"), v(1), false).unwrap();

        let w1 = Transaction::begin(clock.as_ref());
        let w2 = Transaction::begin(clock.as_ref());
        let h1 = strategy.lock_item(&w1, &key(1), v(1)).unwrap();
        let h2 = strategy.lock_item(&w2, &key(1), v(1)).unwrap();
        assert_eq!(h1, h2);

        let loader = Transaction::begin(clock.as_ref());
        assert!(!strategy.after_update(&key(1), person("Bob"), v(2), v(1), h1).unwrap());
        assert!(!strategy.after_update(&key(1), person("Carol"), v(2), v(1), h2).unwrap());
        assert_eq!(strategy.get(&key(1)).unwrap(), None);

        assert!(!strategy.put_from_load(&loader, &key(1), person("Alice"), v(1), false).unwrap());
        let fresh = Transaction::begin(clock.as_ref());
        assert!(strategy.put_from_load(&fresh, &key(1), person("Carol"), v(2), false).unwrap());
    }

    #[test_log::test]
    fn test_read_write_unlock_and_remove() {
        let (strategy, clock) = strategy(AccessType::ReadWrite);
        let tx = Transaction::begin(clock.as_ref());
        strategy.put_from_load(&tx, &key(1), person("Alice"), v(1), false).unwrap();

        let writer = Transaction::begin(clock.as_ref());
        let handle = strategy.lock_item(&writer, &key(1), v(1)).unwrap();
        strategy.unlock_item(&key(1), handle).unwrap();
        writer.rollback().unwrap();
        assert_eq!(strategy.get(&key(1)).unwrap(), None);

        let tx = Transaction::begin(clock.as_ref());
        assert!(strategy.put_from_load(&tx, &key(1), person("Alice"), v(1), false).unwrap());

        let loader = Transaction::begin(clock.as_ref());
        let deleter = Transaction::begin(clock.as_ref());
        strategy.remove(&deleter, &key(1)).unwrap();
        assert_eq!(strategy.get(&key(1)).unwrap(), None);
        assert!(!strategy.put_from_load(&loader, &key(1), person("Alice"), v(1), false).unwrap());

        // Releasing a lock twice is a protocol violation.
        let writer = Transaction::begin(clock.as_ref());
        let handle = strategy.lock_item(&writer, &key(2), None).unwrap();
        strategy.unlock_item(&key(2), handle.clone()).unwrap();
        assert_eq!(
            strategy.unlock_item(&key(2), handle).unwrap_err().kind(),
            ErrorKind::IllegalLockState
        );
    }

    #[test_log::test]
    fn test_after_insert() {
        for access in [AccessType::ReadOnly, AccessType::ReadWrite] {
            let (strategy, clock) = strategy(access);
            let tx = Transaction::begin(clock.as_ref());
            assert!(!strategy.insert(&tx, &key(1), person("Alice"), v(1)).unwrap());
            tx.commit().unwrap();
            assert!(strategy.after_insert(&key(1), person("Alice"), v(1)).unwrap());
            assert!(!strategy.after_insert(&key(1), person("Eve"), v(1)).unwrap());
            assert_eq!(name_of(strategy.get(&key(1)).unwrap()), Some("Alice".to_string()));
        }

        let (strategy, clock) = strategy(AccessType::NonstrictReadWrite);
        let tx = Transaction::begin(clock.as_ref());
        assert!(!strategy.insert(&tx, &key(1), person("Alice"), v(1)).unwrap());
        assert!(!strategy.after_insert(&key(1), person("Alice"), v(1)).unwrap());
        assert_eq!(strategy.get(&key(1)).unwrap(), None);
    }

    #[test_log::test]
    fn test_read_only() {
        let (strategy, clock) = strategy(AccessType::ReadOnly);
        let tx = Transaction::begin(clock.as_ref());
        assert_eq!(strategy.lock_item(&tx, &key(1), None).unwrap(), None);
        assert!(!strategy.update(&tx, &key(1), person("Alice"), v(2), v(1)).unwrap());

        assert!(strategy.put_from_load(&tx, &key(1), person("Alice"), v(1), false).unwrap());
        let err = strategy.update(&tx, &key(1), person("Bob"), v(2), v(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        let err = strategy
            .after_update(&key(1), person("Bob"), v(2), v(1), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert_eq!(name_of(strategy.get(&key(1)).unwrap()), Some("Alice".to_string()));

        // Declaring write intent on a cached entry is refused as well.
        let err = strategy.lock_item(&tx, &key(1), v(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert_eq!(strategy.lock_scoped(&tx, &key(1), v(1)).unwrap_err().kind(), ErrorKind::Unsupported);
        assert_eq!(name_of(strategy.get(&key(1)).unwrap()), Some("Alice".to_string()));

        strategy.remove(&tx, &key(1)).unwrap();
        assert_eq!(strategy.get(&key(1)).unwrap(), None);
    }

    #[test_log::test]
    fn test_nonstrict_read_write() {
        let (strategy, clock) = strategy(AccessType::NonstrictReadWrite);
        let tx = Transaction::begin(clock.as_ref());
        assert!(strategy.put_from_load(&tx, &key(1), person("Alice"), v(1), false).unwrap());
        assert_eq!(strategy.lock_item(&tx, &key(1), v(1)).unwrap(), None);

        assert!(!strategy.update(&tx, &key(1), person("Bob"), v(2), v(1)).unwrap());
        assert_eq!(strategy.get(&key(1)).unwrap(), None);

        let tx = Transaction::begin(clock.as_ref());
        assert!(strategy.put_from_load(&tx, &key(1), person("Alice"), v(1), false).unwrap());
        assert!(!strategy.after_update(&key(1), person("Bob"), v(2), v(1), None).unwrap());
        assert_eq!(strategy.get(&key(1)).unwrap(), None);

        let tx = Transaction::begin(clock.as_ref());
        assert!(strategy.put_from_load(&tx, &key(1), person("Bob"), v(2), false).unwrap());
        strategy.unlock_item(&key(1), None).unwrap();
        assert_eq!(strategy.get(&key(1)).unwrap(), None);
    }

    #[test_log::test]
    fn test_transactional() {
        let (strategy, clock) = strategy(AccessType::Transactional);

        let tx = Transaction::begin(clock.as_ref());
        assert!(strategy.insert(&tx, &key(1), person("Alice"), v(1)).unwrap());
        assert_eq!(strategy.get(&key(1)).unwrap(), None);
        tx.commit().unwrap();
        assert_eq!(name_of(strategy.get(&key(1)).unwrap()), Some("Alice".to_string()));

        // An update older than the cached state is dropped and the entry stays.
        let tx = Transaction::begin(clock.as_ref());
        assert!(!strategy.update(&tx, &key(1), person("Mallory"), v(0), v(1)).unwrap());
        tx.commit().unwrap();
        assert_eq!(name_of(strategy.get(&key(1)).unwrap()), Some("Alice".to_string()));

        let tx = Transaction::begin(clock.as_ref());
        assert!(strategy.update(&tx, &key(1), person("Bob"), v(2), v(1)).unwrap());
        assert_eq!(strategy.get(&key(1)).unwrap(), None);
        tx.rollback().unwrap();
        assert_eq!(strategy.get(&key(1)).unwrap(), None);

        let tx = Transaction::begin(clock.as_ref());
        assert!(strategy.put_from_load(&tx, &key(1), person("Alice"), v(1), false).unwrap());
        drop(tx);

        let tx = Transaction::begin(clock.as_ref());
        assert!(strategy.update(&tx, &key(1), person("Bob"), v(2), v(1)).unwrap());
        tx.commit().unwrap();
        assert_eq!(name_of(strategy.get(&key(1)).unwrap()), Some("Bob".to_string()));

        let tx = Transaction::begin(clock.as_ref());
        strategy.remove(&tx, &key(1)).unwrap();
        tx.commit().unwrap();
        assert_eq!(strategy.get(&key(1)).unwrap(), None);
    }

    #[test_log::test]
    fn test_transactional_drop_rolls_back() {
        let (strategy, clock) = strategy(AccessType::Transactional);
        {
            let tx = Transaction::begin(clock.as_ref());
            assert!(strategy.insert(&tx, &key(1), person("Alice"), v(1)).unwrap());
        }
        assert_eq!(strategy.get(&key(1)).unwrap(), None);

        // The lock is gone: the next insert publishes on its own.
        let tx = Transaction::begin(clock.as_ref());
        assert!(strategy.insert(&tx, &key(1), person("Alice"), v(1)).unwrap());
        tx.commit().unwrap();
        assert_eq!(name_of(strategy.get(&key(1)).unwrap()), Some("Alice".to_string()));
    }

    #[test_log::test]
    fn test_guard() {
        let (strategy, clock) = strategy(AccessType::ReadWrite);
        let tx = Transaction::begin(clock.as_ref());
        strategy.put_from_load(&tx, &key(1), person("Alice"), v(1), false).unwrap();

        let writer = Transaction::begin(clock.as_ref());
        {
            let guard = strategy.lock_scoped(&writer, &key(1), v(1)).unwrap();
            assert_eq!(guard.key(), &key(1));
            assert!(guard.handle().is_some());
            assert_eq!(strategy.get(&key(1)).unwrap(), None);
        }

        // Had the dropped guard leaked its hold, this lock would be concurrent and nothing would be published.
        let guard = strategy.lock_scoped(&writer, &key(1), v(1)).unwrap();
        assert!(guard.after_update(person("Bob"), v(2), v(1)).unwrap());
        assert_eq!(name_of(strategy.get(&key(1)).unwrap()), Some("Bob".to_string()));

        let guard = strategy.lock_scoped(&writer, &key(1), v(2)).unwrap();
        guard.unlock().unwrap();
        assert_eq!(strategy.get(&key(1)).unwrap(), None);
    }

    #[test_log::test]
    fn test_lock_region() {
        let (strategy, clock) = strategy(AccessType::ReadWrite);
        let tx = Transaction::begin(clock.as_ref());
        strategy.put_from_load(&tx, &key(1), person("Alice"), v(1), false).unwrap();

        let loader = Transaction::begin(clock.as_ref());
        let lock = strategy.lock_region().unwrap();
        assert_eq!(strategy.get(&key(1)).unwrap(), None);
        assert!(!strategy.put_from_load(&loader, &key(1), person("Alice"), v(1), false).unwrap());

        strategy.unlock_region(&lock).unwrap();
        assert!(!strategy.put_from_load(&loader, &key(1), person("Alice"), v(1), false).unwrap());
        let fresh = Transaction::begin(clock.as_ref());
        assert!(strategy.put_from_load(&fresh, &key(1), person("Alice"), v(1), false).unwrap());

        strategy.remove_all().unwrap();
        assert_eq!(strategy.get(&key(1)).unwrap(), None);
    }

    #[test_log::test]
    fn test_backend_outage_is_absorbed() {
        for access in [
            AccessType::ReadOnly,
            AccessType::NonstrictReadWrite,
            AccessType::ReadWrite,
            AccessType::Transactional,
        ] {
            let flaky = Arc::new(FlakyBackend::new(Arc::new(LocalBackend::new(4))));
            let (strategy, clock) = strategy_with(access, flaky.clone());
            let tx = Transaction::begin(clock.as_ref());
            strategy.put_from_load(&tx, &key(1), person("Alice"), v(1), false).unwrap();

            flaky.set_available(false);
            let tx = Transaction::begin(clock.as_ref());
            assert_eq!(strategy.get(&key(1)).unwrap(), None);
            assert!(!strategy.put_from_load(&tx, &key(2), person("Bob"), v(1), false).unwrap());
            assert_eq!(strategy.lock_item(&tx, &key(2), v(1)).unwrap(), None);
            assert!(!strategy.insert(&tx, &key(3), person("Carol"), v(1)).unwrap());
            assert!(!strategy.after_insert(&key(3), person("Carol"), v(1)).unwrap());
            strategy.remove(&tx, &key(2)).unwrap();
            strategy.evict(&key(2)).unwrap();
            strategy.evict_all().unwrap();
            tx.commit().unwrap();

            flaky.set_available(true);
            assert_eq!(name_of(strategy.get(&key(1)).unwrap()), Some("Alice".to_string()));
        }
    }
}
