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

use std::sync::Arc;

use hibernal_common::{
    entry::{CacheEntry, Version},
    error::Result,
    key::CacheKey,
};
use hibernal_region::{lock::LockHandle, region::Region};

use super::{absorb, RegionAccess};
use crate::{
    access::AccessType,
    transaction::{Outcome, Transaction},
};

/// Strategy whose writes take part in the transaction.
///
/// Inserts, updates and deletes soft-lock the key on behalf of the transaction right away. Commit publishes the new
/// state and rollback releases the lock, both through a hook registered on the [`Transaction`]. Updates that carry a
/// version not newer than the cached one are dropped up front and leave the cached entry untouched.
#[derive(Debug)]
pub struct TransactionalAccess {
    region: Arc<Region>,
}

impl TransactionalAccess {
    pub(crate) fn new(region: Arc<Region>) -> Self {
        Self { region }
    }

    /// Publish `entry` when `tx` commits, release the lock when it rolls back.
    fn complete_with(&self, tx: &Transaction, handle: LockHandle, entry: Option<(CacheEntry, Option<Version>)>) {
        let region = self.region.clone();
        tx.register(move |outcome: Outcome| -> Result<()> {
            let completed = match (outcome, entry) {
                (Outcome::Committed, Some((entry, version))) => region.release_with_entry(&handle, entry, version).map(|_| ()),
                _ => region.unlock(&handle),
            };
            absorb(&region, "complete transaction", completed, ())
        });
    }
}

impl RegionAccess for TransactionalAccess {
    fn region(&self) -> &Arc<Region> {
        &self.region
    }

    fn access_type(&self) -> AccessType {
        AccessType::Transactional
    }

    fn lock_item(&self, _: &Transaction, _: &CacheKey, _: Option<Version>) -> Result<Option<LockHandle>> {
        Ok(None)
    }

    fn unlock_item(&self, _: &CacheKey, handle: Option<LockHandle>) -> Result<()> {
        match handle {
            Some(handle) => absorb(&self.region, "unlock item", self.region.unlock(&handle), ()),
            None => Ok(()),
        }
    }

    fn insert(&self, tx: &Transaction, key: &CacheKey, entry: CacheEntry, version: Option<Version>) -> Result<bool> {
        let locked = self.region.lock(key, tx.owner(), None).map(Some);
        let Some(handle) = absorb(&self.region, "insert", locked, None)? else {
            return Ok(false);
        };
        self.complete_with(tx, handle, Some((entry, version)));
        Ok(true)
    }

    fn after_insert(&self, _: &CacheKey, _: CacheEntry, _: Option<Version>) -> Result<bool> {
        Ok(false)
    }

    fn update(
        &self,
        tx: &Transaction,
        key: &CacheKey,
        entry: CacheEntry,
        current: Option<Version>,
        previous: Option<Version>,
    ) -> Result<bool> {
        let locked = self.region.lock_if_newer(key, tx.owner(), previous, current.as_ref());
        let Some(handle) = absorb(&self.region, "update", locked, None)? else {
            return Ok(false);
        };
        self.complete_with(tx, handle, Some((entry, current)));
        Ok(true)
    }

    fn after_update(
        &self,
        _: &CacheKey,
        _: CacheEntry,
        _: Option<Version>,
        _: Option<Version>,
        _: Option<LockHandle>,
    ) -> Result<bool> {
        Ok(false)
    }

    fn remove(&self, tx: &Transaction, key: &CacheKey) -> Result<()> {
        let locked = self.region.lock(key, tx.owner(), None).map(Some);
        if let Some(handle) = absorb(&self.region, "remove", locked, None)? {
            self.complete_with(tx, handle, None);
        }
        Ok(())
    }
}
