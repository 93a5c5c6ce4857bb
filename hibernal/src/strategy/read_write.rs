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
use crate::{access::AccessType, transaction::Transaction};

/// Strategy for data that is read often and updated sometimes.
///
/// Writers soft-lock the key before writing to the database. The new state is published after commit, and only if
/// no other writer held the lock in the meantime. Readers never wait: a locked key is a miss.
#[derive(Debug)]
pub struct ReadWriteAccess {
    region: Arc<Region>,
}

impl ReadWriteAccess {
    pub(crate) fn new(region: Arc<Region>) -> Self {
        Self { region }
    }
}

impl RegionAccess for ReadWriteAccess {
    fn region(&self) -> &Arc<Region> {
        &self.region
    }

    fn access_type(&self) -> AccessType {
        AccessType::ReadWrite
    }

    fn lock_item(&self, tx: &Transaction, key: &CacheKey, version: Option<Version>) -> Result<Option<LockHandle>> {
        let locked = self.region.lock(key, tx.owner(), version).map(Some);
        absorb(&self.region, "lock item", locked, None)
    }

    fn unlock_item(&self, key: &CacheKey, handle: Option<LockHandle>) -> Result<()> {
        match handle {
            Some(handle) => absorb(&self.region, "unlock item", self.region.unlock(&handle), ()),
            None => self.evict(key),
        }
    }

    fn insert(&self, _: &Transaction, _: &CacheKey, _: CacheEntry, _: Option<Version>) -> Result<bool> {
        Ok(false)
    }

    fn after_insert(&self, key: &CacheKey, entry: CacheEntry, version: Option<Version>) -> Result<bool> {
        absorb(
            &self.region,
            "after insert",
            self.region.insert_if_absent(key, entry.versioned(version)),
            false,
        )
    }

    fn update(&self, _: &Transaction, _: &CacheKey, _: CacheEntry, _: Option<Version>, _: Option<Version>) -> Result<bool> {
        Ok(false)
    }

    fn after_update(
        &self,
        key: &CacheKey,
        entry: CacheEntry,
        current: Option<Version>,
        _: Option<Version>,
        handle: Option<LockHandle>,
    ) -> Result<bool> {
        match handle {
            Some(handle) => absorb(
                &self.region,
                "after update",
                self.region.release_with_entry(&handle, entry, current),
                false,
            ),
            None => {
                tracing::warn!(
                    "[strategy]: region {} got an update of {key} without a soft lock, evicting",
                    self.region.name()
                );
                self.evict(key)?;
                Ok(false)
            }
        }
    }

    fn remove(&self, _: &Transaction, key: &CacheKey) -> Result<()> {
        absorb(&self.region, "remove", self.region.remove(key), ())
    }
}
