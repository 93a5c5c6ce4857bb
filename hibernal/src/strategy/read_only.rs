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
    error::{Error, ErrorKind, Result},
    key::CacheKey,
};
use hibernal_region::{lock::LockHandle, region::Region};

use super::{absorb, RegionAccess};
use crate::{access::AccessType, transaction::Transaction};

/// Strategy for immutable data.
///
/// Entries are cached by loads and inserts and never locked. Locking or updating an entry that is cached is a
/// programming error and fails with [`ErrorKind::Unsupported`]. Removing one is allowed.
#[derive(Debug)]
pub struct ReadOnlyAccess {
    region: Arc<Region>,
}

impl ReadOnlyAccess {
    pub(crate) fn new(region: Arc<Region>) -> Self {
        Self { region }
    }

    fn reject_cached(&self, operation: &'static str, key: &CacheKey) -> Result<()> {
        let cached = absorb(&self.region, operation, self.region.contains(key), false)?;
        if cached {
            tracing::error!(
                "[read-only]: region {} refused {operation} of cached read-only entry {key}",
                self.region.name()
            );
            return Err(Error::new(ErrorKind::Unsupported, "cannot write a read-only entry")
                .with_context("region", self.region.name())
                .with_context("key", key)
                .with_context("operation", operation));
        }
        Ok(())
    }
}

impl RegionAccess for ReadOnlyAccess {
    fn region(&self) -> &Arc<Region> {
        &self.region
    }

    fn access_type(&self) -> AccessType {
        AccessType::ReadOnly
    }

    fn lock_item(&self, _: &Transaction, key: &CacheKey, _: Option<Version>) -> Result<Option<LockHandle>> {
        self.reject_cached("lock", key)?;
        Ok(None)
    }

    fn unlock_item(&self, _: &CacheKey, _: Option<LockHandle>) -> Result<()> {
        Ok(())
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

    fn update(
        &self,
        _: &Transaction,
        key: &CacheKey,
        _: CacheEntry,
        _: Option<Version>,
        _: Option<Version>,
    ) -> Result<bool> {
        self.reject_cached("update", key)?;
        Ok(false)
    }

    fn after_update(
        &self,
        key: &CacheKey,
        _: CacheEntry,
        _: Option<Version>,
        _: Option<Version>,
        _: Option<LockHandle>,
    ) -> Result<bool> {
        self.reject_cached("update", key)?;
        Ok(false)
    }

    fn remove(&self, _: &Transaction, key: &CacheKey) -> Result<()> {
        self.evict(key)
    }
}
