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

use super::RegionAccess;
use crate::{access::AccessType, transaction::Transaction};

/// Strategy for rarely updated data that tolerates short windows of staleness.
///
/// Nothing is locked. Every write evicts the key before and after the database write, and the next load caches the
/// fresh state.
#[derive(Debug)]
pub struct NonstrictReadWriteAccess {
    region: Arc<Region>,
}

impl NonstrictReadWriteAccess {
    pub(crate) fn new(region: Arc<Region>) -> Self {
        Self { region }
    }
}

impl RegionAccess for NonstrictReadWriteAccess {
    fn region(&self) -> &Arc<Region> {
        &self.region
    }

    fn access_type(&self) -> AccessType {
        AccessType::NonstrictReadWrite
    }

    fn lock_item(&self, _: &Transaction, _: &CacheKey, _: Option<Version>) -> Result<Option<LockHandle>> {
        Ok(None)
    }

    fn unlock_item(&self, key: &CacheKey, _: Option<LockHandle>) -> Result<()> {
        self.evict(key)
    }

    fn insert(&self, _: &Transaction, _: &CacheKey, _: CacheEntry, _: Option<Version>) -> Result<bool> {
        Ok(false)
    }

    fn after_insert(&self, _: &CacheKey, _: CacheEntry, _: Option<Version>) -> Result<bool> {
        Ok(false)
    }

    fn update(
        &self,
        _: &Transaction,
        key: &CacheKey,
        _: CacheEntry,
        _: Option<Version>,
        _: Option<Version>,
    ) -> Result<bool> {
        self.evict(key)?;
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
        self.evict(key)?;
        Ok(false)
    }

    fn remove(&self, _: &Transaction, key: &CacheKey) -> Result<()> {
        self.evict(key)
    }
}
