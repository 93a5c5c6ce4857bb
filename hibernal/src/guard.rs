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
    entry::{CacheEntry, Version},
    error::Result,
    key::CacheKey,
};
use hibernal_region::lock::LockHandle;

use crate::strategy::AccessStrategy;

/// A lock taken with [`AccessStrategy::lock_scoped`].
///
/// Finish the write with [`SoftLockGuard::after_update`] or give it up with [`SoftLockGuard::unlock`]. A guard that
/// is dropped without either unlocks the key, so an early return or a panic never leaves a hold behind.
#[must_use = "dropping the guard releases the lock immediately"]
#[derive(Debug)]
pub struct SoftLockGuard {
    strategy: AccessStrategy,
    key: CacheKey,
    handle: Option<LockHandle>,
    armed: bool,
}

impl SoftLockGuard {
    pub(crate) fn new(strategy: AccessStrategy, key: CacheKey, handle: Option<LockHandle>) -> Self {
        Self {
            strategy,
            key,
            handle,
            armed: true,
        }
    }

    /// Key of the guarded lock.
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// The soft lock, if the strategy took one.
    pub fn handle(&self) -> Option<&LockHandle> {
        self.handle.as_ref()
    }

    /// Finish the write after commit. See [`AccessStrategy::after_update`].
    pub fn after_update(mut self, entry: CacheEntry, current: Option<Version>, previous: Option<Version>) -> Result<bool> {
        self.armed = false;
        self.strategy
            .after_update(&self.key, entry, current, previous, self.handle.take())
    }

    /// Give up the lock. See [`AccessStrategy::unlock_item`].
    pub fn unlock(mut self) -> Result<()> {
        self.armed = false;
        self.strategy.unlock_item(&self.key, self.handle.take())
    }
}

impl Drop for SoftLockGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = self.strategy.unlock_item(&self.key, self.handle.take()) {
            tracing::warn!("[strategy]: releasing soft lock on {} failed: {e}", self.key);
        }
    }
}
