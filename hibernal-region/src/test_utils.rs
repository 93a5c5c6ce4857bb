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

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use hibernal_common::{
    clock::Timestamp,
    error::{Error, Result},
    key::CacheKey,
};

use crate::{
    backend::{Backend, Compute, Propagation},
    slot::{RegionFence, Slot},
};

/// A backend wrapper whose availability can be switched off to simulate a transport outage.
#[derive(Debug)]
pub struct FlakyBackend {
    inner: Arc<dyn Backend>,
    available: AtomicBool,
}

impl FlakyBackend {
    /// Wrap `inner`, initially available.
    pub fn new(inner: Arc<dyn Backend>) -> Self {
        Self {
            inner,
            available: AtomicBool::new(true),
        }
    }

    /// Switch the simulated transport on or off.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    fn check(&self) -> Result<()> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::backend_unavailable("simulated outage"))
        }
    }
}

impl Backend for FlakyBackend {
    fn start_region(&self, region: &str) -> Result<()> {
        self.check()?;
        self.inner.start_region(region)
    }

    fn stop_region(&self, region: &str) -> Result<()> {
        self.check()?;
        self.inner.stop_region(region)
    }

    fn get(&self, region: &str, key: &CacheKey) -> Result<Option<Slot>> {
        self.check()?;
        self.inner.get(region, key)
    }

    fn compute(
        &self,
        region: &str,
        key: &CacheKey,
        propagation: Propagation,
        f: &mut dyn FnMut(Option<&Slot>) -> Compute,
    ) -> Result<bool> {
        self.check()?;
        self.inner.compute(region, key, propagation, f)
    }

    fn clear(&self, region: &str, propagation: Propagation) -> Result<()> {
        self.check()?;
        self.inner.clear(region, propagation)
    }

    fn snapshot(&self, region: &str) -> Result<Vec<(CacheKey, Slot)>> {
        self.check()?;
        self.inner.snapshot(region)
    }

    fn begin_invalidation(&self, region: &str) -> Result<()> {
        self.check()?;
        self.inner.begin_invalidation(region)
    }

    fn end_invalidation(&self, region: &str, at: Timestamp) -> Result<()> {
        self.check()?;
        self.inner.end_invalidation(region, at)
    }

    fn region_fence(&self, region: &str) -> Result<RegionFence> {
        self.check()?;
        self.inner.region_fence(region)
    }
}
