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

use std::{hash::BuildHasher, sync::Arc};

use hashbrown::{hash_map::Entry, DefaultHashBuilder, HashMap};
use hibernal_common::{
    clock::Timestamp,
    error::{Error, Result},
    key::CacheKey,
};
use itertools::Itertools;
use parking_lot::{Mutex, RwLock};

use crate::{
    backend::{Backend, Compute, Propagation},
    slot::{Fence, RegionFence, Slot},
};

#[derive(Debug)]
struct Shards {
    shards: Vec<Mutex<HashMap<CacheKey, Slot>>>,
    hash_builder: DefaultHashBuilder,
    fence: Mutex<RegionFence>,
}

impl Shards {
    fn new(shards: usize) -> Self {
        Self {
            shards: (0..shards).map(|_| Mutex::new(HashMap::new())).collect_vec(),
            hash_builder: DefaultHashBuilder::default(),
            fence: Mutex::new(RegionFence::default()),
        }
    }

    fn clear(&self) {
        self.shards.iter().for_each(|shard| shard.lock().clear());
    }

    fn begin_invalidation(&self) {
        self.fence.lock().begin();
        self.clear();
    }

    fn end_invalidation(&self, at: Timestamp) {
        self.fence.lock().end(at);
        self.clear();
    }

    fn shard(&self, key: &CacheKey) -> &Mutex<HashMap<CacheKey, Slot>> {
        let hash = self.hash_builder.hash_one(key);
        &self.shards[hash as usize % self.shards.len()]
    }
}

#[derive(Debug)]
struct Namespace {
    refs: usize,
    shards: Arc<Shards>,
}

/// In-process backend that keeps each region in a sharded hash map.
///
/// Each shard sits behind its own mutex, so operations on keys in different shards never contend.
#[derive(Debug)]
pub struct LocalBackend {
    shards: usize,
    namespaces: RwLock<HashMap<String, Namespace>>,
}

impl LocalBackend {
    /// Create a local backend whose regions are split into `shards` shards.
    pub fn new(shards: usize) -> Self {
        Self {
            shards: shards.max(1),
            namespaces: RwLock::new(HashMap::new()),
        }
    }

    fn namespace(&self, region: &str) -> Result<Arc<Shards>> {
        self.namespaces
            .read()
            .get(region)
            .map(|ns| ns.shards.clone())
            .ok_or_else(|| Error::closed(region))
    }

    /// Apply an invalidation sent by another node.
    ///
    /// Entries and fences are replaced by a fence at `at`. Locks held on this node stay, they are already unreadable.
    pub(crate) fn invalidate(&self, region: &str, key: &CacheKey, at: Timestamp) {
        let Ok(shards) = self.namespace(region) else {
            return;
        };
        let mut shard = shards.shard(key).lock();
        let unlocked_at = match shard.get(key) {
            Some(Slot::Locked(_)) => return,
            Some(Slot::Fenced(fence)) => fence.unlocked_at.max(at),
            _ => at,
        };
        shard.insert(
            key.clone(),
            Slot::Fenced(Fence {
                unlocked_at,
                version: None,
            }),
        );
    }

    /// Drop every slot of a region, if this node has it open.
    pub(crate) fn clear_if_open(&self, region: &str) {
        if let Ok(shards) = self.namespace(region) {
            shards.clear();
        }
    }

    /// Apply the start of a bulk operation run by another node, if this node has the region open.
    pub(crate) fn begin_invalidation_if_open(&self, region: &str) {
        if let Ok(shards) = self.namespace(region) {
            shards.begin_invalidation();
        }
    }

    /// Apply the end of a bulk operation run by another node, if this node has the region open.
    pub(crate) fn end_invalidation_if_open(&self, region: &str, at: Timestamp) {
        if let Ok(shards) = self.namespace(region) {
            shards.end_invalidation(at);
        }
    }
}

impl Backend for LocalBackend {
    fn start_region(&self, region: &str) -> Result<()> {
        let mut namespaces = self.namespaces.write();
        match namespaces.entry(region.to_string()) {
            Entry::Occupied(mut o) => o.get_mut().refs += 1,
            Entry::Vacant(v) => {
                v.insert(Namespace {
                    refs: 1,
                    shards: Arc::new(Shards::new(self.shards)),
                });
            }
        }
        Ok(())
    }

    fn stop_region(&self, region: &str) -> Result<()> {
        let mut namespaces = self.namespaces.write();
        if let Entry::Occupied(mut o) = namespaces.entry(region.to_string()) {
            o.get_mut().refs -= 1;
            if o.get().refs == 0 {
                o.remove();
                tracing::debug!("[local backend]: region {region} dropped");
            }
        }
        Ok(())
    }

    fn get(&self, region: &str, key: &CacheKey) -> Result<Option<Slot>> {
        let shards = self.namespace(region)?;
        let slot = shards.shard(key).lock().get(key).cloned();
        Ok(slot)
    }

    fn compute(
        &self,
        region: &str,
        key: &CacheKey,
        _: Propagation,
        f: &mut dyn FnMut(Option<&Slot>) -> Compute,
    ) -> Result<bool> {
        let shards = self.namespace(region)?;
        let mut shard = shards.shard(key).lock();
        let changed = match f(shard.get(key)) {
            Compute::Keep => false,
            Compute::Set(slot) => {
                shard.insert(key.clone(), slot);
                true
            }
            Compute::Remove => {
                shard.remove(key);
                true
            }
        };
        Ok(changed)
    }

    fn clear(&self, region: &str, _: Propagation) -> Result<()> {
        self.namespace(region)?.clear();
        Ok(())
    }

    fn snapshot(&self, region: &str) -> Result<Vec<(CacheKey, Slot)>> {
        let shards = self.namespace(region)?;
        let slots = shards
            .shards
            .iter()
            .flat_map(|shard| {
                shard
                    .lock()
                    .iter()
                    .map(|(k, s)| (k.clone(), s.clone()))
                    .collect_vec()
            })
            .collect_vec();
        Ok(slots)
    }

    fn begin_invalidation(&self, region: &str) -> Result<()> {
        self.namespace(region)?.begin_invalidation();
        Ok(())
    }

    fn end_invalidation(&self, region: &str, at: Timestamp) -> Result<()> {
        self.namespace(region)?.end_invalidation(at);
        Ok(())
    }

    fn region_fence(&self, region: &str) -> Result<RegionFence> {
        Ok(*self.namespace(region)?.fence.lock())
    }
}
