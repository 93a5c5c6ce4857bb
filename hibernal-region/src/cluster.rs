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

use std::sync::{Arc, Weak};

use hibernal_common::{clock::Timestamp, error::Result, key::CacheKey};
use itertools::Itertools;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{
    backend::{Backend, Compute, Propagation},
    local::LocalBackend,
    slot::{RegionFence, Slot},
};

/// Default shard count of each region namespace.
pub const DEFAULT_SHARDS: usize = 16;

/// How the nodes of a cluster share cached state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClusterMode {
    /// Every node keeps its own isolated cache.
    #[default]
    Local,
    /// All nodes see the same state. Writes on one node are visible on every other node.
    Replicated,
    /// Every node keeps its own cache. Writes other than puts-from-load invalidate the key on every other node.
    Invalidation,
}

#[derive(Debug)]
struct ClusterInner {
    mode: ClusterMode,
    shards: usize,
    shared: Arc<LocalBackend>,
    nodes: RwLock<Vec<Weak<LocalBackend>>>,
}

/// A group of cache nodes living in one process.
///
/// Each node obtains its backend with [`Cluster::join`].
#[derive(Debug, Clone)]
pub struct Cluster {
    inner: Arc<ClusterInner>,
}

impl Cluster {
    /// Create a cluster with the default shard count.
    pub fn new(mode: ClusterMode) -> Self {
        Self::with_shards(mode, DEFAULT_SHARDS)
    }

    /// Create a cluster whose region namespaces are split into `shards` shards.
    pub fn with_shards(mode: ClusterMode, shards: usize) -> Self {
        Self {
            inner: Arc::new(ClusterInner {
                mode,
                shards,
                shared: Arc::new(LocalBackend::new(shards)),
                nodes: RwLock::new(vec![]),
            }),
        }
    }

    /// Topology of the cluster.
    pub fn mode(&self) -> ClusterMode {
        self.inner.mode
    }

    /// Join the cluster as a new node and get the backend of the node.
    pub fn join(&self) -> Arc<dyn Backend> {
        match self.inner.mode {
            ClusterMode::Local => Arc::new(LocalBackend::new(self.inner.shards)),
            ClusterMode::Replicated => self.inner.shared.clone(),
            ClusterMode::Invalidation => {
                let store = Arc::new(LocalBackend::new(self.inner.shards));
                let mut nodes = self.inner.nodes.write();
                nodes.retain(|node| node.strong_count() > 0);
                nodes.push(Arc::downgrade(&store));
                tracing::debug!("[cluster]: node joined, {} nodes alive", nodes.len());
                Arc::new(InvalidationNode {
                    store,
                    cluster: self.inner.clone(),
                })
            }
        }
    }
}

/// A node of an invalidation cluster.
#[derive(Debug)]
struct InvalidationNode {
    store: Arc<LocalBackend>,
    cluster: Arc<ClusterInner>,
}

impl InvalidationNode {
    fn peers(&self) -> Vec<Arc<LocalBackend>> {
        self.cluster
            .nodes
            .read()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|node| !Arc::ptr_eq(node, &self.store))
            .collect_vec()
    }
}

impl Backend for InvalidationNode {
    fn start_region(&self, region: &str) -> Result<()> {
        self.store.start_region(region)
    }

    fn stop_region(&self, region: &str) -> Result<()> {
        self.store.stop_region(region)
    }

    fn get(&self, region: &str, key: &CacheKey) -> Result<Option<Slot>> {
        self.store.get(region, key)
    }

    fn compute(
        &self,
        region: &str,
        key: &CacheKey,
        propagation: Propagation,
        f: &mut dyn FnMut(Option<&Slot>) -> Compute,
    ) -> Result<bool> {
        let changed = self.store.compute(region, key, propagation, f)?;
        if let (true, Propagation::Invalidate(at)) = (changed, propagation) {
            for peer in self.peers() {
                peer.invalidate(region, key, at);
            }
        }
        Ok(changed)
    }

    fn clear(&self, region: &str, propagation: Propagation) -> Result<()> {
        self.store.clear(region, propagation)?;
        if let Propagation::Invalidate(_) = propagation {
            for peer in self.peers() {
                peer.clear_if_open(region);
            }
        }
        Ok(())
    }

    fn snapshot(&self, region: &str) -> Result<Vec<(CacheKey, Slot)>> {
        self.store.snapshot(region)
    }

    fn begin_invalidation(&self, region: &str) -> Result<()> {
        self.store.begin_invalidation(region)?;
        for peer in self.peers() {
            peer.begin_invalidation_if_open(region);
        }
        Ok(())
    }

    fn end_invalidation(&self, region: &str, at: Timestamp) -> Result<()> {
        self.store.end_invalidation(region, at)?;
        for peer in self.peers() {
            peer.end_invalidation_if_open(region, at);
        }
        Ok(())
    }

    fn region_fence(&self, region: &str) -> Result<RegionFence> {
        self.store.region_fence(region)
    }
}
