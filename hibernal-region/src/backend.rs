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

use std::fmt::Debug;

use hibernal_common::{clock::Timestamp, error::Result, key::CacheKey};

use crate::slot::{RegionFence, Slot};

/// Decision of a [`Backend::compute`] closure.
#[derive(Debug, Clone, PartialEq)]
pub enum Compute {
    /// Leave the slot as it is.
    Keep,
    /// Replace the slot.
    Set(Slot),
    /// Remove the slot, leaving the key ABSENT.
    Remove,
}

/// How far a change travels in a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Only the local node sees the change.
    ///
    /// Used for puts-from-load, which must never invalidate other nodes.
    Local,
    /// Other nodes invalidate the key as of the given timestamp.
    Invalidate(Timestamp),
}

/// Storage behind cache regions.
///
/// A backend keeps one namespace per region. Every mutation goes through [`Backend::compute`], which decides and
/// applies the new slot atomically with respect to other operations on the same key.
pub trait Backend: Send + Sync + 'static + Debug {
    /// Open the namespace of a region. Opening an already open namespace joins it.
    fn start_region(&self, region: &str) -> Result<()>;

    /// Leave the namespace of a region. Its slots are dropped once no one has it open.
    fn stop_region(&self, region: &str) -> Result<()>;

    /// Read the slot of a key.
    fn get(&self, region: &str, key: &CacheKey) -> Result<Option<Slot>>;

    /// Atomically inspect and replace the slot of a key.
    ///
    /// Returns `true` if the slot changed.
    fn compute(
        &self,
        region: &str,
        key: &CacheKey,
        propagation: Propagation,
        f: &mut dyn FnMut(Option<&Slot>) -> Compute,
    ) -> Result<bool>;

    /// Drop every slot of a region.
    fn clear(&self, region: &str, propagation: Propagation) -> Result<()>;

    /// Copy out every slot of a region.
    fn snapshot(&self, region: &str) -> Result<Vec<(CacheKey, Slot)>>;

    /// Start a bulk operation on a region.
    ///
    /// Every slot is dropped and the region stays unreadable on every node until the operation ends.
    fn begin_invalidation(&self, region: &str) -> Result<()>;

    /// End a bulk operation on a region at `at`.
    ///
    /// Every slot is dropped again and loads whose transaction started at or before `at` are refused on every node.
    fn end_invalidation(&self, region: &str, at: Timestamp) -> Result<()>;

    /// Region-wide invalidation state as seen by this node.
    fn region_fence(&self, region: &str) -> Result<RegionFence>;
}
