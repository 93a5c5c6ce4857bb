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

//! The differences between [`hibernal_common::metrics::Metrics`] and [`Statistics`] is that the metrics are exported
//! to external systems through a registry, while [`Statistics`] are exact per-region counters the region owner can
//! read back at any time.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct Statistics {
    put: AtomicU64,
    hit: AtomicU64,
    miss: AtomicU64,
}

impl Statistics {
    pub(crate) fn record_put(&self) {
        self.put.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_hit(&self) {
        self.hit.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.miss.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, element_count: u64) -> RegionStatistics {
        RegionStatistics {
            put_count: self.put.load(Ordering::Relaxed),
            hit_count: self.hit.load(Ordering::Relaxed),
            miss_count: self.miss.load(Ordering::Relaxed),
            element_count,
        }
    }
}

/// Counters of a region as seen by one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegionStatistics {
    /// Entries published by this node.
    pub put_count: u64,
    /// Reads on this node answered from the region.
    pub hit_count: u64,
    /// Reads on this node that found nothing readable.
    pub miss_count: u64,
    /// Readable entries currently in the region.
    pub element_count: u64,
}
