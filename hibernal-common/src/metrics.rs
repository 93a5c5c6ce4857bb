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

use std::borrow::Cow;

use mixtrics::metrics::{BoxedCounter, BoxedGauge, BoxedRegistry};

/// Counters of a single cache region.
///
/// All counters share the `hibernal_region_op_total` family, labeled by region name and operation.
/// The entry gauge belongs to the `hibernal_region_entries` family, labeled by region name.
#[derive(Debug)]
pub struct Metrics {
    /// Reads answered from the region.
    pub region_hit: BoxedCounter,
    /// Reads that found nothing readable.
    pub region_miss: BoxedCounter,
    /// Entries published into the region.
    pub region_put: BoxedCounter,
    /// Writes dropped because their version or timestamp was stale.
    pub region_stale: BoxedCounter,
    /// Soft locks acquired or re-entered.
    pub region_lock: BoxedCounter,
    /// Soft locks released.
    pub region_unlock: BoxedCounter,
    /// Keys or regions forcibly invalidated.
    pub region_evict: BoxedCounter,
    /// Lock handles rejected because they did not match the recorded lock.
    pub region_illegal_lock: BoxedCounter,

    /// Readable entries in the region, refreshed whenever statistics are taken.
    pub region_entries: BoxedGauge,
}

impl Metrics {
    /// Create the metrics of the region with the given name.
    pub fn new(name: impl Into<Cow<'static, str>>, registry: &BoxedRegistry) -> Self {
        let name = name.into();

        let hibernal_region_op_total = registry.register_counter_vec(
            "hibernal_region_op_total".into(),
            "hibernal cache region operations".into(),
            &["name", "op"],
        );

        let hibernal_region_entries = registry.register_gauge_vec(
            "hibernal_region_entries".into(),
            "hibernal cache region readable entries".into(),
            &["name"],
        );

        let region_hit = hibernal_region_op_total.counter(&[name.clone(), "hit".into()]);
        let region_miss = hibernal_region_op_total.counter(&[name.clone(), "miss".into()]);
        let region_put = hibernal_region_op_total.counter(&[name.clone(), "put".into()]);
        let region_stale = hibernal_region_op_total.counter(&[name.clone(), "stale".into()]);
        let region_lock = hibernal_region_op_total.counter(&[name.clone(), "lock".into()]);
        let region_unlock = hibernal_region_op_total.counter(&[name.clone(), "unlock".into()]);
        let region_evict = hibernal_region_op_total.counter(&[name.clone(), "evict".into()]);
        let region_illegal_lock = hibernal_region_op_total.counter(&[name.clone(), "illegal_lock".into()]);

        let region_entries = hibernal_region_entries.gauge(&[name]);

        Self {
            region_hit,
            region_miss,
            region_put,
            region_stale,
            region_lock,
            region_unlock,
            region_evict,
            region_illegal_lock,
            region_entries,
        }
    }

    /// Build noop metrics.
    ///
    /// Note: `noop` is only supposed to be called by other hibernal components.
    #[doc(hidden)]
    pub fn noop() -> Self {
        use mixtrics::registry::noop::NoopMetricsRegistry;

        Self::new("test", &(Box::new(NoopMetricsRegistry) as BoxedRegistry))
    }
}
