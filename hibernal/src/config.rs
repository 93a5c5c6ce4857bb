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

use std::{path::Path, time::Duration};

use hashbrown::HashMap;
use hibernal_common::error::{Error, ErrorKind, Result};
use hibernal_region::{
    cluster::{ClusterMode, DEFAULT_SHARDS},
    region::DEFAULT_LOCK_TIMEOUT,
};
use serde::{Deserialize, Serialize};

use crate::access::AccessType;

/// Per-region settings of a [`CacheConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegionOverride {
    /// Access type of the region, instead of the default one.
    pub access: Option<AccessType>,
    /// Soft lock timeout of the region in milliseconds, instead of the default one.
    pub lock_timeout_ms: Option<u64>,
}

/// Configuration resource of a cache instance manager.
///
/// ```json
/// {
///   "cluster_mode": "invalidation",
///   "lock_timeout_ms": 60000,
///   "default_access": "read-write",
///   "regions": { "com.example.Person": { "access": "read-only" } }
/// }
/// ```
///
/// Every field is optional. Region overrides are keyed by the unprefixed region name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Topology to create when the manager does not join an existing cluster.
    ///
    /// If the manager joins a cluster, the modes must agree.
    pub cluster_mode: Option<ClusterMode>,
    /// Soft lock timeout in milliseconds.
    pub lock_timeout_ms: u64,
    /// Access type of regions without an override.
    pub default_access: AccessType,
    /// Shard count of each region namespace.
    pub shards: usize,
    /// Per-region overrides.
    pub regions: HashMap<String, RegionOverride>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cluster_mode: None,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT.as_millis() as u64,
            default_access: AccessType::default(),
            shards: DEFAULT_SHARDS,
            regions: HashMap::new(),
        }
    }
}

impl CacheConfig {
    /// Parse a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::new(ErrorKind::Parse, "malformed cache config").with_source(e))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration resource.
    pub fn from_resource(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }

    /// Check that the settings are usable.
    pub fn validate(&self) -> Result<()> {
        if self.shards == 0 {
            return Err(Error::new(ErrorKind::Config, "shard count must be positive"));
        }
        if self.lock_timeout_ms == 0 {
            return Err(Error::new(ErrorKind::Config, "lock timeout must be positive"));
        }
        if let Some((name, _)) = self.regions.iter().find(|(_, o)| o.lock_timeout_ms == Some(0)) {
            return Err(Error::new(ErrorKind::Config, "lock timeout must be positive").with_context("region", name));
        }
        Ok(())
    }

    /// Access type configured for the region `name`.
    pub fn access(&self, name: &str) -> AccessType {
        self.regions
            .get(name)
            .and_then(|o| o.access)
            .unwrap_or(self.default_access)
    }

    /// Soft lock timeout configured for the region `name`.
    pub fn lock_timeout(&self, name: &str) -> Duration {
        let millis = self
            .regions
            .get(name)
            .and_then(|o| o.lock_timeout_ms)
            .unwrap_or(self.lock_timeout_ms);
        Duration::from_millis(millis)
    }
}
