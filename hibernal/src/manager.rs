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

use std::{
    fmt::Debug,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use hashbrown::{hash_map::Entry, HashMap};
use hibernal_common::{
    clock::{Clock, SystemClock},
    error::{Error, ErrorKind, Result},
    metrics::Metrics,
};
use hibernal_region::{
    backend::Backend,
    cluster::Cluster,
    region::{Region, RegionConfig},
};
use itertools::Itertools;
use mixtrics::{metrics::BoxedRegistry, registry::noop::NoopMetricsRegistry};
use parking_lot::RwLock;

use crate::{access::AccessType, config::CacheConfig, strategy::AccessStrategy, transaction::Transaction};

/// Builder of a [`CacheInstanceManager`].
pub struct CacheInstanceManagerBuilder {
    region_prefix: Option<String>,
    config_resource: Option<PathBuf>,
    config: Option<CacheConfig>,
    default_access: Option<AccessType>,
    cluster: Option<Cluster>,
    clock: Option<Arc<dyn Clock>>,
    registry: BoxedRegistry,
}

impl Debug for CacheInstanceManagerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheInstanceManagerBuilder")
            .field("region_prefix", &self.region_prefix)
            .field("config_resource", &self.config_resource)
            .field("config", &self.config)
            .field("default_access", &self.default_access)
            .field("cluster", &self.cluster)
            .field("clock", &self.clock)
            .finish()
    }
}

impl Default for CacheInstanceManagerBuilder {
    fn default() -> Self {
        Self {
            region_prefix: None,
            config_resource: None,
            config: None,
            default_access: None,
            cluster: None,
            clock: None,
            registry: Box::new(NoopMetricsRegistry),
        }
    }
}

impl CacheInstanceManagerBuilder {
    /// Prefix every region name with `prefix` and a dot.
    pub fn with_region_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.region_prefix = Some(prefix.into());
        self
    }

    /// Load the configuration from a JSON resource at `path` on start.
    pub fn with_config_resource(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_resource = Some(path.into());
        self
    }

    /// Use an already built configuration. Takes precedence over a configuration resource.
    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the default access type of the configuration.
    pub fn with_default_access(mut self, access: AccessType) -> Self {
        self.default_access = Some(access);
        self
    }

    /// Join an existing cluster instead of creating a private one.
    pub fn with_cluster(mut self, cluster: Cluster) -> Self {
        self.cluster = Some(cluster);
        self
    }

    /// Use `clock` for transaction and lock timestamps.
    ///
    /// Managers joining the same cluster should share a clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Export region metrics to `registry`.
    pub fn with_metrics_registry(mut self, registry: BoxedRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Load the configuration, join the cluster and start the manager.
    ///
    /// Fails with [`ErrorKind::Config`] if the configuration resource is missing or malformed, or if it asks for a
    /// cluster mode other than the joined cluster's.
    pub fn start(self) -> Result<CacheInstanceManager> {
        let mut config = match (self.config, self.config_resource) {
            (Some(config), _) => config,
            (None, Some(path)) => CacheConfig::from_resource(&path).map_err(|e| {
                Error::new(ErrorKind::Config, "cannot load cache config")
                    .with_context("resource", path.display())
                    .with_source(e)
            })?,
            (None, None) => CacheConfig::default(),
        };
        if let Some(access) = self.default_access {
            config.default_access = access;
        }
        config.validate()?;

        let cluster = match (self.cluster, config.cluster_mode) {
            (Some(cluster), Some(mode)) if cluster.mode() != mode => {
                return Err(Error::new(ErrorKind::Config, "cluster mode mismatch")
                    .with_context("configured", format!("{mode:?}"))
                    .with_context("joined", format!("{:?}", cluster.mode())));
            }
            (Some(cluster), _) => cluster,
            (None, mode) => Cluster::with_shards(mode.unwrap_or_default(), config.shards),
        };
        let backend = cluster.join();
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::default()));

        tracing::info!(
            "[manager]: cache instance manager started, cluster mode {:?}, default access {}",
            cluster.mode(),
            config.default_access
        );

        Ok(CacheInstanceManager {
            inner: Arc::new(ManagerInner {
                prefix: self.region_prefix,
                config,
                backend,
                clock,
                registry: self.registry,
                regions: RwLock::new(HashMap::new()),
                stopped: AtomicBool::new(false),
            }),
        })
    }
}

struct ManagerInner {
    prefix: Option<String>,
    config: CacheConfig,
    backend: Arc<dyn Backend>,
    clock: Arc<dyn Clock>,
    registry: BoxedRegistry,
    regions: RwLock<HashMap<String, Arc<Region>>>,
    stopped: AtomicBool,
}

/// Owner of the cache regions of one node.
///
/// Regions are created on first request, named `<prefix>.<name>` when a prefix is configured, and destroyed when the
/// manager stops. Cloning is cheap, every clone manages the same regions.
#[derive(Clone)]
pub struct CacheInstanceManager {
    inner: Arc<ManagerInner>,
}

impl Debug for CacheInstanceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheInstanceManager")
            .field("prefix", &self.inner.prefix)
            .field("regions", &self.region_names())
            .field("stopped", &self.inner.stopped.load(Ordering::Relaxed))
            .finish()
    }
}

impl CacheInstanceManager {
    /// Create a builder.
    pub fn builder() -> CacheInstanceManagerBuilder {
        CacheInstanceManagerBuilder::default()
    }

    /// Configuration the manager runs with.
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Clock of the manager.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    /// Begin a transaction stamped by the clock of the manager.
    pub fn begin(&self) -> Transaction {
        Transaction::begin(self.inner.clock.as_ref())
    }

    /// Fully qualified name of the region `name`.
    pub fn qualified_name(&self, name: &str) -> String {
        match &self.inner.prefix {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}.{name}"),
            _ => name.to_string(),
        }
    }

    fn ensure_running(&self) -> Result<()> {
        if self.inner.stopped.load(Ordering::Acquire) {
            return Err(Error::new(ErrorKind::Closed, "cache instance manager has been stopped"));
        }
        Ok(())
    }

    /// Get the region `name`, creating it on first request.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "hibernal::manager::get_region"))]
    pub fn get_region(&self, name: &str) -> Result<Arc<Region>> {
        self.ensure_running()?;
        let qualified = self.qualified_name(name);

        if let Some(region) = self.inner.regions.read().get(&qualified) {
            return Ok(region.clone());
        }

        let mut regions = self.inner.regions.write();
        self.ensure_running()?;
        let region = match regions.entry(qualified) {
            Entry::Occupied(o) => o.get().clone(),
            Entry::Vacant(v) => {
                let region = Region::open(RegionConfig {
                    name: v.key().clone(),
                    lock_timeout: self.inner.config.lock_timeout(name),
                    backend: self.inner.backend.clone(),
                    clock: self.inner.clock.clone(),
                    metrics: Arc::new(Metrics::new(v.key().clone(), &self.inner.registry)),
                })?;
                v.insert(Arc::new(region)).clone()
            }
        };
        Ok(region)
    }

    /// Build the configured strategy over the region `name`.
    pub fn access_strategy(&self, name: &str) -> Result<AccessStrategy> {
        self.access_strategy_with(name, self.inner.config.access(name))
    }

    /// Build a strategy of type `access` over the region `name`.
    pub fn access_strategy_with(&self, name: &str, access: AccessType) -> Result<AccessStrategy> {
        let region = self.get_region(name)?;
        Ok(AccessStrategy::new(access, region))
    }

    /// Names of the regions created so far.
    pub fn region_names(&self) -> Vec<String> {
        self.inner.regions.read().keys().cloned().sorted().collect_vec()
    }

    /// Destroy every region and stop the manager. Idempotent.
    pub fn stop(&self) -> Result<()> {
        if self.inner.stopped.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let regions = std::mem::take(&mut *self.inner.regions.write());
        let mut first = None;
        for region in regions.into_values() {
            if let Err(e) = region.destroy() {
                tracing::warn!("[manager]: failed to destroy region {}: {e}", region.name());
                first.get_or_insert(e);
            }
        }
        tracing::info!("[manager]: cache instance manager stopped");
        match first {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}
