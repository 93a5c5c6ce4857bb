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


//! hibernal: second-level entity cache regions with pluggable concurrency strategies.
//!
//! A [`CacheInstanceManager`](manager::CacheInstanceManager) owns the regions of one node. Each region is accessed
//! through an [`AccessStrategy`](strategy::AccessStrategy) that decides how reads, loads and transactional writes
//! interact:
//!
//! - [`AccessType::ReadOnly`](access::AccessType::ReadOnly) for immutable data.
//! - [`AccessType::NonstrictReadWrite`](access::AccessType::NonstrictReadWrite) evicts on every write.
//! - [`AccessType::ReadWrite`](access::AccessType::ReadWrite) soft-locks keys while they are written.
//! - [`AccessType::Transactional`](access::AccessType::Transactional) publishes writes when the transaction commits.
//!
//! ```
//! use hibernal::prelude::*;
//!
//! let manager = CacheInstanceManager::builder().with_region_prefix("app").start().unwrap();
//! let strategy = manager.access_strategy_with("Person", AccessType::ReadWrite).unwrap();
//! let key = CacheKey::new("Person", 1);
//!
//! let tx = manager.begin();
//! strategy
//!     .put_from_load(&tx, &key, CacheEntry::entity(["Alice"]).with_version(1), Some(Version::from(1)), false)
//!     .unwrap();
//! tx.commit().unwrap();
//!
//! assert_eq!(strategy.get(&key).unwrap().unwrap().values().unwrap()[0], Datum::from("Alice"));
//! manager.stop().unwrap();
//! ```

pub mod access;
pub mod config;
pub mod guard;
pub mod manager;
pub mod prelude;
pub mod strategy;
pub mod transaction;
