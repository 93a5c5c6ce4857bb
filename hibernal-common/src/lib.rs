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

//! Shared building blocks for hibernal: cache keys, cached entries, versions, clocks, errors and metrics.

/// Allow enable debug assertions in release profile with feature "strict_assertions".
pub mod assert;
/// Logical clocks used to timestamp transactions and soft locks.
pub mod clock;
/// Cached entity and collection state.
pub mod entry;
/// The error type shared by all hibernal crates.
pub mod error;
/// Cache keys.
pub mod key;
/// Metrics for cache regions.
pub mod metrics;
