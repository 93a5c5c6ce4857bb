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

//! Cache regions for hibernal.
//!
//! A [`Region`](region::Region) is a named segment of a [`Backend`](backend::Backend) that maps cache keys to
//! readable entries, soft locks and fences. Backends come from a [`Cluster`](cluster::Cluster), which decides whether
//! nodes share state, invalidate each other or stay isolated.

pub mod backend;
pub mod cluster;
pub mod local;
pub mod lock;
pub mod region;
pub mod slot;
pub mod statistics;

/// Utilities for testing code that talks to a region.
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
