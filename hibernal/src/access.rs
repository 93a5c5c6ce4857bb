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

use std::{fmt::Display, str::FromStr};

use hibernal_common::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};

/// Concurrency strategy of a cache region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessType {
    /// Immutable data. Entries are cached once and never updated.
    ReadOnly,
    /// Rarely updated data with no isolation guarantee. Writes evict.
    NonstrictReadWrite,
    /// Soft-locked updates, published after commit.
    #[default]
    ReadWrite,
    /// Updates applied through the transaction, published at commit.
    Transactional,
}

impl AccessType {
    /// External name of the access type.
    pub fn name(&self) -> &'static str {
        match self {
            AccessType::ReadOnly => "read-only",
            AccessType::NonstrictReadWrite => "nonstrict-read-write",
            AccessType::ReadWrite => "read-write",
            AccessType::Transactional => "transactional",
        }
    }
}

impl Display for AccessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for AccessType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read-only" => Ok(AccessType::ReadOnly),
            "nonstrict-read-write" => Ok(AccessType::NonstrictReadWrite),
            "read-write" => Ok(AccessType::ReadWrite),
            "transactional" => Ok(AccessType::Transactional),
            _ => Err(Error::new(ErrorKind::Config, "unknown access type").with_context("access", s)),
        }
    }
}
