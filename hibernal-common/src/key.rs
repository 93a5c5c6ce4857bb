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

use std::{fmt::Display, sync::Arc};

/// Identifier of a cached entity, or of the entity owning a cached collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Identifier {
    /// Numeric identifier.
    Int(i64),
    /// Textual identifier.
    Text(Arc<str>),
    /// Composite identifier.
    Composite(Arc<[Identifier]>),
}

impl Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Identifier::Int(v) => write!(f, "{v}"),
            Identifier::Text(v) => write!(f, "{v}"),
            Identifier::Composite(parts) => {
                write!(f, "(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{part}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<i64> for Identifier {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Identifier {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<&str> for Identifier {
    fn from(v: &str) -> Self {
        Self::Text(v.into())
    }
}

impl From<String> for Identifier {
    fn from(v: String) -> Self {
        Self::Text(v.into())
    }
}

impl From<Vec<Identifier>> for Identifier {
    fn from(v: Vec<Identifier>) -> Self {
        Self::Composite(v.into())
    }
}

/// Key of a cached entry.
///
/// The role names the entity type or collection role, e.g. `com.example.Customer` or
/// `com.example.Customer.contacts`. Keys with the same identifier but different roles or tenants never collide.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey {
    role: Arc<str>,
    id: Identifier,
    tenant: Option<Arc<str>>,
}

impl CacheKey {
    /// Create a cache key for `id` under `role`.
    pub fn new(role: impl Into<Arc<str>>, id: impl Into<Identifier>) -> Self {
        Self {
            role: role.into(),
            id: id.into(),
            tenant: None,
        }
    }

    /// Scope the key to a tenant.
    pub fn with_tenant(mut self, tenant: impl Into<Arc<str>>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    /// Entity type or collection role of the key.
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Identifier of the key.
    pub fn id(&self) -> &Identifier {
        &self.id
    }

    /// Tenant of the key, if any.
    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.role, self.id)?;
        if let Some(tenant) = &self.tenant {
            write!(f, "@{tenant}")?;
        }
        Ok(())
    }
}
