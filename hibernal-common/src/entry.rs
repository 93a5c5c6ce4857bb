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

use std::sync::Arc;

use crate::{clock::Timestamp, key::Identifier};

/// Optimistic-concurrency version of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    /// Incrementing version number.
    Number(i64),
    /// Last-modified timestamp.
    Timestamp(Timestamp),
}

impl Version {
    /// Returns `true` if `self` is strictly newer than `other`.
    ///
    /// Versions of different kinds are never comparable, so neither is newer than the other.
    pub fn is_newer_than(&self, other: &Version) -> bool {
        match (self, other) {
            (Version::Number(a), Version::Number(b)) => a > b,
            (Version::Timestamp(a), Version::Timestamp(b)) => a > b,
            _ => false,
        }
    }

    /// Decide whether state carrying `candidate` may replace state carrying `current`.
    ///
    /// Unversioned current state can always be replaced. Versioned state is only replaced by a strictly newer version.
    pub fn supersedes(candidate: Option<&Version>, current: Option<&Version>) -> bool {
        match (candidate, current) {
            (_, None) => true,
            (Some(candidate), Some(current)) => candidate.is_newer_than(current),
            (None, Some(_)) => false,
        }
    }
}

impl From<i64> for Version {
    fn from(v: i64) -> Self {
        Self::Number(v)
    }
}

impl From<i32> for Version {
    fn from(v: i32) -> Self {
        Self::Number(v.into())
    }
}

impl From<Timestamp> for Version {
    fn from(v: Timestamp) -> Self {
        Self::Timestamp(v)
    }
}

/// A single disassembled attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    /// SQL null.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Text value.
    Text(Arc<str>),
    /// Binary value.
    Bytes(Arc<[u8]>),
}

impl From<bool> for Datum {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Datum {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Datum {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for Datum {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Datum {
    fn from(v: &str) -> Self {
        Self::Text(v.into())
    }
}

impl From<String> for Datum {
    fn from(v: String) -> Self {
        Self::Text(v.into())
    }
}

impl From<Vec<u8>> for Datum {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v.into())
    }
}

/// What a cache entry holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Disassembled attribute values of an entity.
    Entity(Arc<[Datum]>),
    /// Identifiers of the elements of a collection.
    Collection(Arc<[Identifier]>),
}

/// Immutable disassembled state of an entity or collection, as stored in a region.
///
/// Cloning an entry is cheap, the payload is shared.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    payload: Payload,
    version: Option<Version>,
}

impl CacheEntry {
    /// Create an entity entry from its attribute values.
    pub fn entity<I, D>(values: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<Datum>,
    {
        Self {
            payload: Payload::Entity(values.into_iter().map(Into::into).collect()),
            version: None,
        }
    }

    /// Create a collection entry from its element identifiers.
    pub fn collection<I, D>(elements: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<Identifier>,
    {
        Self {
            payload: Payload::Collection(elements.into_iter().map(Into::into).collect()),
            version: None,
        }
    }

    /// Attach a version to the entry.
    pub fn with_version(mut self, version: impl Into<Version>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Attach `version` if present, keeping the current one otherwise.
    pub fn versioned(mut self, version: Option<Version>) -> Self {
        if version.is_some() {
            self.version = version;
        }
        self
    }

    /// Payload of the entry.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Version of the entry, absent for unversioned entities and collections.
    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    /// Attribute values, if the entry holds an entity.
    pub fn values(&self) -> Option<&[Datum]> {
        match &self.payload {
            Payload::Entity(values) => Some(values),
            Payload::Collection(_) => None,
        }
    }

    /// Element identifiers, if the entry holds a collection.
    pub fn elements(&self) -> Option<&[Identifier]> {
        match &self.payload {
            Payload::Entity(_) => None,
            Payload::Collection(elements) => Some(elements),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_ordering() {
        assert!(Version::from(2).is_newer_than(&Version::from(1)));
        assert!(!Version::from(1).is_newer_than(&Version::from(1)));
        assert!(!Version::from(0).is_newer_than(&Version::from(1)));

        let ts = Version::from(Timestamp::from_millis(10));
        assert!(ts.is_newer_than(&Version::from(Timestamp::from_millis(9))));
        assert!(!ts.is_newer_than(&Version::from(1)));
        assert!(!Version::from(100).is_newer_than(&ts));
    }

    #[test]
    fn test_supersedes() {
        let v1 = Version::from(1);
        let v2 = Version::from(2);
        assert!(Version::supersedes(None, None));
        assert!(Version::supersedes(Some(&v1), None));
        assert!(!Version::supersedes(None, Some(&v1)));
        assert!(Version::supersedes(Some(&v2), Some(&v1)));
        assert!(!Version::supersedes(Some(&v1), Some(&v2)));
        assert!(!Version::supersedes(Some(&v1), Some(&v1)));
    }

    #[test]
    fn test_entry_accessors() {
        let entry = CacheEntry::entity(["Alice", "alice@example.com"]).with_version(3);
        assert_eq!(entry.values().unwrap().len(), 2);
        assert_eq!(entry.values().unwrap()[0], Datum::from("Alice"));
        assert!(entry.elements().is_none());
        assert_eq!(entry.version(), Some(&Version::Number(3)));

        let entry = CacheEntry::collection([1, 2, 3]);
        assert_eq!(
            entry.elements().unwrap(),
            &[Identifier::from(1), Identifier::from(2), Identifier::from(3)]
        );
        assert!(entry.version().is_none());

        let kept = entry.clone().versioned(None);
        assert_eq!(kept, entry);
        assert_eq!(entry.versioned(Some(Version::from(9))).version(), Some(&Version::Number(9)));
    }
}
