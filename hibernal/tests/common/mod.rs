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


//! Shared fixtures for the integration tests: an in-memory database and cache nodes that read through it.

#![expect(dead_code)]

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use hashbrown::HashMap;
use hibernal::prelude::*;
use parking_lot::Mutex;

pub const PERSON: &str = "com.example.Person";
pub const CONTACTS: &str = "com.example.Customer.contacts";

/// A committed row of the mock database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub name: String,
    pub version: i64,
}

/// The source of truth behind the cache. Every method observes committed state only.
#[derive(Debug, Default)]
pub struct MockDatabase {
    rows: Mutex<HashMap<i64, Row>>,
    contacts: Mutex<HashMap<i64, Vec<i64>>>,
}

impl MockDatabase {
    pub fn insert(&self, id: i64, name: &str) -> Row {
        let row = Row {
            name: name.to_string(),
            version: 1,
        };
        self.rows.lock().insert(id, row.clone());
        row
    }

    pub fn load(&self, id: i64) -> Option<Row> {
        self.rows.lock().get(&id).cloned()
    }

    /// Commit a new name, bumping the version. Returns the previous and the new row.
    pub fn update(&self, id: i64, name: &str) -> (Row, Row) {
        let mut rows = self.rows.lock();
        let previous = rows.get(&id).cloned().unwrap_or(Row {
            name: String::new(),
            version: 0,
        });
        let row = Row {
            name: name.to_string(),
            version: previous.version + 1,
        };
        rows.insert(id, row.clone());
        (previous, row)
    }

    pub fn delete(&self, id: i64) -> Option<Row> {
        self.rows.lock().remove(&id)
    }

    pub fn add_contact(&self, customer: i64, contact: i64) -> Vec<i64> {
        let mut contacts = self.contacts.lock();
        let list = contacts.entry(customer).or_default();
        list.push(contact);
        list.clone()
    }

    pub fn remove_contact(&self, customer: i64, contact: i64) -> Vec<i64> {
        let mut contacts = self.contacts.lock();
        let list = contacts.entry(customer).or_default();
        list.retain(|c| *c != contact);
        list.clone()
    }

    pub fn contacts(&self, customer: i64) -> Vec<i64> {
        self.contacts.lock().get(&customer).cloned().unwrap_or_default()
    }
}

pub fn person_key(id: i64) -> CacheKey {
    CacheKey::new(PERSON, id)
}

pub fn contacts_key(customer: i64) -> CacheKey {
    CacheKey::new(CONTACTS, customer)
}

pub fn person_entry(row: &Row) -> CacheEntry {
    CacheEntry::entity([row.name.as_str()])
}

pub fn row_of(entry: &CacheEntry) -> Option<Row> {
    match (entry.values(), entry.version()) {
        (Some([Datum::Text(name)]), Some(Version::Number(version))) => Some(Row {
            name: name.to_string(),
            version: *version,
        }),
        _ => None,
    }
}

pub fn contacts_of(entry: &CacheEntry) -> Vec<i64> {
    entry
        .elements()
        .unwrap_or_default()
        .iter()
        .filter_map(|id| match id {
            Identifier::Int(id) => Some(*id),
            _ => None,
        })
        .collect()
}

/// One application node: a cache manager in front of the shared database.
///
/// A node without a cache reads and writes the database directly.
#[derive(Debug)]
pub struct Node {
    pub manager: CacheInstanceManager,
    pub persons: Option<AccessStrategy>,
    pub contacts: Option<AccessStrategy>,
    pub db: Arc<MockDatabase>,
}

impl Node {
    pub fn start(cluster: &Cluster, clock: &Arc<ManualClock>, access: AccessType, db: &Arc<MockDatabase>) -> Self {
        let config = CacheConfig {
            lock_timeout_ms: 3_600_000,
            ..Default::default()
        };
        let manager = CacheInstanceManager::builder()
            .with_region_prefix("test")
            .with_config(config)
            .with_default_access(access)
            .with_cluster(cluster.clone())
            .with_clock(clock.clone())
            .start()
            .unwrap();
        let persons = Some(manager.access_strategy(PERSON).unwrap());
        let contacts = Some(manager.access_strategy(CONTACTS).unwrap());
        Self {
            manager,
            persons,
            contacts,
            db: db.clone(),
        }
    }

    pub fn start_without_cache(clock: &Arc<ManualClock>, db: &Arc<MockDatabase>) -> Self {
        let manager = CacheInstanceManager::builder()
            .with_clock(clock.clone())
            .start()
            .unwrap();
        Self {
            manager,
            persons: None,
            contacts: None,
            db: db.clone(),
        }
    }

    pub fn insert(&self, id: i64, name: &str) {
        let tx = self.manager.begin();
        let row = self.db.insert(id, name);
        let version = Some(Version::from(row.version));
        if let Some(persons) = &self.persons {
            persons.insert(&tx, &person_key(id), person_entry(&row), version).unwrap();
        }
        tx.commit().unwrap();
        if let Some(persons) = &self.persons {
            persons.after_insert(&person_key(id), person_entry(&row), version).unwrap();
        }
    }

    /// Read through the cache, loading from the database on a miss.
    pub fn read(&self, id: i64) -> Option<Row> {
        let Some(persons) = &self.persons else {
            return self.db.load(id);
        };
        if let Some(row) = persons.get(&person_key(id)).unwrap().as_ref().and_then(row_of) {
            return Some(row);
        }
        let tx = self.manager.begin();
        let row = self.db.load(id)?;
        persons
            .put_from_load(&tx, &person_key(id), person_entry(&row), Some(Version::from(row.version)), false)
            .unwrap();
        tx.commit().unwrap();
        Some(row)
    }

    /// Read only what the cache holds.
    pub fn cached(&self, id: i64) -> Option<Row> {
        self.persons
            .as_ref()
            .and_then(|persons| persons.get(&person_key(id)).unwrap())
            .as_ref()
            .and_then(row_of)
    }

    pub fn update(&self, id: i64, name: &str) -> Row {
        let Some(persons) = &self.persons else {
            return self.db.update(id, name).1;
        };
        let key = person_key(id);
        let tx = self.manager.begin();
        let seen = self.db.load(id).map(|row| Version::from(row.version));
        let handle = persons.lock_item(&tx, &key, seen).unwrap();
        let next = Version::from(seen.map_or(1, |v| match v {
            Version::Number(n) => n + 1,
            Version::Timestamp(_) => 1,
        }));
        persons
            .update(&tx, &key, CacheEntry::entity([name]), Some(next), seen)
            .unwrap();
        let (previous, row) = self.db.update(id, name);
        tx.commit().unwrap();
        persons
            .after_update(
                &key,
                person_entry(&row),
                Some(Version::from(row.version)),
                Some(Version::from(previous.version)),
                handle,
            )
            .unwrap();
        row
    }

    /// Delete a row under a soft lock, releasing it once the delete committed.
    pub fn delete(&self, id: i64) {
        let Some(persons) = &self.persons else {
            self.db.delete(id);
            return;
        };
        let key = person_key(id);
        let tx = self.manager.begin();
        let seen = self.db.load(id).map(|row| Version::from(row.version));
        let handle = persons.lock_item(&tx, &key, seen).unwrap();
        persons.remove(&tx, &key).unwrap();
        self.db.delete(id);
        tx.commit().unwrap();
        persons.unlock_item(&key, handle).unwrap();
    }

    pub fn add_contact(&self, customer: i64, contact: i64) -> Vec<i64> {
        self.write_contacts(customer, |db| db.add_contact(customer, contact))
    }

    pub fn remove_contact(&self, customer: i64, contact: i64) -> Vec<i64> {
        self.write_contacts(customer, |db| db.remove_contact(customer, contact))
    }

    /// Rewrite a contact collection under a soft lock and publish the new list after commit.
    fn write_contacts(&self, customer: i64, write: impl FnOnce(&MockDatabase) -> Vec<i64>) -> Vec<i64> {
        let Some(contacts) = &self.contacts else {
            return write(&self.db);
        };
        let key = contacts_key(customer);
        let tx = self.manager.begin();
        let handle = contacts.lock_item(&tx, &key, None).unwrap();
        let list = write(&self.db);
        let entry = CacheEntry::collection(list.iter().copied());
        contacts.update(&tx, &key, entry.clone(), None, None).unwrap();
        tx.commit().unwrap();
        contacts.after_update(&key, entry, None, None, handle).unwrap();
        list
    }

    pub fn read_contacts(&self, customer: i64) -> Vec<i64> {
        let Some(contacts) = &self.contacts else {
            return self.db.contacts(customer);
        };
        let key = contacts_key(customer);
        if let Some(entry) = contacts.get(&key).unwrap() {
            return contacts_of(&entry);
        }
        let tx = self.manager.begin();
        let list = self.db.contacts(customer);
        contacts
            .put_from_load(&tx, &key, CacheEntry::collection(list.iter().copied()), None, false)
            .unwrap();
        tx.commit().unwrap();
        list
    }

    /// Drop the cached state of `id` and read it again.
    pub fn refresh(&self, id: i64) -> Option<Row> {
        if let Some(persons) = &self.persons {
            persons.evict(&person_key(id)).unwrap();
        }
        self.read(id)
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        if let Err(e) = self.manager.stop() {
            tracing::warn!("[test]: stopping node failed: {e}");
        }
    }
}

/// Cooperative cancellation shared by the threads of a test.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
