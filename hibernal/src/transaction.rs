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
    sync::atomic::{AtomicU64, Ordering},
};

use hibernal_common::{
    clock::{Clock, Timestamp},
    error::Result,
};
use hibernal_region::lock::LockOwner;
use parking_lot::Mutex;

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of a [`Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(u64);

impl From<TransactionId> for LockOwner {
    fn from(id: TransactionId) -> Self {
        LockOwner::new(id.0)
    }
}

/// How a transaction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The transaction committed.
    Committed,
    /// The transaction rolled back.
    RolledBack,
}

/// A hook run once when a transaction completes.
pub trait Synchronization: Send + 'static {
    /// Called exactly once with the outcome of the transaction.
    fn after_completion(self: Box<Self>, outcome: Outcome) -> Result<()>;
}

impl<F> Synchronization for F
where
    F: FnOnce(Outcome) -> Result<()> + Send + 'static,
{
    fn after_completion(self: Box<Self>, outcome: Outcome) -> Result<()> {
        (*self)(outcome)
    }
}

/// The boundary of one unit of database work.
///
/// The transaction timestamp is taken at [`Transaction::begin`]. Puts-from-load issued inside the transaction use it
/// to decide whether their loaded state may be older than a concurrent writer's.
///
/// Dropping an uncompleted transaction rolls it back, so registered hooks run on every exit path.
pub struct Transaction {
    id: TransactionId,
    timestamp: Timestamp,
    synchronizations: Mutex<Vec<Box<dyn Synchronization>>>,
    completed: bool,
}

impl Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("timestamp", &self.timestamp)
            .field("synchronizations", &self.synchronizations.lock().len())
            .field("completed", &self.completed)
            .finish()
    }
}

impl Transaction {
    /// Begin a transaction stamped by `clock`.
    pub fn begin(clock: &dyn Clock) -> Self {
        Self {
            id: TransactionId(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed)),
            timestamp: clock.now(),
            synchronizations: Mutex::new(vec![]),
            completed: false,
        }
    }

    /// Id of the transaction.
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Start timestamp of the transaction.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Lock owner marker of the transaction.
    pub fn owner(&self) -> LockOwner {
        self.id.into()
    }

    /// Register a hook to run when the transaction completes.
    pub fn register(&self, synchronization: impl Synchronization) {
        self.synchronizations.lock().push(Box::new(synchronization));
    }

    /// Commit the transaction, running every hook with [`Outcome::Committed`].
    pub fn commit(mut self) -> Result<()> {
        self.complete(Outcome::Committed)
    }

    /// Roll the transaction back, running every hook with [`Outcome::RolledBack`].
    pub fn rollback(mut self) -> Result<()> {
        self.complete(Outcome::RolledBack)
    }

    /// Run every hook in registration order. All hooks run even if one fails, the first failure is returned.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "hibernal::transaction::complete"))]
    fn complete(&mut self, outcome: Outcome) -> Result<()> {
        self.completed = true;
        let synchronizations = std::mem::take(&mut *self.synchronizations.lock());
        tracing::trace!(
            "[transaction]: {:?} completed as {outcome:?}, {} hooks",
            self.id,
            synchronizations.len()
        );

        let mut first = None;
        for synchronization in synchronizations {
            if let Err(e) = synchronization.after_completion(outcome) {
                tracing::warn!("[transaction]: {:?} hook failed after {outcome:?}: {e}", self.id);
                first.get_or_insert(e);
            }
        }
        match first {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.completed {
            if let Err(e) = self.complete(Outcome::RolledBack) {
                tracing::warn!("[transaction]: implicit rollback of {:?} failed: {e}", self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use hibernal_common::{
        clock::ManualClock,
        error::{Error, ErrorKind},
    };

    use super::*;

    fn is_send_sync_static<T: Send + Sync + 'static>() {}

    #[test]
    fn test_send_sync_static() {
        is_send_sync_static::<Transaction>();
    }

    fn recorder(outcomes: &Arc<Mutex<Vec<Outcome>>>) -> impl Synchronization {
        let outcomes = outcomes.clone();
        move |outcome: Outcome| -> Result<()> {
            outcomes.lock().push(outcome);
            Ok(())
        }
    }

    #[test]
    fn test_commit_and_rollback() {
        let clock = ManualClock::default();
        let outcomes = Arc::new(Mutex::new(vec![]));

        let tx = Transaction::begin(&clock);
        tx.register(recorder(&outcomes));
        tx.register(recorder(&outcomes));
        tx.commit().unwrap();
        assert_eq!(*outcomes.lock(), vec![Outcome::Committed, Outcome::Committed]);

        outcomes.lock().clear();
        let tx = Transaction::begin(&clock);
        tx.register(recorder(&outcomes));
        tx.rollback().unwrap();
        assert_eq!(*outcomes.lock(), vec![Outcome::RolledBack]);
    }

    #[test]
    fn test_drop_rolls_back() {
        let clock = ManualClock::default();
        let outcomes = Arc::new(Mutex::new(vec![]));
        {
            let tx = Transaction::begin(&clock);
            tx.register(recorder(&outcomes));
        }
        assert_eq!(*outcomes.lock(), vec![Outcome::RolledBack]);
    }

    #[test]
    fn test_hooks_run_once_despite_failures() {
        let clock = ManualClock::default();
        let runs = Arc::new(AtomicUsize::new(0));

        let tx = Transaction::begin(&clock);
        for _ in 0..3 {
            let runs = runs.clone();
            tx.register(move |_: Outcome| -> Result<()> {
                runs.fetch_add(1, Ordering::Relaxed);
                Err(Error::new(ErrorKind::Unsupported, "boom"))
            });
        }
        let err = tx.commit().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert_eq!(runs.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_timestamps_increase() {
        let clock = ManualClock::default();
        let a = Transaction::begin(&clock);
        let b = Transaction::begin(&clock);
        assert!(a.timestamp() < b.timestamp());
        assert_ne!(a.id(), b.id());
        assert_ne!(a.owner(), b.owner());
    }
}
