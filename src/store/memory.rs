//! In-process store for tests and single-node deployments.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::{DashMap, mapref::entry::Entry};

use super::{AssemblyRecord, AssemblyStatus, TruthStore};
use crate::{Result, TruthError, metrics::IngestOutcome};

type Slot = Arc<Mutex<AssemblyRecord>>;

/// Concurrent map of partial assemblies.
///
/// Each code owns its own lock, so ingests for one code are serialised while
/// distinct codes never wait on each other. Expired records are dropped
/// lazily when touched and eagerly by [`purge_expired`](TruthStore::purge_expired).
///
/// ```
/// use std::time::Duration;
///
/// use truthframe::store::{MemoryStore, TruthStore};
///
/// let store = MemoryStore::with_ttl(Some(Duration::from_secs(60)));
/// let (_, status) = store.ingest("DEMO", 2, 2, "cd").expect("ingest");
/// assert_eq!(status.missing, [1]);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, Slot>,
    ttl: Option<TimeDelta>,
}

impl MemoryStore {
    /// Store whose records never expire.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Store whose records expire `ttl` after creation.
    ///
    /// `None`, a zero duration or one too large to represent disables
    /// expiry.
    #[must_use]
    pub fn with_ttl(ttl: Option<Duration>) -> Self {
        let ttl = ttl
            .filter(|ttl| !ttl.is_zero())
            .and_then(|ttl| TimeDelta::from_std(ttl).ok());
        Self {
            records: DashMap::new(),
            ttl,
        }
    }

    /// Number of live records, expired ones included until purged.
    #[must_use]
    pub fn len(&self) -> usize { self.records.len() }

    /// True when no record is held.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    fn is_expired(&self, record: &AssemblyRecord, now: DateTime<Utc>) -> bool {
        self.ttl
            .is_some_and(|ttl| now.signed_duration_since(record.created_at) >= ttl)
    }

    /// Live slot for `code`, dropping it first if it has expired.
    fn live_slot(&self, code: &str, now: DateTime<Utc>) -> Option<Slot> {
        let slot = self.records.get(code).map(|entry| Arc::clone(entry.value()))?;
        if self.is_expired(&lock(&slot), now) {
            self.remove_if_expired(code, now);
            return None;
        }
        Some(slot)
    }

    fn remove_if_expired(&self, code: &str, now: DateTime<Utc>) -> bool {
        let removed = self
            .records
            .remove_if(code, |_, slot| self.is_expired(&lock(slot), now))
            .is_some();
        if removed {
            log::debug!("expired assembly record for {code}");
        }
        removed
    }

    /// Run `apply` on the live record for `code`, creating it with `total`
    /// when absent or expired.
    ///
    /// The map entry stays locked until `apply` returns.
    fn with_record<T>(
        &self,
        code: &str,
        total: u32,
        now: DateTime<Utc>,
        apply: impl FnOnce(&mut AssemblyRecord) -> Result<T>,
    ) -> Result<T> {
        let fresh = || {
            log::debug!("created assembly record for {code} expecting {total} fragment(s)");
            Arc::new(Mutex::new(AssemblyRecord::new(total, now)))
        };
        let mut entry = match self.records.entry(code.to_owned()) {
            Entry::Occupied(entry) => entry.into_ref(),
            Entry::Vacant(entry) => entry.insert(fresh()),
        };
        if self.is_expired(&lock(entry.value()), now) {
            log::debug!("expired assembly record for {code}");
            *entry.value_mut() = fresh();
        }
        let mut record = lock(entry.value());
        apply(&mut record)
    }

    /// [`TruthStore::get`] evaluated at `now`.
    #[must_use]
    pub fn get_at(&self, code: &str, now: DateTime<Utc>) -> Option<AssemblyRecord> {
        self.live_slot(code, now).map(|slot| lock(&slot).clone())
    }

    /// [`TruthStore::create_or_get`] evaluated at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::TotalConflict`] when the live record expects a
    /// different total.
    pub fn create_or_get_at(
        &self,
        code: &str,
        total: u32,
        now: DateTime<Utc>,
    ) -> Result<AssemblyRecord> {
        self.with_record(code, total, now, |record| {
            record.check_total(code, total)?;
            Ok(record.clone())
        })
    }

    /// [`TruthStore::put_fragment`] evaluated at `now`.
    ///
    /// # Errors
    ///
    /// See [`TruthStore::put_fragment`].
    pub fn put_fragment_at(
        &self,
        code: &str,
        index: u32,
        fragment: &str,
        now: DateTime<Utc>,
    ) -> Result<IngestOutcome> {
        let missing = || TruthError::MissingRecord {
            code: code.to_owned(),
        };
        let entry = self.records.get(code).ok_or_else(missing)?;
        if self.is_expired(&lock(entry.value()), now) {
            drop(entry);
            self.remove_if_expired(code, now);
            return Err(missing());
        }
        let mut record = lock(entry.value());
        record.insert(code, index, fragment)
    }

    /// [`TruthStore::ingest`] evaluated at `now`, holding the code's entry
    /// for the whole operation.
    ///
    /// # Errors
    ///
    /// See [`TruthStore::ingest`].
    pub fn ingest_at(
        &self,
        code: &str,
        index: u32,
        total: u32,
        fragment: &str,
        now: DateTime<Utc>,
    ) -> Result<(IngestOutcome, AssemblyStatus)> {
        self.with_record(code, total, now, |record| {
            record.check_total(code, total)?;
            let outcome = record.insert(code, index, fragment)?;
            Ok((outcome, record.status(code)))
        })
    }

    /// Drop every record expired at `now`.
    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let before = self.records.len();
        self.records
            .retain(|_, slot| !self.is_expired(&lock(slot), now));
        let purged = before.saturating_sub(self.records.len());
        if purged > 0 {
            log::debug!("purged {purged} expired assembly record(s)");
        }
        purged
    }
}

impl TruthStore for MemoryStore {
    fn get(&self, code: &str) -> Result<Option<AssemblyRecord>> { Ok(self.get_at(code, Utc::now())) }

    fn create_or_get(&self, code: &str, total: u32) -> Result<AssemblyRecord> {
        self.create_or_get_at(code, total, Utc::now())
    }

    fn put_fragment(&self, code: &str, index: u32, fragment: &str) -> Result<IngestOutcome> {
        self.put_fragment_at(code, index, fragment, Utc::now())
    }

    fn forget(&self, code: &str) -> Result<()> {
        if self.records.remove(code).is_some() {
            log::debug!("forgot assembly record for {code}");
        }
        Ok(())
    }

    fn purge_expired(&self) -> Result<usize> { Ok(self.purge_expired_at(Utc::now())) }

    fn ingest(
        &self,
        code: &str,
        index: u32,
        total: u32,
        fragment: &str,
    ) -> Result<(IngestOutcome, AssemblyStatus)> {
        self.ingest_at(code, index, total, fragment, Utc::now())
    }
}

/// Lock a record, recovering the data if a previous holder panicked.
fn lock(slot: &Mutex<AssemblyRecord>) -> MutexGuard<'_, AssemblyRecord> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
