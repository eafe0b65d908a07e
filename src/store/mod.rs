//! Persistence of in-progress reassembly state.
//!
//! A [`TruthStore`] owns one [`AssemblyRecord`] per code. Backends must make
//! the create-or-validate step and the fragment insert for one code atomic
//! with respect to each other, while leaving distinct codes independent.
//! [`MemoryStore`] does this with a per-code lock; [`RedisStore`] runs both
//! steps as one server-side script.

mod memory;
mod purge;
#[cfg(feature = "redis")]
mod redis;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use self::{memory::MemoryStore, purge::spawn_purger};
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;
use crate::{Result, TruthError, metrics::IngestOutcome};

/// Partial assembly for one code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssemblyRecord {
    /// Fragment count fixed by the first ingest.
    pub total: u32,
    /// Received fragments keyed by 1-based index.
    pub fragments: BTreeMap<u32, String>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl AssemblyRecord {
    /// Empty record expecting `total` fragments.
    #[must_use]
    pub fn new(total: u32, created_at: DateTime<Utc>) -> Self {
        Self {
            total,
            fragments: BTreeMap::new(),
            created_at,
        }
    }

    /// Indices in `1..=total` without a fragment, ascending.
    #[must_use]
    pub fn missing(&self) -> Vec<u32> {
        (1..=self.total)
            .filter(|index| !self.fragments.contains_key(index))
            .collect()
    }

    /// True once every index holds a fragment.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        (1..=self.total).all(|index| self.fragments.contains_key(&index))
    }

    /// Derived progress snapshot.
    #[must_use]
    pub fn status(&self, code: &str) -> AssemblyStatus {
        let missing = self.missing();
        AssemblyStatus {
            code: code.to_owned(),
            total: self.total,
            received: self.fragments.len(),
            complete: missing.is_empty(),
            missing,
        }
    }

    /// Fragments concatenated in index order, once complete.
    #[must_use]
    pub fn packed(&self) -> Option<String> {
        self.is_complete()
            .then(|| (1..=self.total).filter_map(|i| self.fragments.get(&i)).map(String::as_str).collect())
    }

    /// Fail with [`TruthError::TotalConflict`] unless `total` matches.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::TotalConflict`] on mismatch.
    pub fn check_total(&self, code: &str, total: u32) -> Result<()> {
        if self.total == total {
            return Ok(());
        }
        Err(TruthError::TotalConflict {
            code: code.to_owned(),
            expected: self.total,
            found: total,
        })
    }

    /// Store `fragment` at `index`.
    ///
    /// Re-inserting the same value is a no-op reported as
    /// [`IngestOutcome::Duplicate`].
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::InvalidIndexTotal`] for an index outside
    /// `1..=total` and [`TruthError::FragmentConflict`] when the index
    /// already holds a different value.
    pub fn insert(&mut self, code: &str, index: u32, fragment: &str) -> Result<IngestOutcome> {
        if index < 1 || index > self.total {
            return Err(TruthError::InvalidIndexTotal {
                index: u64::from(index),
                total: u64::from(self.total),
            });
        }
        match self.fragments.get(&index) {
            Some(existing) if existing == fragment => Ok(IngestOutcome::Duplicate),
            Some(_) => Err(TruthError::FragmentConflict {
                code: code.to_owned(),
                index,
            }),
            None => {
                self.fragments.insert(index, fragment.to_owned());
                Ok(IngestOutcome::Accepted)
            }
        }
    }
}

/// Progress snapshot for one code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AssemblyStatus {
    /// Document code.
    pub code: String,
    /// Expected fragment count.
    pub total: u32,
    /// Number of distinct indices received.
    pub received: usize,
    /// Indices still missing, ascending.
    pub missing: Vec<u32>,
    /// True when nothing is missing.
    pub complete: bool,
}

/// Key-value persistence of partial assemblies, keyed by code.
pub trait TruthStore: Send + Sync {
    /// Current record for `code`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::Backend`] when the backend fails.
    fn get(&self, code: &str) -> Result<Option<AssemblyRecord>>;

    /// Return the record for `code`, creating it with `total` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::TotalConflict`] if an existing record expects a
    /// different total.
    fn create_or_get(&self, code: &str, total: u32) -> Result<AssemblyRecord>;

    /// Store one fragment in the existing record for `code`.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::MissingRecord`] without a record,
    /// [`TruthError::InvalidIndexTotal`] for an out-of-range index and
    /// [`TruthError::FragmentConflict`] for a different value at a filled
    /// index.
    fn put_fragment(&self, code: &str, index: u32, fragment: &str) -> Result<IngestOutcome>;

    /// Destroy the record for `code`. Unknown codes are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::Backend`] when the backend fails.
    fn forget(&self, code: &str) -> Result<()>;

    /// Drop every record whose TTL has elapsed and return how many went.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::Backend`] when the backend fails.
    fn purge_expired(&self) -> Result<usize>;

    /// Progress for `code`, or `None` when no record exists.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::Backend`] when the backend fails.
    fn status(&self, code: &str) -> Result<Option<AssemblyStatus>> {
        Ok(self.get(code)?.map(|record| record.status(code)))
    }

    /// Create-or-validate the record and store one fragment.
    ///
    /// The default runs [`create_or_get`](Self::create_or_get) and
    /// [`put_fragment`](Self::put_fragment) back to back; backends that can
    /// do both atomically override it.
    ///
    /// # Errors
    ///
    /// Any error of the two underlying operations.
    fn ingest(
        &self,
        code: &str,
        index: u32,
        total: u32,
        fragment: &str,
    ) -> Result<(IngestOutcome, AssemblyStatus)> {
        self.create_or_get(code, total)?;
        let outcome = self.put_fragment(code, index, fragment)?;
        let status = self
            .status(code)?
            .ok_or_else(|| TruthError::MissingRecord {
                code: code.to_owned(),
            })?;
        Ok((outcome, status))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::AssemblyRecord;
    use crate::{TruthError, metrics::IngestOutcome};

    #[test]
    fn status_reports_missing_indices() {
        let mut record = AssemblyRecord::new(4, Utc::now());
        record.insert("A", 3, "c").expect("insert");
        record.insert("A", 1, "a").expect("insert");
        let status = record.status("A");
        assert_eq!(status.received, 2);
        assert_eq!(status.missing, [2, 4]);
        assert!(!status.complete);
        assert_eq!(record.packed(), None);
    }

    #[test]
    fn packed_joins_in_index_order() {
        let mut record = AssemblyRecord::new(3, Utc::now());
        for (index, fragment) in [(3, "fg"), (1, "abc"), (2, "de")] {
            record.insert("A", index, fragment).expect("insert");
        }
        assert_eq!(record.packed().as_deref(), Some("abcdefg"));
        assert!(record.status("A").complete);
    }

    #[test]
    fn duplicate_is_a_no_op_and_conflict_fails() {
        let mut record = AssemblyRecord::new(2, Utc::now());
        assert_eq!(record.insert("A", 1, "x"), Ok(IngestOutcome::Accepted));
        assert_eq!(record.insert("A", 1, "x"), Ok(IngestOutcome::Duplicate));
        assert_eq!(
            record.insert("A", 1, "y"),
            Err(TruthError::FragmentConflict {
                code: "A".into(),
                index: 1,
            })
        );
        assert_eq!(record.fragments.get(&1).map(String::as_str), Some("x"));
    }

    #[test]
    fn index_outside_total_is_rejected() {
        let mut record = AssemblyRecord::new(2, Utc::now());
        assert_eq!(
            record.insert("A", 3, "x"),
            Err(TruthError::InvalidIndexTotal { index: 3, total: 2 })
        );
    }
}
