//! Per-request change accumulation and sync-mode classification.

use crate::error::{ProfileError, Result};
use crate::types::{ChangeRecord, Revision};

/// Ordered log of the mutations made during the current request.
///
/// Every mutating profile method appends exactly one record here; the log
/// is the sole source of truth for the diff sent back to the client, and it
/// is emptied when a response is built. Nothing ever leaks into the next
/// request.
#[derive(Clone, Debug, Default)]
pub struct ChangeLog {
    pending: Vec<ChangeRecord>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, change: ChangeRecord) {
        self.pending.push(change);
    }

    /// Take the accumulated records in mutation order, leaving the log
    /// empty.
    pub fn take(&mut self) -> Vec<ChangeRecord> {
        std::mem::take(&mut self.pending)
    }

    /// Drop the accumulated records without sending them.
    pub fn discard(&mut self) {
        self.pending.clear();
    }

    pub fn records(&self) -> &[ChangeRecord] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// How a response will report the request's outcome to the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncMode {
    /// Client is caught up and nothing changed: empty diff, no revision
    /// bump.
    NoOp,
    /// Send this request's change records and advance the revision.
    Incremental,
    /// Send one full snapshot instead of incremental records.
    Full,
}

/// Decide how to answer a client that last observed `client_rvn`.
///
/// `-1` (or any negative value) is the "unknown, send everything"
/// sentinel. A stale known revision is tolerated for reads (the client is
/// resynced with a snapshot), but a mutating request on a stale revision
/// is a retryable conflict: the caller rolls the mutations back rather
/// than committing work the client computed against a view it never had.
pub fn classify(
    client_rvn: i64,
    current: Revision,
    force_full: bool,
    mutated: bool,
) -> Result<SyncMode> {
    if client_rvn >= 0 && client_rvn != current.0 as i64 && mutated {
        return Err(ProfileError::RevisionConflict {
            client: client_rvn,
            current,
        });
    }
    if force_full || client_rvn != current.0 as i64 {
        return Ok(SyncMode::Full);
    }
    if mutated {
        Ok(SyncMode::Incremental)
    } else {
        Ok(SyncMode::NoOp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ItemId, FULL_SYNC_RVN};

    #[test]
    fn test_changelog_is_request_scoped() {
        let mut log = ChangeLog::new();
        log.record(ChangeRecord::ItemRemoved {
            item_id: ItemId::generate(),
        });
        assert_eq!(log.len(), 1);
        let taken = log.take();
        assert_eq!(taken.len(), 1);
        assert!(log.is_empty());
    }

    #[test]
    fn test_caught_up_client() {
        assert_eq!(
            classify(3, Revision(3), false, false).unwrap(),
            SyncMode::NoOp
        );
        assert_eq!(
            classify(3, Revision(3), false, true).unwrap(),
            SyncMode::Incremental
        );
    }

    #[test]
    fn test_sentinel_requests_full_sync() {
        assert_eq!(
            classify(FULL_SYNC_RVN, Revision(3), false, false).unwrap(),
            SyncMode::Full
        );
        // The sentinel is not a conflict even when the request mutated.
        assert_eq!(
            classify(FULL_SYNC_RVN, Revision(3), false, true).unwrap(),
            SyncMode::Full
        );
    }

    #[test]
    fn test_stale_read_resyncs() {
        assert_eq!(
            classify(1, Revision(3), false, false).unwrap(),
            SyncMode::Full
        );
    }

    #[test]
    fn test_stale_mutation_conflicts() {
        let err = classify(1, Revision(3), false, true).unwrap_err();
        assert!(matches!(
            err,
            ProfileError::RevisionConflict {
                client: 1,
                current: Revision(3)
            }
        ));
    }

    #[test]
    fn test_force_full_overrides_caught_up() {
        assert_eq!(
            classify(3, Revision(3), true, true).unwrap(),
            SyncMode::Full
        );
        assert_eq!(
            classify(3, Revision(3), true, false).unwrap(),
            SyncMode::Full
        );
    }
}
