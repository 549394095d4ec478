/// In-process store.
pub mod memory;
/// MongoDB-backed store.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{
    AnswerRecord, EnsuredLedgerEntry, LedgerEntryEntity, SessionEntity, SessionPrecondition,
};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// Abstraction over the persistence layer for live sessions, join codes and score ledgers.
///
/// Every write that protects an invariant is a single conditional operation on the backend:
/// inserts rely on key uniqueness and session updates are compare-and-set against a
/// [`SessionPrecondition`]. Callers never rely on a read followed by an unconditional write.
pub trait SessionStore: Send + Sync {
    /// Fetch a session by id.
    fn find_session(&self, session_id: &str)
    -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    /// Fetch the session currently bound to `join_code`.
    fn find_session_by_code(
        &self,
        join_code: &str,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    /// Insert a session unless one with the same id exists; returns whether it was inserted.
    fn create_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<bool>>;
    /// Replace the session only if its stored state still matches `expected`.
    /// Returns `false` when the precondition no longer holds.
    fn compare_and_swap(
        &self,
        expected: SessionPrecondition,
        next: SessionEntity,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Reserve `join_code` for `session_id`; returns `false` when the code is already held.
    fn reserve_join_code(
        &self,
        join_code: &str,
        session_id: &str,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Release a code previously reserved by `session_id`.
    fn release_join_code(
        &self,
        join_code: &str,
        session_id: &str,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Create the ledger entry if none exists for its key, leaving an existing one untouched.
    fn ensure_ledger_entry(
        &self,
        entry: LedgerEntryEntity,
    ) -> BoxFuture<'static, StorageResult<EnsuredLedgerEntry>>;
    /// Atomically count one answer for `question_index`, at most once per index.
    fn record_answer(
        &self,
        session_id: &str,
        run: i64,
        player_id: i64,
        question_index: i32,
        correct: bool,
    ) -> BoxFuture<'static, StorageResult<AnswerRecord>>;
    /// List the ledger entries of one run in join order.
    fn list_ledger_entries(
        &self,
        session_id: &str,
        run: i64,
    ) -> BoxFuture<'static, StorageResult<Vec<LedgerEntryEntity>>>;
    /// Cheap round-trip proving the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
