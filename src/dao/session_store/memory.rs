use std::time::SystemTime;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use indexmap::IndexMap;

use crate::dao::{
    models::{
        AnswerRecord, EnsuredLedgerEntry, LedgerEntryEntity, SessionEntity, SessionPrecondition,
    },
    session_store::SessionStore,
    storage::StorageResult,
};

type LedgerKey = (String, i64);

/// Session store kept in process memory.
///
/// Each map shard lock plays the role of the database's single-document atomicity, so the
/// compare-and-set and create-if-absent semantics match the MongoDB backend within one process.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, SessionEntity>,
    join_codes: DashMap<String, String>,
    ledgers: DashMap<LedgerKey, IndexMap<i64, LedgerEntryEntity>>,
}

impl InMemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn compare_and_swap_now(&self, expected: SessionPrecondition, next: SessionEntity) -> bool {
        let Some(mut current) = self.sessions.get_mut(&next.session_id) else {
            return false;
        };

        if current.precondition() != expected {
            return false;
        }

        *current = next;
        true
    }

    fn record_answer_now(
        &self,
        key: LedgerKey,
        player_id: i64,
        question_index: i32,
        correct: bool,
    ) -> AnswerRecord {
        let Some(mut ledger) = self.ledgers.get_mut(&key) else {
            return AnswerRecord::MissingEntry;
        };
        let Some(entry) = ledger.get_mut(&player_id) else {
            return AnswerRecord::MissingEntry;
        };

        if entry.last_submitted_index >= question_index {
            return AnswerRecord::Duplicate;
        }

        if correct {
            entry.correct_count += 1;
        } else {
            entry.incorrect_count += 1;
        }
        entry.last_submitted_index = question_index;
        AnswerRecord::Recorded(entry.clone())
    }
}

impl SessionStore for InMemorySessionStore {
    fn find_session(
        &self,
        session_id: &str,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let session = self.sessions.get(session_id).map(|entry| entry.clone());
        Box::pin(async move { Ok(session) })
    }

    fn find_session_by_code(
        &self,
        join_code: &str,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let session_id = self.join_codes.get(join_code).map(|entry| entry.clone());
        let session = session_id
            .and_then(|id| self.sessions.get(&id).map(|entry| entry.clone()))
            .filter(|session| session.join_code.as_deref() == Some(join_code));
        Box::pin(async move { Ok(session) })
    }

    fn create_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let inserted = match self.sessions.entry(session.session_id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(session);
                true
            }
        };
        Box::pin(async move { Ok(inserted) })
    }

    fn compare_and_swap(
        &self,
        expected: SessionPrecondition,
        next: SessionEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let swapped = self.compare_and_swap_now(expected, next);
        Box::pin(async move { Ok(swapped) })
    }

    fn reserve_join_code(
        &self,
        join_code: &str,
        session_id: &str,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let reserved = match self.join_codes.entry(join_code.to_owned()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(session_id.to_owned());
                true
            }
        };
        Box::pin(async move { Ok(reserved) })
    }

    fn release_join_code(
        &self,
        join_code: &str,
        session_id: &str,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.join_codes
            .remove_if(join_code, |_, holder| holder == session_id);
        Box::pin(async move { Ok(()) })
    }

    fn ensure_ledger_entry(
        &self,
        entry: LedgerEntryEntity,
    ) -> BoxFuture<'static, StorageResult<EnsuredLedgerEntry>> {
        let key = (entry.session_id.clone(), entry.run);
        let mut ledger = self.ledgers.entry(key).or_default();
        let ensured = match ledger.get(&entry.player_id) {
            Some(existing) => EnsuredLedgerEntry {
                entry: existing.clone(),
                created: false,
            },
            None => {
                let created = LedgerEntryEntity {
                    joined_at: SystemTime::now(),
                    ..entry
                };
                ledger.insert(created.player_id, created.clone());
                EnsuredLedgerEntry {
                    entry: created,
                    created: true,
                }
            }
        };
        drop(ledger);
        Box::pin(async move { Ok(ensured) })
    }

    fn record_answer(
        &self,
        session_id: &str,
        run: i64,
        player_id: i64,
        question_index: i32,
        correct: bool,
    ) -> BoxFuture<'static, StorageResult<AnswerRecord>> {
        let record =
            self.record_answer_now((session_id.to_owned(), run), player_id, question_index, correct);
        Box::pin(async move { Ok(record) })
    }

    fn list_ledger_entries(
        &self,
        session_id: &str,
        run: i64,
    ) -> BoxFuture<'static, StorageResult<Vec<LedgerEntryEntity>>> {
        let entries = self
            .ledgers
            .get(&(session_id.to_owned(), run))
            .map(|ledger| ledger.values().cloned().collect())
            .unwrap_or_default();
        Box::pin(async move { Ok(entries) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::QuestionEntity;

    fn live_session() -> SessionEntity {
        SessionEntity {
            questions: vec![
                QuestionEntity {
                    prompt: "first".into(),
                    options: vec!["a".into(), "b".into()],
                    correct_option_index: 0,
                },
                QuestionEntity {
                    prompt: "second".into(),
                    options: vec!["a".into(), "b".into()],
                    correct_option_index: 1,
                },
            ],
            is_live: true,
            current_index: 0,
            run: 1,
            version: 3,
            ..SessionEntity::idle("quiz".into(), 7)
        }
    }

    #[tokio::test]
    async fn compare_and_swap_rejects_stale_precondition() {
        let store = InMemorySessionStore::new();
        let session = live_session();
        assert!(store.create_session(session.clone()).await.unwrap());

        let expected = session.precondition();
        let next = SessionEntity {
            current_index: 1,
            version: session.version + 1,
            ..session.clone()
        };

        assert!(store.compare_and_swap(expected, next.clone()).await.unwrap());
        assert!(!store.compare_and_swap(expected, next).await.unwrap());

        let stored = store.find_session("quiz").await.unwrap().unwrap();
        assert_eq!(stored.current_index, 1);
        assert_eq!(stored.version, 4);
    }

    #[tokio::test]
    async fn create_session_does_not_overwrite() {
        let store = InMemorySessionStore::new();
        assert!(store.create_session(live_session()).await.unwrap());
        assert!(
            !store
                .create_session(SessionEntity::idle("quiz".into(), 99))
                .await
                .unwrap()
        );
        let stored = store.find_session("quiz").await.unwrap().unwrap();
        assert_eq!(stored.owner_id, 7);
    }

    #[tokio::test]
    async fn join_codes_are_exclusive_until_released() {
        let store = InMemorySessionStore::new();
        assert!(store.reserve_join_code("1234", "a").await.unwrap());
        assert!(!store.reserve_join_code("1234", "b").await.unwrap());

        store.release_join_code("1234", "b").await.unwrap();
        assert!(!store.reserve_join_code("1234", "b").await.unwrap());

        store.release_join_code("1234", "a").await.unwrap();
        assert!(store.reserve_join_code("1234", "b").await.unwrap());
    }

    #[tokio::test]
    async fn ledger_entry_is_created_once_and_counts_once_per_index() {
        let store = InMemorySessionStore::new();
        let session = live_session();

        let first = store
            .ensure_ledger_entry(LedgerEntryEntity::new(&session, 42))
            .await
            .unwrap();
        assert!(first.created);

        let recorded = store.record_answer("quiz", 1, 42, 0, true).await.unwrap();
        assert!(matches!(recorded, AnswerRecord::Recorded(ref e) if e.correct_count == 1));

        let again = store
            .ensure_ledger_entry(LedgerEntryEntity::new(&session, 42))
            .await
            .unwrap();
        assert!(!again.created);
        assert_eq!(again.entry.correct_count, 1);

        assert_eq!(
            store.record_answer("quiz", 1, 42, 0, true).await.unwrap(),
            AnswerRecord::Duplicate
        );
        assert_eq!(
            store.record_answer("quiz", 1, 43, 0, true).await.unwrap(),
            AnswerRecord::MissingEntry
        );
        assert_eq!(
            store.record_answer("quiz", 2, 42, 0, true).await.unwrap(),
            AnswerRecord::MissingEntry
        );

        let entries = store.list_ledger_entries("quiz", 1).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].correct_count, 1);
        assert_eq!(entries[0].incorrect_count, 0);
    }
}
