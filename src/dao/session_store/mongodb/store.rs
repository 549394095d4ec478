use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::{DateTime, Document, doc},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    models::{
        MongoJoinCodeDocument, MongoLedgerDocument, MongoQuizDocument, MongoSessionDocument,
        doc_id, ledger_insert_fields, ledger_key,
    },
};
use crate::dao::{
    models::{
        AnswerRecord, EnsuredLedgerEntry, LedgerEntryEntity, QuizEntity, SessionEntity,
        SessionPrecondition,
    },
    quiz_repository::QuizRepository,
    session_store::SessionStore,
    storage::StorageResult,
};

const SESSION_COLLECTION_NAME: &str = "sessions";
const JOIN_CODE_COLLECTION_NAME: &str = "join_codes";
const LEDGER_COLLECTION_NAME: &str = "ledger_entries";
const QUIZ_COLLECTION_NAME: &str = "quizzes";

/// Sessions, join codes, ledger entries and quizzes stored in MongoDB.
#[derive(Clone)]
pub struct MongoSessionStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoSessionStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let sessions = database.collection::<mongodb::bson::Document>(SESSION_COLLECTION_NAME);
        let code_index = mongodb::IndexModel::builder()
            .keys(doc! {"join_code": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("session_join_code_idx".to_owned()))
                    .build(),
            )
            .build();
        sessions
            .create_index(code_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SESSION_COLLECTION_NAME,
                index: "join_code",
                source,
            })?;

        // One tally per (session, run, player); joins rely on it to stay create-if-absent.
        let ledger = database.collection::<mongodb::bson::Document>(LEDGER_COLLECTION_NAME);
        let ledger_index = mongodb::IndexModel::builder()
            .keys(doc! {"session_id": 1, "run": 1, "player_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("ledger_player_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        ledger
            .create_index(ledger_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: LEDGER_COLLECTION_NAME,
                index: "session_id,run,player_id",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn sessions(&self) -> Collection<MongoSessionDocument> {
        self.database()
            .await
            .collection::<MongoSessionDocument>(SESSION_COLLECTION_NAME)
    }

    async fn join_codes(&self) -> Collection<MongoJoinCodeDocument> {
        self.database()
            .await
            .collection::<MongoJoinCodeDocument>(JOIN_CODE_COLLECTION_NAME)
    }

    async fn ledger(&self) -> Collection<MongoLedgerDocument> {
        self.database()
            .await
            .collection::<MongoLedgerDocument>(LEDGER_COLLECTION_NAME)
    }

    async fn quizzes(&self) -> Collection<MongoQuizDocument> {
        self.database()
            .await
            .collection::<MongoQuizDocument>(QUIZ_COLLECTION_NAME)
    }

    async fn find_session(&self, id: String) -> MongoResult<Option<SessionEntity>> {
        let document = self
            .sessions()
            .await
            .find_one(doc_id(&id))
            .await
            .map_err(|source| MongoDaoError::LoadSession { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn find_session_by_code(&self, code: String) -> MongoResult<Option<SessionEntity>> {
        let document = self
            .sessions()
            .await
            .find_one(doc! {"join_code": code.as_str()})
            .await
            .map_err(|source| MongoDaoError::JoinCode { code, source })?;
        Ok(document.map(Into::into))
    }

    async fn create_session(&self, session: SessionEntity) -> MongoResult<bool> {
        let id = session.session_id.clone();
        let document: MongoSessionDocument = session.into();
        match self.sessions().await.insert_one(&document).await {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(source) => Err(MongoDaoError::SaveSession { id, source }),
        }
    }

    async fn compare_and_swap(
        &self,
        expected: SessionPrecondition,
        next: SessionEntity,
    ) -> MongoResult<bool> {
        let id = next.session_id.clone();
        let filter = doc! {
            "_id": id.as_str(),
            "version": expected.version,
            "is_live": expected.is_live,
            "current_index": expected.current_index,
        };
        let document: MongoSessionDocument = next.into();
        let result = self
            .sessions()
            .await
            .replace_one(filter, &document)
            .await
            .map_err(|source| MongoDaoError::SaveSession { id, source })?;
        Ok(result.matched_count == 1)
    }

    async fn reserve_join_code(&self, code: String, session_id: String) -> MongoResult<bool> {
        let document = MongoJoinCodeDocument {
            code: code.clone(),
            session_id,
            reserved_at: DateTime::now(),
        };
        match self.join_codes().await.insert_one(&document).await {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(source) => Err(MongoDaoError::JoinCode { code, source }),
        }
    }

    async fn release_join_code(&self, code: String, session_id: String) -> MongoResult<()> {
        self.join_codes()
            .await
            .delete_one(doc! {"_id": code.as_str(), "session_id": session_id})
            .await
            .map_err(|source| MongoDaoError::JoinCode { code, source })?;
        Ok(())
    }

    async fn ensure_ledger_entry(&self, entry: LedgerEntryEntity) -> MongoResult<EnsuredLedgerEntry> {
        let id = entry.session_id.clone();
        let key = ledger_key(&entry.session_id, entry.run, entry.player_id);
        let ledger = self.ledger().await;

        let created = match ledger
            .update_one(
                key.clone(),
                doc! {"$setOnInsert": ledger_insert_fields(&entry)},
            )
            .upsert(true)
            .await
        {
            Ok(result) => result.upserted_id.is_some(),
            // A concurrent join won the upsert; the entry exists either way.
            Err(err) if is_duplicate_key(&err) => false,
            Err(source) => return Err(MongoDaoError::Ledger { id, source }),
        };

        let stored = ledger
            .find_one(key)
            .await
            .map_err(|source| MongoDaoError::Ledger { id, source })?;

        Ok(EnsuredLedgerEntry {
            entry: stored.map(Into::into).unwrap_or(entry),
            created,
        })
    }

    async fn record_answer(
        &self,
        session_id: String,
        run: i64,
        player_id: i64,
        question_index: i32,
        correct: bool,
    ) -> MongoResult<AnswerRecord> {
        let counter = if correct {
            "correct_count"
        } else {
            "incorrect_count"
        };
        let mut filter = ledger_key(&session_id, run, player_id);
        filter.insert("last_submitted_index", doc! {"$lt": question_index});

        let mut increment = Document::new();
        increment.insert(counter, 1_i64);

        let ledger = self.ledger().await;
        let updated = ledger
            .find_one_and_update(
                filter,
                doc! {
                    "$inc": increment,
                    "$set": {"last_submitted_index": question_index},
                },
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::Ledger {
                id: session_id.clone(),
                source,
            })?;

        if let Some(document) = updated {
            return Ok(AnswerRecord::Recorded(document.into()));
        }

        let existing = ledger
            .find_one(ledger_key(&session_id, run, player_id))
            .await
            .map_err(|source| MongoDaoError::Ledger {
                id: session_id,
                source,
            })?;

        Ok(match existing {
            Some(_) => AnswerRecord::Duplicate,
            None => AnswerRecord::MissingEntry,
        })
    }

    async fn list_ledger_entries(
        &self,
        session_id: String,
        run: i64,
    ) -> MongoResult<Vec<LedgerEntryEntity>> {
        let documents: Vec<MongoLedgerDocument> = self
            .ledger()
            .await
            .find(doc! {"session_id": session_id.as_str(), "run": run})
            .sort(doc! {"joined_at": 1})
            .await
            .map_err(|source| MongoDaoError::Ledger {
                id: session_id.clone(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Ledger {
                id: session_id,
                source,
            })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn find_quiz(&self, id: String) -> MongoResult<Option<QuizEntity>> {
        let document = self
            .quizzes()
            .await
            .find_one(doc_id(&id))
            .await
            .map_err(|source| MongoDaoError::LoadQuiz { id, source })?;
        Ok(document.map(Into::into))
    }
}

impl SessionStore for MongoSessionStore {
    fn find_session(
        &self,
        session_id: &str,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        let id = session_id.to_owned();
        Box::pin(async move { store.find_session(id).await.map_err(Into::into) })
    }

    fn find_session_by_code(
        &self,
        join_code: &str,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        let code = join_code.to_owned();
        Box::pin(async move { store.find_session_by_code(code).await.map_err(Into::into) })
    }

    fn create_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.create_session(session).await.map_err(Into::into) })
    }

    fn compare_and_swap(
        &self,
        expected: SessionPrecondition,
        next: SessionEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .compare_and_swap(expected, next)
                .await
                .map_err(Into::into)
        })
    }

    fn reserve_join_code(
        &self,
        join_code: &str,
        session_id: &str,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let code = join_code.to_owned();
        let session_id = session_id.to_owned();
        Box::pin(async move {
            store
                .reserve_join_code(code, session_id)
                .await
                .map_err(Into::into)
        })
    }

    fn release_join_code(
        &self,
        join_code: &str,
        session_id: &str,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let code = join_code.to_owned();
        let session_id = session_id.to_owned();
        Box::pin(async move {
            store
                .release_join_code(code, session_id)
                .await
                .map_err(Into::into)
        })
    }

    fn ensure_ledger_entry(
        &self,
        entry: LedgerEntryEntity,
    ) -> BoxFuture<'static, StorageResult<EnsuredLedgerEntry>> {
        let store = self.clone();
        let entry = LedgerEntryEntity {
            joined_at: SystemTime::now(),
            ..entry
        };
        Box::pin(async move { store.ensure_ledger_entry(entry).await.map_err(Into::into) })
    }

    fn record_answer(
        &self,
        session_id: &str,
        run: i64,
        player_id: i64,
        question_index: i32,
        correct: bool,
    ) -> BoxFuture<'static, StorageResult<AnswerRecord>> {
        let store = self.clone();
        let session_id = session_id.to_owned();
        Box::pin(async move {
            store
                .record_answer(session_id, run, player_id, question_index, correct)
                .await
                .map_err(Into::into)
        })
    }

    fn list_ledger_entries(
        &self,
        session_id: &str,
        run: i64,
    ) -> BoxFuture<'static, StorageResult<Vec<LedgerEntryEntity>>> {
        let store = self.clone();
        let session_id = session_id.to_owned();
        Box::pin(async move {
            store
                .list_ledger_entries(session_id, run)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}

impl QuizRepository for MongoSessionStore {
    fn find_quiz(&self, session_id: &str) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>> {
        let store = self.clone();
        let id = session_id.to_owned();
        Box::pin(async move { store.find_quiz(id).await.map_err(Into::into) })
    }
}
