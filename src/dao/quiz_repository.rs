use dashmap::DashMap;
use futures::future::BoxFuture;

use crate::dao::{models::QuizEntity, storage::StorageResult};

/// Read-only view of the quiz repository consumed when a session starts.
pub trait QuizRepository: Send + Sync {
    /// Quiz whose identifier doubles as the session identifier.
    fn find_quiz(&self, session_id: &str) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>>;
}

/// Quiz repository kept in process memory, seeded from configuration.
#[derive(Default)]
pub struct InMemoryQuizRepository {
    quizzes: DashMap<String, QuizEntity>,
}

impl InMemoryQuizRepository {
    /// Build a repository holding the given quizzes, keyed by session id.
    pub fn new(quizzes: impl IntoIterator<Item = QuizEntity>) -> Self {
        let repository = Self::default();
        for quiz in quizzes {
            repository.insert(quiz);
        }
        repository
    }

    /// Add or replace a quiz definition.
    pub fn insert(&self, quiz: QuizEntity) {
        self.quizzes.insert(quiz.session_id.clone(), quiz);
    }
}

impl QuizRepository for InMemoryQuizRepository {
    fn find_quiz(&self, session_id: &str) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>> {
        let quiz = self.quizzes.get(session_id).map(|entry| entry.clone());
        Box::pin(async move { Ok(quiz) })
    }
}
