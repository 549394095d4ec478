mod events;
/// Reveal waiter registry.
pub mod reveal;
/// Session phases and transition planning.
pub mod session_machine;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    dao::{quiz_repository::QuizRepository, session_store::SessionStore},
    error::ServiceError,
};

pub use self::events::{SessionEventHubs, SseHub};
pub use self::reveal::RevealHub;

/// State handle shared by every handler and background task.
pub type SharedState = Arc<AppState>;

/// Storage handles installed together once a backend is reachable.
#[derive(Clone)]
pub struct Backend {
    /// Live sessions, join codes and ledgers.
    pub sessions: Arc<dyn SessionStore>,
    /// Quiz definitions read at start.
    pub quizzes: Arc<dyn QuizRepository>,
}

/// Central application state storing in-memory registries and storage handles.
pub struct AppState {
    config: AppConfig,
    backend: RwLock<Option<Backend>>,
    reveals: RevealHub,
    events: SessionEventHubs,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let events = SessionEventHubs::new(config.events_capacity);
        Arc::new(Self {
            config,
            backend: RwLock::new(None),
            reveals: RevealHub::new(),
            events,
            degraded: degraded_tx,
        })
    }

    /// Construct a state with a backend already installed.
    pub async fn with_backend(config: AppConfig, backend: Backend) -> SharedState {
        let state = Self::new(config);
        state.set_backend(backend).await;
        state
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Install a new storage backend and leave degraded mode.
    pub async fn set_backend(&self, backend: Backend) {
        {
            let mut guard = self.backend.write().await;
            *guard = Some(backend);
        }
        self.update_degraded(false).await;
    }

    /// Obtain the installed backend, or fail with [`ServiceError::Degraded`].
    pub async fn require_backend(&self) -> Result<Backend, ServiceError> {
        if self.is_degraded().await {
            return Err(ServiceError::Degraded);
        }
        let guard = self.backend.read().await;
        guard.clone().ok_or(ServiceError::Degraded)
    }

    /// Obtain the session store, or fail with [`ServiceError::Degraded`].
    pub async fn require_session_store(&self) -> Result<Arc<dyn SessionStore>, ServiceError> {
        Ok(self.require_backend().await?.sessions)
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Registry of reveal waiters.
    pub fn reveals(&self) -> &RevealHub {
        &self.reveals
    }

    /// Per-session SSE hubs.
    pub fn events(&self) -> &SessionEventHubs {
        &self.events
    }
}
