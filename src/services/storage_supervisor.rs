use std::{future::Future, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::storage::StorageError,
    state::{Backend, SharedState},
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the storage backend, then keep it healthy, toggling degraded mode on failures.
///
/// Runs forever; spawn it on the runtime.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Backend, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(backend) => {
                let store = backend.sessions.clone();
                state.set_backend(backend).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                loop {
                    if store.health_check().await.is_ok() {
                        if state.is_degraded().await {
                            info!("storage healthy again; leaving degraded mode");
                            state.update_degraded(false).await;
                        }
                        sleep(HEALTH_POLL_INTERVAL).await;
                        continue;
                    }

                    let mut reconnect_delay = INITIAL_DELAY;
                    let mut reconnected = false;
                    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
                        match store.try_reconnect().await {
                            Ok(()) => {
                                info!("storage reconnection succeeded after health check failure");
                                reconnected = true;
                                break;
                            }
                            Err(err) => {
                                if attempt == 0 {
                                    warn!(
                                        attempt, error = %err,
                                        "storage reconnect first attempt failed; entering degraded mode"
                                    );
                                    state.update_degraded(true).await;
                                } else {
                                    warn!(attempt, error = %err, "storage reconnect attempt failed");
                                }
                                sleep(reconnect_delay).await;
                                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                            }
                        }
                    }

                    if !reconnected {
                        warn!("exhausted storage reconnect attempts; staying in degraded mode");
                        break;
                    }
                    state.update_degraded(false).await;
                    sleep(HEALTH_POLL_INTERVAL).await;
                }

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{
            Arc,
            atomic::{AtomicU32, Ordering},
        },
    };

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            quiz_repository::InMemoryQuizRepository, session_store::memory::InMemorySessionStore,
        },
        state::AppState,
    };

    #[tokio::test]
    async fn leaves_degraded_mode_once_connected() {
        let state = AppState::new(AppConfig::default());
        let calls = Arc::new(AtomicU32::new(0));

        let supervisor = {
            let state = state.clone();
            let calls = Arc::clone(&calls);
            tokio::spawn(run(state, move || {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        return Err(StorageError::unavailable(
                            "connection refused".into(),
                            io::Error::from(io::ErrorKind::ConnectionRefused),
                        ));
                    }
                    Ok(Backend {
                        sessions: Arc::new(InMemorySessionStore::new()),
                        quizzes: Arc::new(InMemoryQuizRepository::default()),
                    })
                }
            }))
        };

        assert!(state.is_degraded().await);
        while state.is_degraded().await {
            sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(state.require_session_store().await.is_ok());
        supervisor.abort();
    }
}
