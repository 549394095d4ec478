use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report `ok` or `degraded`, pinging the session store when one is installed.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_session_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    if state.is_degraded().await {
        HealthResponse::degraded()
    } else {
        HealthResponse::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, services::fixtures, state::AppState};

    #[tokio::test]
    async fn reports_degraded_until_a_backend_is_installed() {
        let degraded = AppState::new(AppConfig::default());
        assert_eq!(health_status(&degraded).await.status, "degraded");

        let ready = fixtures::state_with_quiz("quiz", 1, &[0]).await;
        assert_eq!(health_status(&ready).await.status, "ok");
    }
}
