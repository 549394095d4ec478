//! Live quiz backend entrypoint wiring REST, SSE, and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use live_quiz_back::{
    config::AppConfig,
    dao::{quiz_repository::InMemoryQuizRepository, session_store::memory::InMemorySessionStore},
    routes,
    state::{AppState, Backend, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let backend = env::var("STORE_BACKEND").unwrap_or_else(|_| "memory".into());

    let app_state = match backend.as_str() {
        "mongo" | "mongodb" => start_mongo_backend(config)?,
        other => {
            if other != "memory" {
                warn!(backend = other, "unknown STORE_BACKEND; using in-memory storage");
            }
            start_memory_backend(config).await
        }
    };

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Install the in-memory store, seeding the quiz repository from configuration.
async fn start_memory_backend(config: AppConfig) -> SharedState {
    let quizzes = InMemoryQuizRepository::new(config.quizzes.clone());
    info!(quizzes = config.quizzes.len(), "using in-memory storage");
    AppState::with_backend(
        config,
        Backend {
            sessions: Arc::new(InMemorySessionStore::new()),
            quizzes: Arc::new(quizzes),
        },
    )
    .await
}

/// Start in degraded mode and let the storage supervisor connect to MongoDB in the background.
#[cfg(feature = "mongo-store")]
fn start_mongo_backend(config: AppConfig) -> anyhow::Result<SharedState> {
    use live_quiz_back::{
        dao::{
            session_store::mongodb::{MongoConfig, MongoSessionStore},
            storage::StorageError,
        },
        services::storage_supervisor,
    };

    let mongo_uri = env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
    let mongo_db = env::var("MONGO_DB").ok();
    let app_state = AppState::new(config);

    tokio::spawn(storage_supervisor::run(app_state.clone(), move || {
        let uri = mongo_uri.clone();
        let db = mongo_db.clone();
        async move {
            let config = MongoConfig::from_uri(&uri, db.as_deref())
                .await
                .map_err(StorageError::from)?;
            let store = Arc::new(
                MongoSessionStore::connect(config)
                    .await
                    .map_err(StorageError::from)?,
            );
            Ok::<_, StorageError>(Backend {
                sessions: store.clone(),
                quizzes: store,
            })
        }
    }));

    Ok(app_state)
}

#[cfg(not(feature = "mongo-store"))]
fn start_mongo_backend(_config: AppConfig) -> anyhow::Result<SharedState> {
    anyhow::bail!("STORE_BACKEND=mongo requires the `mongo-store` feature")
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
