use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use followgraph::app::visibility::VisibilityPolicy;
use followgraph::config::{AppConfig, StoreBackend};
use followgraph::http;
use followgraph::infra::db::Db;
use followgraph::infra::store::{MemoryRelationshipStore, PgRelationshipStore, RelationshipStore};
use followgraph::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let store: Arc<dyn RelationshipStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let db = Db::connect(&config).await?;
            if config.run_migrations {
                db.migrate().await?;
            }
            Arc::new(PgRelationshipStore::new(db, config.lock_timeout()))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory relationship store, state is lost on exit");
            Arc::new(MemoryRelationshipStore::new(config.lock_timeout()))
        }
    };

    let policy = VisibilityPolicy {
        private_lists_require_follow: config.private_lists_require_follow,
    };
    let state = AppState::new(store, policy);

    let app: Router = http::router(state).layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!(backend = ?config.store_backend, "listening on {}", config.http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
