use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use deadlines_api::http::{self, AppStateInner};
use deadlines_api::{Dispatcher, Provider};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deadlines=debug,deadlines_api=debug,deadlines_db=info,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("DEADLINES_DB_PATH").unwrap_or_else(|_| "deadlines.db".into());
    let host = std::env::var("DEADLINES_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("DEADLINES_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let default_group =
        std::env::var("DEADLINES_DEFAULT_GROUP").unwrap_or_else(|_| "Default".into());
    let backup_path: PathBuf = std::env::var("DEADLINES_BACKUP_PATH")
        .unwrap_or_else(|_| deadlines_api::backup::BACKUP_FILENAME.into())
        .into();

    let db = deadlines_db::Database::open(&PathBuf::from(&db_path))?;

    let dispatcher = Dispatcher::new();
    let provider = Provider::new(db, Arc::new(dispatcher.clone()), Arc::new(default_group.clone()));
    let state = Arc::new(AppStateInner {
        provider,
        dispatcher,
        backup_path,
    });

    let app = http::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Deadlines server listening on {} (default group {:?})", addr, default_group);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate());
        match sigterm {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(_) => {
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
