//! Router assembly and the serve loop.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use time::Duration;
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};
use tracing::info;

use crate::{
    config::Config,
    csrf::csrf_protect,
    form::MAX_FORM_SIZE,
    templates::TemplateCache,
    web::{authenticate, common_headers, handlers, recover_panic},
    Application,
};

/// Builds the application router with its full middleware stack.
pub fn router(app: Arc<Application>, sessions: SessionManagerLayer<MemoryStore>) -> Router {
    Router::new()
        .route("/", get(handlers::home))
        .route("/ping", get(handlers::ping))
        .route(
            "/snippet/create",
            get(handlers::snippet_create).post(handlers::snippet_create_post),
        )
        .route("/user/logout", post(handlers::user_logout_post))
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(MAX_FORM_SIZE))
        .layer(from_fn(authenticate))
        .layer(from_fn_with_state(app.clone(), csrf_protect))
        .layer(sessions)
        .layer(from_fn(common_headers))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(app.clone(), recover_panic))
        .with_state(app)
}

/// Session layer backed by an in-memory store.
pub fn session_layer(config: &Config) -> SessionManagerLayer<MemoryStore> {
    SessionManagerLayer::new(MemoryStore::default())
        .with_secure(config.secure_cookies)
        .with_expiry(Expiry::OnInactivity(Duration::hours(
            config.session_lifetime_hours,
        )))
}

/// Loads templates, binds the listener and serves until shutdown.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    info!(templates = %config.templates.display(), "Loading templates...");
    let template_cache = TemplateCache::load(&config.templates)?;
    info!(pages = template_cache.len(), "Templates loaded");

    let app = Arc::new(Application::new(config.debug, template_cache));
    let router = router(app, session_layer(&config));

    let listener = TcpListener::bind(&config.addr).await?;
    info!(addr = %config.addr, "Server running");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
