mod handlers;
mod state;
mod templates;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use paperpost::{Config, DisplayService};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use state::AppState;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info,axum::rejection=trace"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

pub fn router(service: Arc<DisplayService>, body_limit: usize) -> Router {
    let state = AppState { service };

    Router::new()
        .route("/", get(handlers::index))
        .route("/status", get(handlers::status))
        .route(
            "/converter",
            get(handlers::converter_page).post(handlers::converter_upload),
        )
        .route(
            "/display",
            get(handlers::converter_page).post(handlers::converter_upload),
        )
        .route(
            "/loader",
            get(handlers::loader_page).post(handlers::loader_upload),
        )
        .route("/camera", post(handlers::camera))
        .route(
            "/slideshow",
            get(handlers::slideshow_page).post(handlers::slideshow_toggle),
        )
        .route("/clear", get(handlers::clear))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
}

/// Serves until Ctrl-C. The caller owns shutting the service down afterwards.
pub fn run_server(config: &Config, service: Arc<DisplayService>) -> paperpost::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| paperpost::Error::Config(format!("bind addr parse error: {e}")))?;

    let app = router(service, config.max_upload_bytes);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| std::io::Error::other(format!("tokio runtime error: {e}")))?;

    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| std::io::Error::other(format!("bind error: {e}")))?;
        if let Ok(l) = listener.local_addr() {
            info!(address = %format!("http://{l}"), "Listening");
        }
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| std::io::Error::other(format!("server error: {e}")))
    })?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
