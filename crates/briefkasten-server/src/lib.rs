// briefkasten-server: HTTP surface for the mailbox service.
//
// Registration, letter log and the flag-based unlock handshake between the
// remote caller and the polling device.

pub mod error;
pub mod routes;
pub mod state;

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::Router;
use axum::routing::{get, post};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use briefkasten_core::MailStore;

pub use error::{ApiError, ServerError};
pub use state::AppState;

/// Where to listen and where to keep data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// JSON persistence file. `None` keeps everything in memory.
    pub data_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 5000)),
            data_file: None,
        }
    }
}

/// Build the router with every endpoint mounted.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(routes::status).post(routes::status))
        .route("/register", post(routes::register))
        .route("/letters", post(routes::letters))
        .route("/new_letter", post(routes::new_letter))
        .route("/entriegeln", post(routes::request_unlock))
        .route("/frage_entriegeln", post(routes::poll_unlock))
        .route("/open", post(routes::flap_opened))
        .route("/close", post(routes::flap_closed))
        .route("/frage_offen", post(routes::flap_state))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::debug_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
}

/// Open the store, bind and serve until `shutdown` fires.
pub async fn serve(config: &ServerConfig, shutdown: CancellationToken) -> Result<(), ServerError> {
    let store = match &config.data_file {
        Some(path) => MailStore::open(path)?,
        None => MailStore::in_memory(),
    };
    let app = router(AppState::new(store));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.bind,
            source,
        })?;
    info!(addr = %listener.local_addr()?, "mailbox service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("mailbox service stopped");
    Ok(())
}
