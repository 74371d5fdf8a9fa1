//! HTTP transport layer.
//!
//! A thin axum front-end over the library: one endpoint to store provider
//! credentials, one to upload a page and stream its explanation back as
//! server-sent events. All pipeline behaviour lives in the library modules;
//! this layer only decodes requests, relays the token stream and maps
//! errors onto status codes.

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::post;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::credentials::CredentialStore;
use crate::explain::Explainer;
use crate::history::HistoryStore;
use crate::llm::ModelResolver;

/// Uploads beyond this size are rejected before buffering.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared per-process state handed to every handler.
pub struct AppState {
    pub config: AppConfig,
    pub credentials: CredentialStore,
    pub resolver: ModelResolver,
    pub explainer: Explainer,
}

impl AppState {
    /// Production wiring: credentials in the OS keychain, history under the
    /// configured data directory.
    pub fn new(config: AppConfig) -> Self {
        let credentials = CredentialStore::keyring(&config.keyring_service);
        Self::with_credentials(config, credentials)
    }

    /// Wiring with an injected credential store (tests, embeddings).
    pub fn with_credentials(config: AppConfig, credentials: CredentialStore) -> Self {
        let resolver = ModelResolver::new(credentials.clone(), config.provider_max_retries);
        Self::with_resolver(config, credentials, resolver)
    }

    /// Fully explicit wiring, used when the resolver carries a model
    /// override (the mock path).
    pub fn with_resolver(
        config: AppConfig,
        credentials: CredentialStore,
        resolver: ModelResolver,
    ) -> Self {
        let history = HistoryStore::new(config.history_path());
        let explainer = Explainer::new(resolver.clone(), history, &config);
        Self {
            config,
            credentials,
            resolver,
            explainer,
        }
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/add-llm-keys", post(handlers::add_llm_keys))
        .route("/explain-page", post(handlers::explain_page))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES));

    if let Some(origin) = &state.config.cors_origin {
        match origin.parse::<HeaderValue>() {
            Ok(value) => {
                app = app.layer(
                    CorsLayer::new()
                        .allow_origin(value)
                        .allow_methods(Any)
                        .allow_headers(Any),
                );
            }
            Err(_) => warn!("invalid CORS origin '{origin}', not enabling CORS"),
        }
    }

    app.with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on http://{addr}");
    axum::serve(listener, app).await
}
