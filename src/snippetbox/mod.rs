use crate::{
    auth::{AuthService, PasswordHasherConfig},
    models::{PgSnippetStore, PgUserStore, SnippetStore},
    render::{JsonRenderer, Renderer},
    session::{self, MemoryStore, PgSessionStore, SessionConfig, SessionManager, SessionStore},
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, services::ServeDir, set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;

pub mod errors;
pub mod handlers;
pub mod middleware;


/// Shared collaborators handed to every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub auth: Arc<AuthService>,
    pub snippets: Arc<dyn SnippetStore>,
    pub renderer: Arc<dyn Renderer>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionBackend {
    Postgres,
    Memory,
}

#[derive(Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub dsn: SecretString,
    pub static_dir: PathBuf,
    pub session_backend: SessionBackend,
    pub session: SessionConfig,
    pub session_cleanup_interval: Duration,
    pub hasher: PasswordHasherConfig,
}

/// Build the application router with the full middleware chain.
pub fn router(state: AppState, static_dir: &Path) -> Router {
    let protected = Router::new()
        .route(
            "/snippet/create",
            get(handlers::snippet_create_page).post(handlers::snippet_create),
        )
        .route("/user/logout", post(handlers::logout))
        .route_layer(from_fn(middleware::require_authentication));

    Router::new()
        .route("/", get(handlers::home))
        .route("/snippet/view/:id", get(handlers::snippet_view))
        .route(
            "/user/signup",
            get(handlers::signup_page).post(handlers::signup),
        )
        .route("/user/login", get(handlers::login_page).post(handlers::login))
        .merge(protected)
        .route("/health", get(handlers::health))
        .route(handlers::NOT_FOUND_PATH, get(handlers::not_found))
        .nest_service("/static", ServeDir::new(static_dir))
        .fallback(handlers::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(middleware::recover_panic))
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(from_fn(middleware::log_request))
                .layer(from_fn(middleware::common_headers))
                .layer(from_fn_with_state(state.clone(), middleware::load_and_save))
                .layer(from_fn_with_state(state.clone(), middleware::authenticate)),
        )
        .with_state(state)
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(config: ServerConfig) -> Result<()> {
    middleware::install_panic_hook();

    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(config.dsn.expose_secret())
        .await
        .context("Failed to connect to database")?;

    let session_store: Arc<dyn SessionStore> = match config.session_backend {
        SessionBackend::Postgres => Arc::new(PgSessionStore::new(pool.clone())),
        SessionBackend::Memory => Arc::new(MemoryStore::new()),
    };

    // Background worker purges expired sessions; loads ignore them regardless.
    let cleanup = session::spawn_cleanup(session_store.clone(), config.session_cleanup_interval);

    let auth = AuthService::new(Arc::new(PgUserStore::new(pool.clone())), config.hasher)?;

    let state = AppState {
        sessions: Arc::new(SessionManager::new(session_store, config.session)),
        auth: Arc::new(auth),
        snippets: Arc::new(PgSnippetStore::new(pool)),
        renderer: Arc::new(JsonRenderer),
    };

    let app = router(state, &config.static_dir);

    let listener = TcpListener::bind(format!("::0:{}", config.port)).await?;

    info!("Listening on [::]:{}", config.port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    cleanup.abort();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!("failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
