use crate::config::Config;
use crate::models::MediaKind;
use crate::render;
use crate::session::{SessionHandle, SessionStore, SESSION_COOKIE};
use crate::tmdb::{TmdbApi, TmdbClient};
use crate::view::{ViewController, ViewState};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::TypedHeader;
use headers::Cookie;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub image_base: Arc<str>,
}

impl AppState {
    pub fn new(tmdb: Arc<dyn TmdbApi>, image_base: &str) -> Self {
        Self {
            sessions: Arc::new(SessionStore::new(tmdb)),
            image_base: Arc::from(image_base.trim_end_matches('/')),
        }
    }
}

pub async fn run_server(config: Config) -> Result<()> {
    let tmdb: Arc<dyn TmdbApi> = Arc::new(TmdbClient::new(&config));
    info!("Using TMDB at {}", config.api_base_url);
    let state = AppState::new(tmdb, &config.image_base_url);

    let app = build_router(state);

    info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/select/:kind/:id", post(select))
        .route("/close/:kind", post(close))
        .route("/state", get(view_state))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn index(
    State(state): State<AppState>,
    cookie: Option<TypedHeader<Cookie>>,
) -> Response {
    let session = resolve_session(&state, cookie).await;
    let snapshot = session.controller.snapshot().await;
    let response = match render::render_view(&snapshot, &state.image_base) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Failed to render page: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    };
    with_session_cookie(&session, response)
}

async fn select(
    State(state): State<AppState>,
    Path((kind, id)): Path<(MediaKind, i64)>,
    cookie: Option<TypedHeader<Cookie>>,
) -> Response {
    let Some(controller) = existing_session(&state, cookie).await else {
        debug!(%kind, id, "Select without a session, sending to /");
        return Redirect::to("/").into_response();
    };

    // Run detached so a dropped connection does not cancel the detail fetch.
    let task = tokio::spawn(async move { controller.select(kind, id).await });
    match task.await {
        Ok(outcome) => debug!(%kind, id, ?outcome, "Handled select"),
        Err(e) => error!("Select task for {} {} failed: {}", kind, id, e),
    }

    Redirect::to("/").into_response()
}

async fn close(
    State(state): State<AppState>,
    Path(kind): Path<MediaKind>,
    cookie: Option<TypedHeader<Cookie>>,
) -> Response {
    if let Some(controller) = existing_session(&state, cookie).await {
        controller.close(kind).await;
    }
    Redirect::to("/").into_response()
}

async fn view_state(
    State(state): State<AppState>,
    cookie: Option<TypedHeader<Cookie>>,
) -> Response {
    match existing_session(&state, cookie).await {
        Some(controller) => {
            let snapshot: ViewState = controller.snapshot().await;
            Json(snapshot).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn session_id(cookie: &Option<TypedHeader<Cookie>>) -> Option<&str> {
    cookie
        .as_ref()
        .and_then(|TypedHeader(c)| c.get(SESSION_COOKIE))
}

/// Only the page load starts sessions; other routes never trigger TMDB list fetches.
async fn existing_session(
    state: &AppState,
    cookie: Option<TypedHeader<Cookie>>,
) -> Option<Arc<ViewController>> {
    state.sessions.get(session_id(&cookie)).await
}

/// Looks up the caller's session; a new one starts loading the popular lists.
async fn resolve_session(state: &AppState, cookie: Option<TypedHeader<Cookie>>) -> SessionHandle {
    let session = state.sessions.get_or_create(session_id(&cookie)).await;
    if session.created {
        let controller = session.controller.clone();
        tokio::spawn(async move {
            controller.mount().await;
        });
    }
    session
}

fn with_session_cookie(session: &SessionHandle, mut response: Response) -> Response {
    if !session.created {
        return response;
    }
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, session.id
    );
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => warn!("Could not encode session cookie: {}", e),
    }
    response
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
