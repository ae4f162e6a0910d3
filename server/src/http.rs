use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{FromRef, State},
    http::{self, HeaderName, HeaderValue, Method},
    middleware,
    response::{Html, IntoResponse},
    routing::{get, post, put},
};
use axum_extra::extract::cookie::Key;
use platform_authz::Policy;
use platform_db::DbPool;
use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::{
    auth,
    config::AppConfig,
    gate::PolicyLayer,
    routes::{reports, session, users, waste_config, wastes},
};

// Policy metadata attached to route groups. `None` pins authentication;
// `Write` only gates the mutating verbs of its group.
const AUTHENTICATED: &[Policy] = &[Policy::None];
const WRITE_GATED: &[Policy] = &[Policy::None, Policy::Write];
const ADMIN_GATED: &[Policy] = &[Policy::None, Policy::Admin];
const SUPERVISOR_GATED: &[Policy] = &[Policy::None, Policy::Supervisor];

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<AppConfig>,
    pub cookie_key: Key,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(%config.addr, "wastetrack server listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    let allow_origin = if allowed.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed)
    };
    CorsLayer::new()
        .allow_credentials(true)
        .allow_headers([http::header::CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_origin(allow_origin)
}

pub fn build_router(state: AppState) -> Router {
    let request_id = MakeRequestUuid;
    let header_name = HeaderName::from_static("x-request-id");
    Router::new()
        // Public surface.
        .route("/health", get(health_handler))
        .route("/login", get(login_page).post(session::login))
        .route("/logout", post(session::logout))
        // Authenticated reads.
        .route(
            "/api/me",
            get(session::me).route_layer(PolicyLayer::new(AUTHENTICATED)),
        )
        .route(
            "/api/check-submission",
            get(wastes::check_submission).route_layer(PolicyLayer::new(AUTHENTICATED)),
        )
        .route(
            "/api/waste-reports",
            get(reports::waste_reports).route_layer(PolicyLayer::new(AUTHENTICATED)),
        )
        .route(
            "/api/analytics",
            get(reports::analytics).route_layer(PolicyLayer::new(SUPERVISOR_GATED)),
        )
        // Waste records: reads open to every authenticated principal, writes
        // require the edit permission level.
        .route(
            "/api/wastes",
            get(wastes::list)
                .post(wastes::create)
                .route_layer(PolicyLayer::new(WRITE_GATED)),
        )
        .route(
            "/api/wastes/{id}",
            get(wastes::show)
                .put(wastes::update)
                .delete(wastes::destroy)
                .route_layer(PolicyLayer::new(WRITE_GATED)),
        )
        // Reference data, same split.
        .route(
            "/api/waste-types",
            get(waste_config::list_waste_types)
                .post(waste_config::create_waste_type)
                .route_layer(PolicyLayer::new(WRITE_GATED)),
        )
        .route(
            "/api/waste-types/{id}",
            put(waste_config::update_waste_type)
                .delete(waste_config::delete_waste_type)
                .route_layer(PolicyLayer::new(WRITE_GATED)),
        )
        .route(
            "/api/dispositions",
            get(waste_config::list_dispositions)
                .post(waste_config::create_disposition)
                .route_layer(PolicyLayer::new(WRITE_GATED)),
        )
        .route(
            "/api/dispositions/{id}",
            put(waste_config::update_disposition)
                .delete(waste_config::delete_disposition)
                .route_layer(PolicyLayer::new(WRITE_GATED)),
        )
        // User management: directory listing is open to authenticated users,
        // account mutations are admin-only.
        .route(
            "/api/users",
            get(users::list).route_layer(PolicyLayer::new(AUTHENTICATED)),
        )
        .route(
            "/api/users",
            post(users::create).route_layer(PolicyLayer::new(ADMIN_GATED)),
        )
        .route(
            "/api/users/{id}",
            put(users::update)
                .delete(users::destroy)
                .route_layer(PolicyLayer::new(ADMIN_GATED)),
        )
        .route(
            "/api/users/{id}/update-login",
            post(users::update_last_login).route_layer(PolicyLayer::new(ADMIN_GATED)),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), request_id))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_allowed_origins))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth::resolve_principal,
                )),
        )
        .with_state(state)
}

async fn login_page() -> Html<&'static str> {
    Html(
        "<!doctype html><html><head><title>Sign in</title></head>\
         <body><h1>Sign in</h1><p>POST credentials to /login.</p></body></html>",
    )
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state
        .pool
        .execute(Statement::from_string(
            DatabaseBackend::Postgres,
            "SELECT 1".to_string(),
        ))
        .await
        .is_ok();
    Json(HealthResponse {
        ok: db_ok,
        db_ok,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    db_ok: bool,
    version: &'static str,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        signal(SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    ctrl_c.await;

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
}
