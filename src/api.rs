use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::header,
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::auth::{AuthError, CredentialVerifier, StaticCredentials, TokenIssuer};
use crate::catalog;
use crate::clock::{epoch_seconds, Clock, SystemClock};
use crate::config::ServerConfig;
use crate::driver::{self, DriverStats, ReviewSummary, TripRecord};
use crate::error::{ApiError, StartupError};
use crate::feed::{self, build_feed, encode_feed, TripTemplate};
use crate::simulator::{LoopSimulator, DEMO_ROUTE};
use crate::store::StoreHandle;

#[derive(Clone)]
pub struct AppState {
    pub simulator: Arc<LoopSimulator>,
    pub trip: Arc<TripTemplate>,
    pub credentials: Arc<dyn CredentialVerifier>,
    pub tokens: Arc<TokenIssuer>,
    pub store: StoreHandle,
    pub clock: Arc<dyn Clock>,
    pub require_auth: bool,
}

impl AppState {
    pub fn from_config(config: &ServerConfig) -> Result<Self, StartupError> {
        let simulator =
            LoopSimulator::new(DEMO_ROUTE.to_vec(), config.loop_seconds, config.vehicles)?;

        if config.token_ttl_secs <= 0 {
            return Err(StartupError::TokenTtl(config.token_ttl_secs));
        }
        if config.uses_dev_secret() {
            warn!("JWT_SECRET_KEY not set, signing tokens with the development secret");
        }
        let tokens = TokenIssuer::new(
            &config.token_secret,
            Duration::seconds(config.token_ttl_secs),
        )
        .map_err(StartupError::Token)?;

        let credentials = StaticCredentials::from_pairs(config.user_pairs());
        if credentials.is_empty() {
            return Err(StartupError::NoUsers);
        }

        let store = StoreHandle::from_config(
            config.database_url.as_deref(),
            config.database_auth.clone(),
            config.identity_api_key.clone(),
        );

        Ok(Self {
            simulator: Arc::new(simulator),
            trip: Arc::new(TripTemplate::default()),
            credentials: Arc::new(credentials),
            tokens: Arc::new(tokens),
            store,
            clock: Arc::new(SystemClock),
            require_auth: config.require_auth,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut api = Router::new()
        .route("/api/stops", get(get_stops))
        .route("/api/routes", get(get_routes))
        .route("/api/driver/stats/{driver_id}", get(get_driver_stats))
        .route("/api/driver/trips/{driver_id}", get(get_driver_trips))
        .route("/api/driver/reviews/{driver_id}", get(get_driver_reviews))
        .route("/api/gtfs-realtime", get(gtfs_realtime));
    if state.require_auth {
        api = api.route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_bearer,
        ));
    }

    Router::new()
        .route("/", get(home))
        .route("/login", post(login))
        .route("/api/auth/get-reset-link", post(get_reset_link))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AuthError::MissingToken)?;

    let claims = state.tokens.validate(token.trim(), state.clock.now())?;
    tracing::debug!(user = %claims.sub, path = %request.uri().path(), "Authorized request");
    Ok(next.run(request).await)
}

async fn home() -> Html<&'static str> {
    Html("<h1>MoveEasy API (SECURE)</h1><p>Login at /login</p>")
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    access_token: String,
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(request) =
        payload.map_err(|_| ApiError::BadRequest("Request must be JSON".to_string()))?;

    let (Some(username), Some(password)) = (
        request.username.filter(|u| !u.is_empty()),
        request.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::BadRequest(
            "Missing username or password".to_string(),
        ));
    };

    let principal = state
        .credentials
        .verify(&username, &password)
        .inspect_err(|_| warn!(%username, "Rejected login"))?;
    let access_token = state.tokens.issue(&principal, state.clock.now());
    info!(username = %principal.username, "Issued access token");

    Ok(Json(LoginResponse { access_token }))
}

#[derive(Debug, Deserialize)]
struct ResetLinkRequest {
    email: Option<String>,
}

async fn get_reset_link(
    State(state): State<AppState>,
    payload: Result<Json<ResetLinkRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let store = state
        .store
        .store()
        .map_err(|_| ApiError::Internal("Document store not initialized".to_string()))?;

    let email = payload
        .ok()
        .and_then(|Json(request)| request.email)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Email is required".to_string()))?;

    match store.password_reset_link(&email).await {
        Ok(link) => Ok(Json(serde_json::json!({ "link": link }))),
        Err(e) => {
            error!(error = %e, "Reset link error");
            Err(ApiError::BadRequest(e.to_string()))
        }
    }
}

async fn get_stops(State(state): State<AppState>) -> Json<Value> {
    Json(catalog::load_stops(&state.store).await)
}

async fn get_routes(State(state): State<AppState>) -> Json<Value> {
    Json(catalog::load_routes(&state.store).await)
}

async fn get_driver_stats(Path(driver_id): Path<String>) -> Json<DriverStats> {
    Json(driver::stats(&driver_id))
}

async fn get_driver_trips(Path(driver_id): Path<String>) -> Json<Vec<TripRecord>> {
    Json(driver::trips(&driver_id))
}

async fn get_driver_reviews(Path(driver_id): Path<String>) -> Json<ReviewSummary> {
    Json(driver::reviews(&driver_id))
}

async fn gtfs_realtime(State(state): State<AppState>) -> impl IntoResponse {
    let now = state.clock.now();
    let snapshots = state.simulator.snapshot(epoch_seconds(now));
    let body = encode_feed(&build_feed(&snapshots, now, &state.trip));
    ([(header::CONTENT_TYPE, feed::CONTENT_TYPE)], body)
}
