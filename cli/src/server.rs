use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::Context;
use axum::{
    Extension, Json, Router,
    extract::{Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

use crate::commands::SheetBoard;
use weighboard_core::auth::{Credentials, Session};
use weighboard_core::models::{
    RankBy, RejectedRow, SeriesPoint, UserStats, WeightRecord, validate_weight,
};

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB
const SESSION_TTL: Duration = Duration::from_secs(12 * 60 * 60);
const MAX_SESSIONS: usize = 1024;

struct SessionEntry {
    session: Session,
    issued: Instant,
}

type Sessions = HashMap<String, SessionEntry>;

#[derive(Clone)]
struct AppState {
    board: Arc<Mutex<SheetBoard>>,
    credentials: Arc<Credentials>,
    sessions: Arc<Mutex<Sessions>>,
    session_ttl: Duration,
}

impl AppState {
    fn board(&self) -> std::sync::MutexGuard<'_, SheetBoard> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, Sessions> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Live session for a token. An expired token is dropped on sight.
    fn session_for(&self, token: &str) -> Option<Session> {
        let mut sessions = self.sessions();
        let entry = sessions.get(token)?;
        if entry.issued.elapsed() < self.session_ttl {
            return Some(entry.session.clone());
        }
        sessions.remove(token);
        None
    }
}

/// Store a new session, first pruning expired ones and, at the cap, the oldest.
fn insert_session(sessions: &mut Sessions, token: String, session: Session, ttl: Duration) {
    sessions.retain(|_, entry| entry.issued.elapsed() < ttl);
    if sessions.len() >= MAX_SESSIONS {
        let oldest = sessions
            .iter()
            .min_by_key(|(_, entry)| entry.issued)
            .map(|(key, _)| key.clone());
        if let Some(oldest) = oldest {
            sessions.remove(&oldest);
        }
    }
    sessions.insert(
        token,
        SessionEntry {
            session,
            issued: Instant::now(),
        },
    );
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct LoginRequest {
    user: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    user: String,
}

#[derive(Deserialize)]
struct CreateWeightRequest {
    date: Option<String>,
    weight_kg: f64,
}

#[derive(Deserialize)]
struct RecordsQuery {
    user: Option<String>,
}

#[derive(Deserialize)]
struct StatsQuery {
    by: Option<String>,
}

#[derive(Serialize)]
struct StatsResponse {
    ranked_by: RankBy,
    users: Vec<UserStats>,
    total_group_change: f64,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::Internal(err) => {
                error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

// --- Middleware ---

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Resolve the bearer token to a session and hand it to the handler.
async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = bearer_token(&request).and_then(|token| state.session_for(token));

    let Some(session) = session else {
        return ApiError::Unauthorized("Log in first".to_string()).into_response();
    };
    request.extensions_mut().insert(session);
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

fn new_token() -> String {
    use rand::Rng;
    use std::fmt::Write;

    let bytes: [u8; 32] = rand::rng().random();
    bytes
        .iter()
        .fold(String::with_capacity(64), |mut acc: String, b| {
            let _ = write!(acc, "{b:02x}");
            acc
        })
}

// --- Session handlers ---

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Some(session) = state.credentials.login(&req.user, &req.password) else {
        warn!(user = req.user.trim(), "rejected login");
        return Err(ApiError::Unauthorized(
            "Invalid user or password".to_string(),
        ));
    };

    let token = new_token();
    let user = session.user().to_string();
    insert_session(&mut state.sessions(), token.clone(), session, state.session_ttl);
    info!(%user, "logged in");
    Ok(Json(LoginResponse { token, user }))
}

async fn logout(State(state): State<AppState>, request: Request) -> StatusCode {
    if let Some(token) = bearer_token(&request) {
        state.sessions().remove(token);
    }
    StatusCode::NO_CONTENT
}

// --- Read handlers ---

async fn get_records(
    State(state): State<AppState>,
    Query(params): Query<RecordsQuery>,
) -> Result<Json<Vec<WeightRecord>>, ApiError> {
    let mut records = state
        .board()
        .snapshot()
        .context("failed to read sheet")?
        .table;
    if let Some(user) = params.user {
        let wanted = user.trim().to_lowercase();
        records.retain(|r| r.user.to_lowercase() == wanted);
    }
    Ok(Json(records))
}

async fn get_rejected(State(state): State<AppState>) -> Result<Json<Vec<RejectedRow>>, ApiError> {
    let rejected = state
        .board()
        .snapshot()
        .context("failed to read sheet")?
        .rejected;
    Ok(Json(rejected))
}

async fn get_stats(
    State(state): State<AppState>,
    Query(params): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, ApiError> {
    let by = match params.by.as_deref() {
        Some(s) => RankBy::parse(s).map_err(|e| ApiError::BadRequest(e.to_string()))?,
        None => RankBy::TotalLost,
    };

    let leaderboard = state.board().leaderboard().context("failed to read sheet")?;
    let users = leaderboard.ranked(by).into_iter().cloned().collect();
    Ok(Json(StatsResponse {
        ranked_by: by,
        users,
        total_group_change: leaderboard.total_group_change,
    }))
}

async fn get_series(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, Vec<SeriesPoint>>>, ApiError> {
    let series = state.board().series().context("failed to read sheet")?;
    Ok(Json(series))
}

// --- Write handlers ---

async fn create_weight(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<CreateWeightRequest>,
) -> Result<(StatusCode, Json<WeightRecord>), ApiError> {
    let date = match req.date {
        Some(ref s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| ApiError::BadRequest(format!("Invalid date '{s}'. Use YYYY-MM-DD")))?,
        None => Local::now().date_naive(),
    };
    validate_weight(req.weight_kg).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let record = state
        .board()
        .register_weight(&session, date, req.weight_kg)
        .context("failed to register weight")?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn delete_latest_weight(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<WeightRecord>, ApiError> {
    let deleted = state
        .board()
        .delete_latest(&session)
        .context("failed to delete weight")?
        .ok_or_else(|| {
            ApiError::NotFound(format!("No weigh-ins for {} to delete", session.user()))
        })?;
    Ok(Json(deleted))
}

fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/weights", post(create_weight))
        .route("/api/weights/latest", delete(delete_latest_weight))
        .route("/api/logout", post(logout))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    Router::new()
        .route("/api/login", post(login))
        .route("/api/records", get(get_records))
        .route("/api/rejected", get(get_rejected))
        .route("/api/stats", get(get_stats))
        .route("/api/series", get(get_series))
        .merge(protected)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    board: SheetBoard,
    credentials: Credentials,
    port: u16,
    bind: &str,
) -> anyhow::Result<()> {
    if credentials.is_empty() {
        warn!("no users configured; nobody will be able to log weigh-ins");
    }

    let state = AppState {
        board: Arc::new(Mutex::new(board)),
        credentials: Arc::new(credentials),
        sessions: Arc::new(Mutex::new(HashMap::new())),
        session_ttl: SESSION_TTL,
    };

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    info!("listening on http://{bind}:{port}");
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
