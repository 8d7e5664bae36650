use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use lab_core::ReactionDefinition;
use server_api::{
    create_experiment, create_submission, delete_experiment, health, list_experiments,
    list_reactions, list_submissions, update_experiment, update_submission, welcome, ApiContext,
};
use shared::{
    domain::{ExperimentId, SubmissionId},
    error::{ApiError, ErrorCode},
    protocol::{
        ChangesResponse, CreatedResponse, ExperimentDefinition, ExperimentDraft, Submission,
        SubmissionRecord, SubmissionUpdate, WelcomeResponse,
    },
};
use storage::Storage;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, normalize_database_url};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings();
    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    if settings.seed_demo_data && storage.seed_demo_data().await? {
        info!("empty database seeded with demo experiment");
    }

    let state = AppState::new(ApiContext::new(storage));
    let app = build_router(Arc::new(state), settings.max_body_bytes);

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/api/reactions", get(http_list_reactions))
        .route(
            "/api/experiments",
            get(http_list_experiments).post(http_create_experiment),
        )
        .route(
            "/api/experiments/:id",
            put(http_update_experiment).delete(http_delete_experiment),
        )
        .route(
            "/api/experiments/:experiment_id/submissions",
            get(http_list_submissions),
        )
        .route("/api/submissions", post(http_create_submission))
        .route("/api/submissions/:id", put(http_update_submission))
        .route("/ws", get(ws_handler))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: ApiError) -> (StatusCode, Json<ApiError>) {
    (status_for(err.code), Json(err))
}

async fn root() -> Json<WelcomeResponse> {
    Json(welcome())
}

async fn healthz(
    State(state): State<Arc<AppState>>,
) -> Result<&'static str, (StatusCode, Json<ApiError>)> {
    health(&state.api).await.map_err(reject)?;
    Ok("ok")
}

async fn http_list_reactions(State(state): State<Arc<AppState>>) -> Json<Vec<ReactionDefinition>> {
    Json(list_reactions(&state.api))
}

async fn http_list_experiments(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Vec<ExperimentDefinition>> {
    let experiments = list_experiments(&state.api).await.map_err(reject)?;
    Ok(Json(experiments))
}

async fn http_create_experiment(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<ExperimentDraft>,
) -> ApiResult<CreatedResponse> {
    let created = create_experiment(&state.api, &draft).await.map_err(reject)?;
    Ok(Json(created))
}

async fn http_update_experiment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(draft): Json<ExperimentDraft>,
) -> ApiResult<ChangesResponse> {
    let changes = update_experiment(&state.api, ExperimentId(id), &draft)
        .await
        .map_err(reject)?;
    Ok(Json(changes))
}

async fn http_delete_experiment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<ChangesResponse> {
    let changes = delete_experiment(&state.api, ExperimentId(id))
        .await
        .map_err(reject)?;
    Ok(Json(changes))
}

async fn http_list_submissions(
    State(state): State<Arc<AppState>>,
    Path(experiment_id): Path<i64>,
) -> ApiResult<Vec<SubmissionRecord>> {
    let submissions = list_submissions(&state.api, ExperimentId(experiment_id))
        .await
        .map_err(reject)?;
    Ok(Json(submissions))
}

async fn http_create_submission(
    State(state): State<Arc<AppState>>,
    Json(submission): Json<Submission>,
) -> ApiResult<CreatedResponse> {
    let created = create_submission(&state.api, submission)
        .await
        .map_err(reject)?;
    Ok(Json(created))
}

async fn http_update_submission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(update): Json<SubmissionUpdate>,
) -> ApiResult<SubmissionRecord> {
    let record = update_submission(&state.api, SubmissionId(id), &update)
        .await
        .map_err(reject)?;
    Ok(Json(record))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket))
}

// Presence only: inbound frames are drained and nothing is pushed.
async fn ws_connection(state: Arc<AppState>, socket: axum::extract::ws::WebSocket) {
    use futures::StreamExt;

    let connected = state.presence.join();
    info!(connected, "client connected");

    let (_sender, mut receiver) = socket.split();
    while let Some(Ok(_msg)) = receiver.next().await {}

    let connected = state.presence.leave();
    info!(connected, "client disconnected");
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
