// 🌐 HTTP job API (feature "server")
// POST /api/upload → 202 {job_id}
// GET  /api/status/:job_id
// GET  /api/download/:job_id
//
// Jobs run on tokio's blocking pool; the batch itself stays synchronous.

use crate::config::Config;
use crate::jobs::{Download, JobStatus, JobStore};
use crate::pipeline::process_workbook_with_progress;
use crate::registry::{HttpRegistryClient, RegistryClient};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};
use uuid::Uuid;

pub const DOWNLOAD_FILENAME: &str = "consulta_simples.xlsx";
const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Builds the registry client for one job. Called on the blocking pool.
pub type ClientFactory =
    Arc<dyn Fn(&Config) -> anyhow::Result<Box<dyn RegistryClient>> + Send + Sync>;

/// Supplies "today" for a job.
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    pub jobs: JobStore,
    pub config: Arc<Config>,
    pub make_client: ClientFactory,
    pub today: Clock,
}

impl AppState {
    /// Real HTTP registry, local calendar date.
    pub fn new(config: Config) -> Self {
        AppState {
            jobs: JobStore::new(),
            config: Arc::new(config),
            make_client: Arc::new(http_registry_client),
            today: Arc::new(|| Local::now().date_naive()),
        }
    }
}

fn http_registry_client(config: &Config) -> anyhow::Result<Box<dyn RegistryClient>> {
    Ok(Box::new(HttpRegistryClient::new(&config.registry)?))
}

// ============================================================================
// RESPONSES
// ============================================================================

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(message.into()),
        }),
    )
        .into_response()
}

#[derive(Serialize)]
struct SubmitResponse {
    job_id: Uuid,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /api/health
async fn health_check() -> impl IntoResponse {
    ApiResponse::ok("OK")
}

/// POST /api/upload - multipart field "file"
async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut file = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("file") => match field.bytes().await {
                Ok(bytes) => {
                    file = Some(bytes.to_vec());
                    break;
                }
                Err(e) => return api_error(StatusCode::BAD_REQUEST, e.to_string()),
            },
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => return api_error(StatusCode::BAD_REQUEST, e.to_string()),
        }
    }

    let bytes = match file {
        Some(bytes) if !bytes.is_empty() => bytes,
        _ => return api_error(StatusCode::BAD_REQUEST, "missing 'file' upload"),
    };

    let (job_id, created) = state.jobs.submit(&bytes);
    if created {
        spawn_job(state, job_id, bytes);
    }

    (StatusCode::ACCEPTED, ApiResponse::ok(SubmitResponse { job_id })).into_response()
}

/// GET /api/status/:job_id
async fn job_status(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> Response {
    match state.jobs.status(job_id) {
        Some(status) => (StatusCode::OK, ApiResponse::<JobStatus>::ok(status)).into_response(),
        None => api_error(StatusCode::NOT_FOUND, format!("unknown job {}", job_id)),
    }
}

/// GET /api/download/:job_id
async fn download(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> Response {
    match state.jobs.download(job_id) {
        Some(Download::Ready(bytes)) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, XLSX_MIME.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", DOWNLOAD_FILENAME),
                ),
            ],
            bytes.as_ref().clone(),
        )
            .into_response(),
        Some(Download::NotReady(job_state)) => api_error(
            StatusCode::CONFLICT,
            format!("job {} is not finished ({:?})", job_id, job_state),
        ),
        Some(Download::Failed(message)) => api_error(StatusCode::CONFLICT, message),
        None => api_error(StatusCode::NOT_FOUND, format!("unknown job {}", job_id)),
    }
}

// ============================================================================
// JOB RUNNER
// ============================================================================

fn spawn_job(state: AppState, job_id: Uuid, input: Vec<u8>) {
    let jobs = state.jobs.clone();
    let handle = tokio::task::spawn_blocking(move || run_job(&state, job_id, &input));

    tokio::spawn(async move {
        if let Err(join_error) = handle.await {
            error!(%job_id, %join_error, "job panicked");
            jobs.fail(job_id, format!("job crashed: {}", join_error));
        }
    });
}

fn run_job(state: &AppState, job_id: Uuid, input: &[u8]) {
    state.jobs.mark_started(job_id);

    let client = match (state.make_client)(&state.config) {
        Ok(client) => client,
        Err(e) => {
            warn!(%job_id, error = %e, "could not build registry client");
            state.jobs.fail(job_id, e.to_string());
            return;
        }
    };

    let today = (state.today)();
    let outcome = process_workbook_with_progress(
        input,
        client.as_ref(),
        &state.config.batch,
        today,
        |progress| {
            state
                .jobs
                .record_progress(job_id, progress.processed, progress.total)
        },
    );

    match outcome {
        Ok(output) => state.jobs.complete(job_id, output.workbook),
        Err(e) => state.jobs.fail(job_id, e.to_string()),
    }
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn build_router(state: AppState) -> Router {
    let max_upload = state.config.server.max_upload_bytes;

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/upload", post(upload))
        .route("/status/:job_id", get(job_status))
        .route("/download/:job_id", get(download))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .layer(DefaultBodyLimit::max(max_upload)),
    )
}
