//! Embedded HTTP dashboard: a JSON API mirroring the executor façade.
//!
//! Runs as its own task against the shared executor instance; it never spins
//! a private runtime and shuts down with the rest of the server via the
//! cancellation token.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use bgs_core::types::micro_ts;
use bgs_core::{ProcessInfo, ProcessStatus, ShellError};
use bgs_executor::ShellExecutor;

pub struct DashboardHandle {
    addr: SocketAddr,
    task: tokio::task::JoinHandle<()>,
}

impl DashboardHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            tracing::debug!(error = %e, "dashboard task join failed");
        }
    }
}

pub async fn start_dashboard(
    executor: Arc<ShellExecutor>,
    port: u16,
    shutdown: CancellationToken,
) -> Result<DashboardHandle> {
    let bind_addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind dashboard at {bind_addr}"))?;
    let addr = listener
        .local_addr()
        .context("failed to resolve dashboard address")?;

    let app = router(executor);
    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
            })
            .await
        {
            warn!(error = %e, "dashboard server stopped with error");
        }
    });

    info!(addr = %addr, "dashboard listening");
    Ok(DashboardHandle { addr, task })
}

fn router(executor: Arc<ShellExecutor>) -> Router {
    Router::new()
        .route("/api/processes", get(list_processes))
        .route("/api/process/{pid}", get(get_process))
        .route("/api/process/{pid}/output", get(get_process_output))
        .route("/api/process/{pid}/stop", post(stop_process))
        .route("/api/process/{pid}/clean", post(clean_process))
        .route("/api/process/clean_all", post(clean_all_processes))
        .route("/api/process/clean_selected", post(clean_selected_processes))
        .with_state(executor)
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(pid: u32) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: format!("Process {pid} not found"),
        }
    }

    fn from_shell_error(error: ShellError) -> Self {
        let status = match &error {
            ShellError::NotFound(_) => StatusCode::NOT_FOUND,
            ShellError::IllegalState(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({"error": self.message}))).into_response()
    }
}

#[derive(Deserialize)]
struct ListQuery {
    labels: Option<String>,
    status: Option<String>,
}

async fn list_processes(
    State(executor): State<Arc<ShellExecutor>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ProcessInfo>>, ApiError> {
    let labels: Option<Vec<String>> = query.labels.map(|raw| {
        raw.split(',')
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect()
    });
    let status = parse_status(query.status.as_deref())?;
    Ok(Json(executor.list_processes(labels.as_deref(), status)))
}

async fn get_process(
    State(executor): State<Arc<ShellExecutor>>,
    Path(pid): Path<u32>,
) -> Result<Json<ProcessInfo>, ApiError> {
    executor
        .get_process_info(pid)
        .map(Json)
        .map_err(|_| ApiError::not_found(pid))
}

#[derive(Deserialize)]
struct OutputQuery {
    tail: Option<usize>,
    since: Option<String>,
    until: Option<String>,
    stdout: Option<bool>,
    stderr: Option<bool>,
}

async fn get_process_output(
    State(executor): State<Arc<ShellExecutor>>,
    Path(pid): Path<u32>,
    Query(query): Query<OutputQuery>,
) -> Result<Json<Value>, ApiError> {
    // Validate existence first for a clean 404.
    executor
        .get_process_info(pid)
        .map_err(|_| ApiError::not_found(pid))?;

    let since = parse_web_timestamp(query.since.as_deref(), "since")?;
    let until = parse_web_timestamp(query.until.as_deref(), "until")?;
    let with_stdout = query.stdout.unwrap_or(true);
    let with_stderr = query.stderr.unwrap_or(false);

    let stdout = if with_stdout {
        executor
            .get_process_output(pid, query.tail, since, until, false)
            .map_err(ApiError::from_shell_error)?
    } else {
        Vec::new()
    };
    let stderr = if with_stderr {
        executor
            .get_process_output(pid, query.tail, since, until, true)
            .map_err(ApiError::from_shell_error)?
    } else {
        Vec::new()
    };

    Ok(Json(json!({"stdout": stdout, "stderr": stderr})))
}

#[derive(Deserialize, Default)]
struct StopBody {
    #[serde(default)]
    force: bool,
}

async fn stop_process(
    State(executor): State<Arc<ShellExecutor>>,
    Path(pid): Path<u32>,
    body: Option<Json<StopBody>>,
) -> Result<Json<Value>, ApiError> {
    let force = body.map(|Json(b)| b.force).unwrap_or(false);
    let info = executor
        .get_process_info(pid)
        .map_err(|_| ApiError::not_found(pid))?;
    if info.status != ProcessStatus::Running {
        return Err(ApiError::bad_request(format!(
            "Process is not running (status: {})",
            info.status
        )));
    }

    executor
        .stop_process(pid, force)
        .await
        .map_err(ApiError::from_shell_error)?;
    Ok(Json(json!({
        "status": "success",
        "message": format!("Process {pid} stopped successfully"),
        "pid": pid,
    })))
}

async fn clean_process(
    State(executor): State<Arc<ShellExecutor>>,
    Path(pid): Path<u32>,
) -> Result<Json<Value>, ApiError> {
    let info = executor
        .get_process_info(pid)
        .map_err(|_| ApiError::not_found(pid))?;
    if info.status == ProcessStatus::Running {
        return Err(ApiError::bad_request(
            "Process is still running and cannot be cleaned",
        ));
    }

    executor
        .clean_completed_process(pid)
        .map_err(ApiError::from_shell_error)?;
    Ok(Json(json!({
        "status": "success",
        "message": format!("Process {pid} cleaned successfully"),
        "pid": pid,
    })))
}

async fn clean_all_processes(
    State(executor): State<Arc<ShellExecutor>>,
) -> Result<Json<Value>, ApiError> {
    let count = executor.cleanup_all().await;
    Ok(Json(json!({
        "status": "success",
        "message": format!("Successfully cleaned {count} processes"),
        "count": count,
    })))
}

#[derive(Deserialize)]
struct CleanSelectedBody {
    #[serde(default)]
    pids: Vec<u32>,
}

async fn clean_selected_processes(
    State(executor): State<Arc<ShellExecutor>>,
    Json(body): Json<CleanSelectedBody>,
) -> Result<Json<Value>, ApiError> {
    if body.pids.is_empty() {
        return Err(ApiError::bad_request("No process PIDs provided"));
    }

    let mut success = Vec::new();
    let mut failed = Vec::new();
    let mut running = Vec::new();
    let mut not_found = Vec::new();

    for pid in body.pids {
        match executor.clean_completed_process(pid) {
            Ok(true) => success.push(json!({"pid": pid, "message": "Process cleaned successfully"})),
            Ok(false) => not_found.push(json!({"pid": pid, "message": "Process not found"})),
            Err(ShellError::IllegalState(_)) => {
                running.push(json!({"pid": pid, "message": "Process is still running"}));
            }
            Err(e) => failed.push(json!({"pid": pid, "message": e.to_string()})),
        }
    }

    Ok(Json(json!({
        "success": success,
        "failed": failed,
        "running": running,
        "not_found": not_found,
    })))
}

fn parse_status(raw: Option<&str>) -> Result<Option<ProcessStatus>, ApiError> {
    raw.map(|s| s.parse::<ProcessStatus>())
        .transpose()
        .map_err(ApiError::bad_request)
}

fn parse_web_timestamp(
    raw: Option<&str>,
    field: &str,
) -> Result<Option<chrono::DateTime<chrono::Utc>>, ApiError> {
    raw.map(micro_ts::parse).transpose().map_err(|e| {
        ApiError::bad_request(format!("'{field}' must be an ISO format timestamp: {e}"))
    })
}
